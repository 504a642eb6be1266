//! Table facade: point reads and writes, multi-get, batches, queries and counts.

use std::collections::HashMap;
use std::sync::Arc;

use raziel_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    ScanInput,
};
use raziel_model::types::{KeysAndAttributes, Select, WriteRequest};
use raziel_model::{AttributeValue, Item};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::batch::{self, BatchOp, MAX_BATCH_GET};
use crate::config::{DatabaseConfig, OpenOptions};
use crate::error::{Error, Result};
use crate::iterator::{QueryIter, QueryOptions, Record, Selector};
use crate::key::{self, Key};
use crate::transport::{Provisioner, TableSpec, Transport};
use crate::ttl::{self, Ttl};

const NOT_EXISTS: &str = "attribute_not_exists(hkey) AND attribute_not_exists(rkey)";

/// Entry point: a transport plus defaults for the tables opened through it.
#[derive(Debug, Clone)]
pub struct Database {
    transport: Arc<dyn Transport>,
    provisioner: Option<Arc<dyn Provisioner>>,
    config: DatabaseConfig,
}

impl Database {
    /// A database without provisioning; every table is assumed to exist.
    pub fn new(transport: Arc<dyn Transport>, config: DatabaseConfig) -> Self {
        Self {
            transport,
            provisioner: None,
            config,
        }
    }

    /// Create missing tables through `provisioner` when they are opened.
    #[must_use]
    pub fn with_provisioner(mut self, provisioner: Arc<dyn Provisioner>) -> Self {
        self.provisioner = Some(provisioner);
        self
    }

    /// Default configuration.
    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Open a table, provisioning it first unless `assume_exists` is set.
    pub async fn open(&self, name: &str, opts: OpenOptions) -> Result<Table> {
        if name.is_empty() {
            return Err(Error::MissingTableName);
        }
        let config = opts.resolve(&self.config);
        match &self.provisioner {
            Some(provisioner) if !config.assume_exists => {
                debug!(table = name, ttl = config.ttl, "provisioning table");
                provisioner
                    .ensure_table(&TableSpec::new(name, config.ttl))
                    .await?;
            }
            _ => debug!(table = name, "assuming table exists"),
        }
        Table::new(Arc::clone(&self.transport), name, config)
    }
}

/// Per-call table override shared by the simple operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Use this table instead of the one the handle was opened on.
    pub table: Option<String>,
}

impl CallOptions {
    /// Target another table.
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table: Some(name.into()),
        }
    }
}

/// Options of [`Table::get`] and [`Table::get_many`].
pub type GetOptions = CallOptions;
/// Options of [`Table::del`].
pub type DeleteOptions = CallOptions;
/// Options of [`Table::batch`].
pub type BatchOptions = CallOptions;
/// Options of [`Table::count`].
pub type CountOptions = CallOptions;

/// Options of [`Table::put`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutOptions {
    /// Expiry written to the `ttl` column.
    pub ttl: Option<Ttl>,
    /// Fail with `ConditionalCheckFailedException` if the row exists.
    pub not_exists: bool,
    /// Extra columns merged into the row after the core columns.
    pub attributes: Item,
    /// Table override.
    pub table: Option<String>,
}

impl PutOptions {
    /// Set the expiry.
    #[must_use]
    pub fn with_ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    /// Only write when no row exists under the key.
    #[must_use]
    pub fn not_exists(mut self) -> Self {
        self.not_exists = true;
        self
    }

    /// Add an extra column.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Target another table.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }
}

/// Outcome of [`Table::batch`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    /// Requests the store accepted.
    pub written: usize,
    /// Requests the store handed back unprocessed. They are not retried.
    pub unprocessed: Vec<WriteRequest>,
}

/// A handle on one table.
#[derive(Debug, Clone)]
pub struct Table {
    transport: Arc<dyn Transport>,
    name: String,
    config: DatabaseConfig,
}

impl Table {
    /// Wrap a table that is known to exist.
    pub fn new(
        transport: Arc<dyn Transport>,
        name: impl Into<String>,
        config: DatabaseConfig,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::MissingTableName);
        }
        Ok(Self {
            transport,
            name,
            config,
        })
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    fn target(&self, table: Option<String>) -> String {
        table.unwrap_or_else(|| self.name.clone())
    }

    /// Write `value` under `key`.
    pub async fn put<T>(&self, key: impl Into<Key>, value: &T, opts: PutOptions) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let encoded = key::encode(&key.into(), &self.config.separator)?;
        let text = serde_json::to_string(value)?;
        let item = batch::put_row(&encoded, text, &opts.attributes, opts.ttl.as_ref())?;
        let input = PutItemInput {
            table_name: self.target(opts.table),
            item,
            condition_expression: opts.not_exists.then(|| NOT_EXISTS.to_owned()),
            ..PutItemInput::default()
        };
        debug!(table = %input.table_name, hash = %encoded.hash, range = %encoded.range, "put");
        self.transport.put_item(input).await?;
        Ok(())
    }

    /// Remove the row under `key`. Removing a missing row succeeds.
    pub async fn del(&self, key: impl Into<Key>, opts: DeleteOptions) -> Result<()> {
        let encoded = key::encode(&key.into(), &self.config.separator)?;
        let input = DeleteItemInput {
            table_name: self.target(opts.table),
            key: encoded.to_item(),
            ..DeleteItemInput::default()
        };
        debug!(table = %input.table_name, hash = %encoded.hash, range = %encoded.range, "delete");
        self.transport.delete_item(input).await?;
        Ok(())
    }

    /// Read the value under `key`.
    ///
    /// A row whose ttl has passed is reported as [`Error::NotFound`], the same
    /// as a missing one.
    pub async fn get<T>(&self, key: impl Into<Key>, opts: GetOptions) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let encoded = key::encode(&key.into(), &self.config.separator)?;
        let input = GetItemInput {
            table_name: self.target(opts.table),
            key: encoded.to_item(),
            ..GetItemInput::default()
        };
        let item = self
            .transport
            .get_item(input)
            .await?
            .item
            .filter(|item| !ttl::is_expired(item))
            .ok_or(Error::NotFound)?;
        let text = item
            .get(key::VALUE)
            .and_then(AttributeValue::as_s)
            .ok_or_else(|| {
                Error::Serialization(serde::de::Error::custom("row has no string value column"))
            })?;
        Ok(serde_json::from_str(text)?)
    }

    /// Read many rows at once.
    ///
    /// Missing and expired rows are left out, so the result may be shorter
    /// than `keys`. A payload that is not valid JSON comes back as a string.
    /// Keys the store reports as unprocessed are logged and skipped.
    pub async fn get_many<K>(&self, keys: K, opts: GetOptions) -> Result<Vec<Record>>
    where
        K: IntoIterator,
        K::Item: Into<Key>,
    {
        let encoded = keys
            .into_iter()
            .map(|k| key::encode(&k.into(), &self.config.separator).map(|e| e.to_item()))
            .collect::<Result<Vec<_>>>()?;
        if encoded.is_empty() {
            return Err(Error::EmptyRequest("get_many"));
        }
        let table = self.target(opts.table);

        let mut records = Vec::with_capacity(encoded.len());
        for chunk in encoded.chunks(MAX_BATCH_GET) {
            let input = BatchGetItemInput {
                request_items: HashMap::from([(
                    table.clone(),
                    KeysAndAttributes {
                        keys: chunk.to_vec(),
                        ..KeysAndAttributes::default()
                    },
                )]),
            };
            let mut out = self.transport.batch_get_item(input).await?;
            if let Some(left) = out.unprocessed_keys.get(&table) {
                warn!(table = %table, keys = left.keys.len(), "batch get left keys unprocessed");
            }
            let items = out.responses.remove(&table).unwrap_or_default();
            records.extend(
                items
                    .into_iter()
                    .filter(|item| !ttl::is_expired(item))
                    .map(lenient_record),
            );
        }
        Ok(records)
    }

    /// Apply puts and deletes.
    ///
    /// Every operation is encoded before anything is sent. Groups of at most
    /// 25 are then written in order; the first transport error stops the
    /// batch.
    pub async fn batch(&self, ops: &[BatchOp], opts: BatchOptions) -> Result<BatchSummary> {
        let groups = batch::assemble(ops, &self.config.separator)?;
        let table = self.target(opts.table);

        let mut summary = BatchSummary::default();
        for group in groups {
            let sent = group.len();
            let input = BatchWriteItemInput {
                request_items: HashMap::from([(table.clone(), group)]),
            };
            let mut out = self.transport.batch_write_item(input).await?;
            let unprocessed = out.unprocessed_items.remove(&table).unwrap_or_default();
            if !unprocessed.is_empty() {
                warn!(table = %table, count = unprocessed.len(), "batch write left requests unprocessed");
            }
            summary.written += sent - unprocessed.len();
            summary.unprocessed.extend(unprocessed);
        }
        debug!(table = %table, written = summary.written, "batch applied");
        Ok(summary)
    }

    /// Iterate a partition, a prefix of one, or the whole table.
    pub fn query(&self, opts: QueryOptions) -> Result<QueryIter> {
        self.iter(Selector::Keyed, opts)
    }

    /// Iterate with a caller-written key condition and optional filter, both in
    /// `#name`/`"literal"` syntax. `opts.key` is ignored.
    pub fn query_raw(
        &self,
        condition: &str,
        filter: Option<&str>,
        mut opts: QueryOptions,
    ) -> Result<QueryIter> {
        opts.key = None;
        if let Some(filter) = filter {
            opts.filter = Some(filter.to_owned());
        }
        self.iter(Selector::Raw(condition.to_owned()), opts)
    }

    fn iter(&self, selector: Selector, mut opts: QueryOptions) -> Result<QueryIter> {
        let table = self.target(opts.table.take());
        QueryIter::new(
            Arc::clone(&self.transport),
            table,
            &self.config.separator,
            selector,
            opts,
        )
    }

    /// Number of rows in the table.
    pub async fn count(&self, opts: CountOptions) -> Result<u64> {
        self.count_with_progress(opts, |_| {}).await
    }

    /// Number of rows in the table, calling `progress` with the running total
    /// after every page except the last.
    pub async fn count_with_progress<F>(&self, opts: CountOptions, mut progress: F) -> Result<u64>
    where
        F: FnMut(u64) + Send,
    {
        let mut input = ScanInput {
            table_name: self.target(opts.table),
            select: Some(Select::Count),
            ..ScanInput::default()
        };
        let mut total = 0_u64;
        loop {
            let out = self.transport.scan(input.clone()).await?;
            total += u64::try_from(out.count).unwrap_or(0);
            if out.last_evaluated_key.is_empty() {
                break;
            }
            input.exclusive_start_key = out.last_evaluated_key;
            progress(total);
        }
        debug!(table = %input.table_name, total, "count finished");
        Ok(total)
    }
}

/// Decode a multi-get row, keeping the raw text when it is not JSON.
fn lenient_record(item: Item) -> Record {
    let text = item
        .get(key::VALUE)
        .and_then(AttributeValue::as_s)
        .unwrap_or_default();
    let value = serde_json::from_str(text).unwrap_or_else(|err| {
        warn!(error = %err, "payload is not JSON, returning raw text");
        serde_json::Value::String(text.to_owned())
    });
    Record {
        key: key::decode_item(&item),
        value,
        ttl: ttl::expiry(&item),
        attributes: item,
    }
}

#[cfg(test)]
mod tests {
    use raziel_model::{StoreOperation, TransportErrorCode};
    use serde_json::{Value, json};

    use super::*;
    use crate::iterator::Step;
    use crate::memory::MemoryTransport;

    async fn open(store: &Arc<MemoryTransport>) -> Table {
        Database::new(store.clone(), DatabaseConfig::default())
            .with_provisioner(store.clone())
            .open("raziel", OpenOptions::default())
            .await
            .unwrap()
    }

    async fn seed(table: &Table) {
        let ops = vec![
            BatchOp::put(["a", "a"], json!(1)),
            BatchOp::put(["a", "b", "x"], json!(2)),
            BatchOp::put(["a", "b", "y"], json!(3)),
            BatchOp::put(["b", "a"], json!(4)),
        ];
        table.batch(&ops, BatchOptions::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_should_put_and_get_value() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        table
            .put(["a", "a"], &json!({"foo": 100}), PutOptions::default())
            .await
            .unwrap();
        let value: Value = table.get(["a", "a"], GetOptions::default()).await.unwrap();
        assert_eq!(value, json!({"foo": 100}));
    }

    #[tokio::test]
    async fn test_should_report_missing_row_as_not_found() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        let err = table
            .get::<Value>(["a", "nope"], GetOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_should_reject_second_put_when_not_exists() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        let opts = PutOptions::default().not_exists();
        table.put(["a", "a"], &1, opts.clone()).await.unwrap();
        let err = table.put(["a", "a"], &2, opts).await.unwrap_err();
        let Error::Transport(err) = err else {
            panic!("expected a transport error");
        };
        assert_eq!(err.code, TransportErrorCode::ConditionalCheckFailedException);
    }

    #[tokio::test]
    async fn test_should_keep_extra_columns() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        let opts = PutOptions::default().with_attribute("owner", AttributeValue::s("ops"));
        table.put(["a", "a"], &1, opts).await.unwrap();
        let records = table
            .query(QueryOptions::partition("a").with_ttl(false))
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        let rows = table
            .query_raw("hkey = \"a\"", None, QueryOptions::default())
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        assert_eq!(rows[0].attributes.get("owner"), Some(&AttributeValue::s("ops")));
    }

    #[tokio::test]
    async fn test_should_filter_on_column_named_val() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        let opts = PutOptions::default().with_attribute("val", AttributeValue::s("x"));
        table.put(["a", "a"], &1, opts).await.unwrap();
        table.put(["a", "b"], &2, PutOptions::default()).await.unwrap();

        let records = table
            .query(QueryOptions::partition("a").with_filter("#val = \"x\""))
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, json!(1));
    }

    #[tokio::test]
    async fn test_should_fail_key_validation_without_calls() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        store.clear_calls();

        let err = table.put(["a"], &1, PutOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::KeyLength));
        let err = table.get::<Value>(["", "a"], GetOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::KeyEmpty));
        let err = table.del(["a", ""], DeleteOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::KeyEmpty));
        let err = table
            .get_many(vec![Key::from(["a", "b"]), Key::from(["c"])], GetOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::KeyLength));
        let bad = Key::try_from(&json!("a/b"));
        assert!(matches!(bad, Err(Error::KeyType)));

        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_should_scan_batch_written_rows_and_deletes() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        seed(&table).await;
        let all = table
            .query(QueryOptions::default())
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        assert_eq!(all.len(), 4);

        table
            .batch(&[BatchOp::delete(["b", "a"])], BatchOptions::default())
            .await
            .unwrap();
        assert_eq!(table.count(CountOptions::default()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_should_query_partition_and_prefix() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        seed(&table).await;

        let partition = table
            .query(QueryOptions::partition("a"))
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        assert_eq!(partition.len(), 3);

        let prefixed = table
            .query(QueryOptions::prefix("a", ["b"]))
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        let keys: Vec<_> = prefixed.iter().map(|r| r.key.clone()).collect();
        assert_eq!(keys, vec![Key::from(["a", "b/x"]), Key::from(["a", "b/y"])]);
    }

    #[tokio::test]
    async fn test_should_not_filter_queries_on_ttl_enabled_table() {
        let store = Arc::new(MemoryTransport::new());
        let table = Database::new(store.clone(), DatabaseConfig::default())
            .with_provisioner(store.clone())
            .open(
                "raziel",
                OpenOptions {
                    ttl: Some(true),
                    ..OpenOptions::default()
                },
            )
            .await
            .unwrap();
        assert!(table.config().ttl);
        seed(&table).await;

        let all = table
            .query(QueryOptions::default())
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|r| r.ttl.is_none()));

        let raw = table
            .query_raw("hkey = \"a\"", None, QueryOptions::default().with_ttl(true))
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        assert_eq!(raw.len(), 3);

        let filtered = table
            .query(QueryOptions::default().with_ttl(true))
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        assert!(filtered.is_empty());
    }

    #[tokio::test]
    async fn test_should_return_each_prefix_row_once_across_pages() {
        let store = Arc::new(MemoryTransport::new().with_page_size(1));
        let table = open(&store).await;
        let ops = vec![
            BatchOp::put(["a", "a"], json!(0)),
            BatchOp::put(["a", "b", "z"], json!(3)),
            BatchOp::put(["a", "b", "x"], json!(1)),
            BatchOp::put(["a", "c"], json!(4)),
            BatchOp::put(["a", "b", "y"], json!(2)),
            BatchOp::put(["b", "b", "q"], json!(5)),
        ];
        table.batch(&ops, BatchOptions::default()).await.unwrap();
        store.clear_calls();

        let records = table
            .query(QueryOptions::prefix("a", ["b"]))
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        let sort_keys: Vec<_> = records
            .iter()
            .map(|r| r.key.segments()[1].clone())
            .collect();
        assert_eq!(sort_keys, vec!["b/x", "b/y", "b/z"]);
        assert!(sort_keys.windows(2).all(|pair| pair[0] < pair[1]));
        let queries = store
            .calls()
            .into_iter()
            .filter(|op| *op == StoreOperation::Query)
            .count();
        assert!(queries > 1);
    }

    #[tokio::test]
    async fn test_should_resume_from_cursor_after_limit() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        seed(&table).await;

        let mut iter = table
            .query(QueryOptions::partition("a").with_limit(2))
            .unwrap();
        let mut seen = Vec::new();
        let cursor = loop {
            match iter.advance().await.unwrap() {
                Step::Record(record) => seen.push(record.key),
                Step::Done(cursor) => break cursor,
            }
        };
        assert_eq!(seen.len(), 2);
        let cursor = cursor.expect("a limited page should expose a cursor");

        let rest = table
            .query(QueryOptions::partition("a").with_start(cursor))
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);
        assert!(!seen.contains(&rest[0].key));
    }

    #[tokio::test]
    async fn test_should_hide_expired_row_from_get_but_not_from_scan() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        table
            .put(["a", "old"], &1, PutOptions::default().with_ttl("-1h"))
            .await
            .unwrap();

        let err = table.get::<Value>(["a", "old"], GetOptions::default()).await.unwrap_err();
        assert!(err.is_not_found());

        let rows = table
            .query(QueryOptions::default())
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_should_expire_row_after_its_ttl_elapses() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        table
            .put(["a", "soon"], &json!("v"), PutOptions::default().with_ttl("+2s"))
            .await
            .unwrap();

        let value: Value = table.get(["a", "soon"], GetOptions::default()).await.unwrap();
        assert_eq!(value, json!("v"));

        let rows = table
            .query(QueryOptions::partition("a").with_ttl(true))
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        let later = chrono::Utc::now() + chrono::Duration::seconds(3);
        assert!(ttl::is_expired_at(&rows[0].attributes, later));

        tokio::time::sleep(std::time::Duration::from_millis(2_100)).await;
        let err = table
            .get::<Value>(["a", "soon"], GetOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_should_treat_zero_ttl_as_no_expiry() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        table
            .put(["a", "a"], &1, PutOptions::default().with_ttl(0_i64))
            .await
            .unwrap();
        let value: Value = table.get(["a", "a"], GetOptions::default()).await.unwrap();
        assert_eq!(value, json!(1));
    }

    // Documented quirk: the query ttl filter compares against 0, not the
    // clock, so rows that already expired still come back with their ttl.
    #[tokio::test]
    async fn test_should_keep_expired_rows_in_ttl_filtered_query() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        table
            .put(["a", "old"], &1, PutOptions::default().with_ttl("-1h"))
            .await
            .unwrap();
        table
            .put(["a", "forever"], &2, PutOptions::default())
            .await
            .unwrap();

        let rows = table
            .query(QueryOptions::partition("a").with_ttl(true))
            .unwrap()
            .collect_records()
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, Key::from(["a", "old"]));
        assert!(rows[0].ttl.is_some());
    }

    #[tokio::test]
    async fn test_should_drop_missing_and_expired_rows_from_get_many() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        seed(&table).await;
        table
            .put(["c", "old"], &1, PutOptions::default().with_ttl("-1s"))
            .await
            .unwrap();

        let keys = vec![
            Key::from(["a", "a"]),
            Key::from(["b", "a"]),
            Key::from(["a", "missing"]),
            Key::from(["c", "old"]),
        ];
        let records = table.get_many(keys, GetOptions::default()).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_should_fall_back_to_raw_text_in_get_many() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        table
            .put(
                ["a", "a"],
                &1,
                PutOptions::default().with_attribute("value", AttributeValue::s("not json")),
            )
            .await
            .unwrap();
        let records = table
            .get_many([["a", "a"]], GetOptions::default())
            .await
            .unwrap();
        assert_eq!(records[0].value, json!("not json"));
    }

    #[tokio::test]
    async fn test_should_split_large_multi_get() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        store.clear_calls();
        let keys: Vec<Key> = (0..150)
            .map(|i| Key::new(["p".to_owned(), i.to_string()]))
            .collect();
        let records = table.get_many(keys, GetOptions::default()).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(
            store.calls(),
            vec![StoreOperation::BatchGetItem, StoreOperation::BatchGetItem]
        );
    }

    #[tokio::test]
    async fn test_should_report_unprocessed_batch_writes() {
        let store = Arc::new(MemoryTransport::new().with_batch_write_capacity(3));
        let table = open(&store).await;
        let ops: Vec<_> = (0..30)
            .map(|i| BatchOp::put(Key::new(["p".to_owned(), i.to_string()]), json!(i)))
            .collect();
        let summary = table.batch(&ops, BatchOptions::default()).await.unwrap();
        assert_eq!(summary.written, 6);
        assert_eq!(summary.unprocessed.len(), 24);
    }

    #[tokio::test]
    async fn test_should_count_with_progress_per_page() {
        let store = Arc::new(MemoryTransport::new().with_page_size(2));
        let table = open(&store).await;
        seed(&table).await;
        table.put(["c", "a"], &5, PutOptions::default()).await.unwrap();

        let mut seen = Vec::new();
        let total = table
            .count_with_progress(CountOptions::default(), |n| seen.push(n))
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(seen, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_should_use_table_override() {
        let store = Arc::new(MemoryTransport::new());
        let table = open(&store).await;
        store.create_table("other");
        table
            .put(["a", "a"], &1, PutOptions::default().with_table("other"))
            .await
            .unwrap();
        assert_eq!(store.row_count("other"), Some(1));
        assert_eq!(store.row_count("raziel"), Some(0));
        let err = table
            .del(["a", "a"], DeleteOptions::table("missing"))
            .await
            .unwrap_err();
        let Error::Transport(err) = err else {
            panic!("expected a transport error");
        };
        assert_eq!(err.code, TransportErrorCode::ResourceNotFoundException);
    }

    #[tokio::test]
    async fn test_should_require_table_name() {
        let store = Arc::new(MemoryTransport::new());
        let db = Database::new(store.clone(), DatabaseConfig::default());
        assert!(matches!(
            db.open("", OpenOptions::default()).await,
            Err(Error::MissingTableName)
        ));
    }

    #[tokio::test]
    async fn test_should_skip_provisioning_when_table_assumed() {
        let store = Arc::new(MemoryTransport::new());
        let db = Database::new(store.clone(), DatabaseConfig::default())
            .with_provisioner(store.clone());
        let opts = OpenOptions {
            assume_exists: Some(true),
            ..OpenOptions::default()
        };
        db.open("later", opts).await.unwrap();
        assert!(!store.has_table("later"));
        db.open("later", OpenOptions::default()).await.unwrap();
        assert!(store.has_table("later"));
    }
}
