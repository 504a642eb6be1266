//! In-memory store implementing [`Transport`] and [`Provisioner`].
//!
//! Behaves like the remote store for everything the engine relies on: key
//! conditions, filters, put conditions, projections, `Limit` with
//! `LastEvaluatedKey`, `Select=COUNT`, and batch reads and writes. Every call
//! is recorded so tests can assert on request counts.

pub mod condition;
pub mod storage;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use raziel_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    QueryInput, ScanInput,
};
use raziel_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, PutItemOutput,
    QueryOutput, ScanOutput,
};
use raziel_model::types::{Select, WriteRequest};
use raziel_model::{AttributeValue, Item, StoreOperation, TransportError};
use tracing::debug;

use self::condition::{CompareOp, ConditionError, EvalContext, Expr, Operand};
use self::storage::{RowKey, TableStorage};
use crate::key::HASH_KEY;
use crate::transport::{Provisioner, TableSpec, Transport};

/// Store limit on write requests per `BatchWriteItem`.
const MAX_WRITE_REQUESTS: usize = 25;
/// Store limit on keys per `BatchGetItem`.
const MAX_GET_KEYS: usize = 100;

/// An in-process store.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    tables: DashMap<String, Arc<TableStorage>>,
    calls: Mutex<Vec<StoreOperation>>,
    page_size: Option<usize>,
    batch_write_capacity: Option<usize>,
}

impl MemoryTransport {
    /// An empty store with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cut every query and scan page after `rows` evaluated rows, as the
    /// remote store does at its page size limit.
    #[must_use]
    pub fn with_page_size(mut self, rows: usize) -> Self {
        self.page_size = Some(rows.max(1));
        self
    }

    /// Apply at most `requests` writes per `BatchWriteItem` call and report the
    /// rest as unprocessed.
    #[must_use]
    pub fn with_batch_write_capacity(mut self, requests: usize) -> Self {
        self.batch_write_capacity = Some(requests);
        self
    }

    /// Create an empty table. Existing tables are left alone.
    pub fn create_table(&self, name: impl Into<String>) {
        self.tables
            .entry(name.into())
            .or_insert_with(|| Arc::new(TableStorage::new()));
    }

    /// Whether a table exists.
    #[must_use]
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Number of rows in a table.
    #[must_use]
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.get(table).map(|t| t.len())
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreOperation> {
        self.calls.lock().clone()
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, op: StoreOperation) {
        debug!(operation = %op, "memory transport call");
        self.calls.lock().push(op);
    }

    fn table(&self, name: &str) -> Result<Arc<TableStorage>, TransportError> {
        self.tables
            .get(name)
            .map(|t| Arc::clone(t.value()))
            .ok_or_else(|| TransportError::resource_not_found(name))
    }

    fn page_limit(&self, limit: Option<i32>) -> Result<usize, TransportError> {
        let requested = match limit {
            Some(n) if n <= 0 => {
                return Err(TransportError::validation("Limit must be greater than 0"));
            }
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
            None => usize::MAX,
        };
        Ok(self.page_size.map_or(requested, |size| size.min(requested)))
    }
}

fn condition_error(err: ConditionError) -> TransportError {
    TransportError::validation(err.to_string())
}

fn require_key(item: &Item) -> Result<RowKey, TransportError> {
    RowKey::from_item(item).ok_or_else(|| {
        TransportError::validation("One of the required keys was not given a value")
    })
}

/// Evaluate an optional write condition against the current row.
fn check_condition(
    condition: Option<&str>,
    current: Option<&Item>,
    names: &HashMap<String, String>,
    values: &HashMap<String, AttributeValue>,
) -> Result<(), TransportError> {
    let Some(condition) = condition else {
        return Ok(());
    };
    let expr = condition::parse(condition).map_err(condition_error)?;
    let empty = Item::new();
    let ctx = EvalContext {
        item: current.unwrap_or(&empty),
        names,
        values,
    };
    if ctx.evaluate(&expr).map_err(condition_error)? {
        Ok(())
    } else {
        Err(TransportError::conditional_check_failed())
    }
}

/// The partition value pinned by `hkey = :v` in a key condition.
fn partition_value(ctx: &EvalContext<'_>, expr: &Expr) -> Result<String, TransportError> {
    for conjunct in expr.conjuncts() {
        let Expr::Compare(left, CompareOp::Eq, right) = conjunct else {
            continue;
        };
        for (attr, value) in [(left, right), (right, left)] {
            if ctx.attribute_name(attr).map_err(condition_error)? != Some(HASH_KEY) {
                continue;
            }
            if let Operand::Value(_) = value {
                if let Some(AttributeValue::S(hash)) = ctx.resolve(value).map_err(condition_error)? {
                    return Ok(hash.clone());
                }
            }
        }
    }
    Err(TransportError::validation(
        "Query condition missed key schema element: hkey",
    ))
}

/// Apply filter, projection and `Select` to one evaluated page.
struct PageShaper<'a> {
    filter: Option<Expr>,
    projection: Option<Vec<String>>,
    names: &'a HashMap<String, String>,
    values: &'a HashMap<String, AttributeValue>,
    count_only: bool,
}

impl<'a> PageShaper<'a> {
    fn new(
        filter: Option<&str>,
        projection: Option<&str>,
        select: Option<Select>,
        names: &'a HashMap<String, String>,
        values: &'a HashMap<String, AttributeValue>,
    ) -> Result<Self, TransportError> {
        let filter = filter
            .map(condition::parse)
            .transpose()
            .map_err(condition_error)?;
        if let Some(expr) = &filter {
            let empty = Item::new();
            EvalContext {
                item: &empty,
                names,
                values,
            }
            .check_bindings(expr)
            .map_err(condition_error)?;
        }
        let projection = projection
            .map(|p| condition::parse_projection(p, names))
            .transpose()
            .map_err(condition_error)?;
        Ok(Self {
            filter,
            projection,
            names,
            values,
            count_only: select == Some(Select::Count),
        })
    }

    /// Returns the items to send back and how many passed the filter.
    fn shape(&self, page: Vec<Item>) -> Result<(Vec<Item>, i32), TransportError> {
        let mut kept = Vec::with_capacity(page.len());
        for item in page {
            let pass = match &self.filter {
                Some(expr) => EvalContext {
                    item: &item,
                    names: self.names,
                    values: self.values,
                }
                .evaluate(expr)
                .map_err(condition_error)?,
                None => true,
            };
            if pass {
                kept.push(item);
            }
        }
        let count = i32::try_from(kept.len()).unwrap_or(i32::MAX);
        if self.count_only {
            return Ok((Vec::new(), count));
        }
        if let Some(attrs) = &self.projection {
            kept = kept.into_iter().map(|item| project(item, attrs)).collect();
        }
        Ok((kept, count))
    }
}

fn project(mut item: Item, attrs: &[String]) -> Item {
    item.retain(|name, _| attrs.iter().any(|a| a == name));
    item
}

fn last_key(page: &[Item], more: bool) -> Item {
    if !more {
        return Item::new();
    }
    page.last()
        .and_then(RowKey::from_item)
        .map(|k| k.to_item())
        .unwrap_or_default()
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, TransportError> {
        self.record(StoreOperation::PutItem);
        let table = self.table(&input.table_name)?;
        let key = require_key(&input.item)?;
        check_condition(
            input.condition_expression.as_deref(),
            table.get(&key).as_ref(),
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )?;
        table.put(key, input.item);
        Ok(PutItemOutput::default())
    }

    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, TransportError> {
        self.record(StoreOperation::GetItem);
        let table = self.table(&input.table_name)?;
        let key = require_key(&input.key)?;
        let projection = input
            .projection_expression
            .as_deref()
            .map(|p| condition::parse_projection(p, &input.expression_attribute_names))
            .transpose()
            .map_err(condition_error)?;
        let item = table.get(&key).map(|item| match &projection {
            Some(attrs) => project(item, attrs),
            None => item,
        });
        Ok(GetItemOutput { item })
    }

    async fn delete_item(
        &self,
        input: DeleteItemInput,
    ) -> Result<DeleteItemOutput, TransportError> {
        self.record(StoreOperation::DeleteItem);
        let table = self.table(&input.table_name)?;
        let key = require_key(&input.key)?;
        check_condition(
            input.condition_expression.as_deref(),
            table.get(&key).as_ref(),
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )?;
        table.delete(&key);
        Ok(DeleteItemOutput::default())
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput, TransportError> {
        self.record(StoreOperation::Query);
        let table = self.table(&input.table_name)?;
        let names = &input.expression_attribute_names;
        let values = &input.expression_attribute_values;

        let key_condition = input
            .key_condition_expression
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| TransportError::validation("KeyConditionExpression is required"))?;
        let key_expr = condition::parse(key_condition).map_err(condition_error)?;
        let empty = Item::new();
        let probe = EvalContext {
            item: &empty,
            names,
            values,
        };
        probe.check_bindings(&key_expr).map_err(condition_error)?;
        let hash = partition_value(&probe, &key_expr)?;

        let shaper = PageShaper::new(
            input.filter_expression.as_deref(),
            input.projection_expression.as_deref(),
            input.select,
            names,
            values,
        )?;
        let limit = self.page_limit(input.limit)?;
        let after = RowKey::from_item(&input.exclusive_start_key).map(|k| k.range);

        let (page, more) = table.partition_rows(
            &hash,
            input.scan_index_forward.unwrap_or(true),
            after.as_deref(),
            limit,
            |item| {
                EvalContext {
                    item,
                    names,
                    values,
                }
                .evaluate(&key_expr)
                .unwrap_or(false)
            },
        );
        let scanned_count = i32::try_from(page.len()).unwrap_or(i32::MAX);
        let last_evaluated_key = last_key(&page, more);
        let (items, count) = shaper.shape(page)?;
        debug!(table = %input.table_name, hash = %hash, count, scanned_count, "memory query");
        Ok(QueryOutput {
            items,
            count,
            scanned_count,
            last_evaluated_key,
        })
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, TransportError> {
        self.record(StoreOperation::Scan);
        let table = self.table(&input.table_name)?;
        let shaper = PageShaper::new(
            input.filter_expression.as_deref(),
            input.projection_expression.as_deref(),
            input.select,
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )?;
        let limit = self.page_limit(input.limit)?;
        let after = RowKey::from_item(&input.exclusive_start_key);

        let (page, more) = table.all_rows(after.as_ref(), limit, |_| true);
        let scanned_count = i32::try_from(page.len()).unwrap_or(i32::MAX);
        let last_evaluated_key = last_key(&page, more);
        let (items, count) = shaper.shape(page)?;
        Ok(ScanOutput {
            items,
            count,
            scanned_count,
            last_evaluated_key,
        })
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, TransportError> {
        self.record(StoreOperation::BatchWriteItem);
        let total: usize = input.request_items.values().map(Vec::len).sum();
        if total == 0 {
            return Err(TransportError::validation(
                "The batch write request list must not be empty",
            ));
        }
        if total > MAX_WRITE_REQUESTS {
            return Err(TransportError::validation(
                "Too many items requested for the BatchWriteItem call",
            ));
        }
        let tables = input
            .request_items
            .keys()
            .map(|name| self.table(name).map(|t| (name.clone(), t)))
            .collect::<Result<HashMap<_, _>, _>>()?;

        let mut budget = self.batch_write_capacity.unwrap_or(usize::MAX);
        let mut unprocessed: HashMap<String, Vec<WriteRequest>> = HashMap::new();
        for (name, requests) in input.request_items {
            let Some(table) = tables.get(&name) else {
                continue;
            };
            for request in requests {
                if budget == 0 {
                    unprocessed.entry(name.clone()).or_default().push(request);
                    continue;
                }
                budget -= 1;
                match request {
                    WriteRequest::PutRequest(put) => {
                        let key = require_key(&put.item)?;
                        table.put(key, put.item);
                    }
                    WriteRequest::DeleteRequest(del) => {
                        table.delete(&require_key(&del.key)?);
                    }
                }
            }
        }
        Ok(BatchWriteItemOutput {
            unprocessed_items: unprocessed,
        })
    }

    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, TransportError> {
        self.record(StoreOperation::BatchGetItem);
        let total: usize = input.request_items.values().map(|k| k.keys.len()).sum();
        if total == 0 {
            return Err(TransportError::validation(
                "The list of keys to get must not be empty",
            ));
        }
        if total > MAX_GET_KEYS {
            return Err(TransportError::validation(
                "Too many items requested for the BatchGetItem call",
            ));
        }

        let mut responses = HashMap::new();
        for (name, spec) in input.request_items {
            let table = self.table(&name)?;
            let projection = spec
                .projection_expression
                .as_deref()
                .map(|p| condition::parse_projection(p, &spec.expression_attribute_names))
                .transpose()
                .map_err(condition_error)?;
            let mut found = Vec::new();
            for key in &spec.keys {
                if let Some(item) = table.get(&require_key(key)?) {
                    found.push(match &projection {
                        Some(attrs) => project(item, attrs),
                        None => item,
                    });
                }
            }
            responses.insert(name, found);
        }
        Ok(BatchGetItemOutput {
            responses,
            unprocessed_keys: HashMap::new(),
        })
    }
}

#[async_trait]
impl Provisioner for MemoryTransport {
    async fn ensure_table(&self, spec: &TableSpec) -> Result<(), TransportError> {
        debug!(table = %spec.name, "ensuring table exists");
        self.create_table(spec.name.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use raziel_model::TransportErrorCode;

    use super::*;

    fn row(hash: &str, range: &str, value: &str) -> Item {
        [
            ("hkey".to_owned(), AttributeValue::s(hash)),
            ("rkey".to_owned(), AttributeValue::s(range)),
            ("value".to_owned(), AttributeValue::s(value)),
        ]
        .into_iter()
        .collect()
    }

    fn store() -> MemoryTransport {
        let store = MemoryTransport::new();
        store.create_table("t");
        store
    }

    async fn put(store: &MemoryTransport, hash: &str, range: &str) {
        store
            .put_item(PutItemInput {
                table_name: "t".to_owned(),
                item: row(hash, range, "1"),
                ..PutItemInput::default()
            })
            .await
            .unwrap();
    }

    fn key_query(hash: &str) -> QueryInput {
        QueryInput {
            table_name: "t".to_owned(),
            key_condition_expression: Some("hkey = :key".to_owned()),
            expression_attribute_values: [(":key".to_owned(), AttributeValue::s(hash))]
                .into_iter()
                .collect(),
            ..QueryInput::default()
        }
    }

    #[tokio::test]
    async fn test_should_report_unknown_table() {
        let store = MemoryTransport::new();
        let err = store.scan(ScanInput {
            table_name: "missing".to_owned(),
            ..ScanInput::default()
        })
        .await
        .unwrap_err();
        assert_eq!(err.code, TransportErrorCode::ResourceNotFoundException);
    }

    #[tokio::test]
    async fn test_should_reject_put_when_condition_fails() {
        let store = store();
        let input = PutItemInput {
            table_name: "t".to_owned(),
            item: row("a", "b", "1"),
            condition_expression: Some(
                "attribute_not_exists(hkey) AND attribute_not_exists(rkey)".to_owned(),
            ),
            ..PutItemInput::default()
        };
        store.put_item(input.clone()).await.unwrap();
        let err = store.put_item(input).await.unwrap_err();
        assert_eq!(err.code, TransportErrorCode::ConditionalCheckFailedException);
    }

    #[tokio::test]
    async fn test_should_page_query_with_limit() {
        let store = store();
        for r in ["1", "2", "3"] {
            put(&store, "a", r).await;
        }
        put(&store, "b", "1").await;

        let mut input = key_query("a");
        input.limit = Some(2);
        let first = store.query(input.clone()).await.unwrap();
        assert_eq!(first.count, 2);
        assert!(!first.last_evaluated_key.is_empty());

        input.exclusive_start_key = first.last_evaluated_key;
        let second = store.query(input).await.unwrap();
        assert_eq!(second.count, 1);
        assert!(second.last_evaluated_key.is_empty());
    }

    #[tokio::test]
    async fn test_should_filter_after_limit() {
        let store = store();
        for r in ["1", "2", "3"] {
            put(&store, "a", r).await;
        }
        let mut input = key_query("a");
        input.limit = Some(2);
        input.filter_expression = Some("rkey <> :skip".to_owned());
        input
            .expression_attribute_values
            .insert(":skip".to_owned(), AttributeValue::s("1"));
        let out = store.query(input).await.unwrap();
        assert_eq!(out.scanned_count, 2);
        assert_eq!(out.count, 1);
    }

    #[tokio::test]
    async fn test_should_count_without_items() {
        let store = store();
        put(&store, "a", "1").await;
        put(&store, "b", "1").await;
        let out = store
            .scan(ScanInput {
                table_name: "t".to_owned(),
                select: Some(Select::Count),
                ..ScanInput::default()
            })
            .await
            .unwrap();
        assert_eq!(out.count, 2);
        assert!(out.items.is_empty());
    }

    #[tokio::test]
    async fn test_should_project_named_attributes() {
        let store = store();
        put(&store, "a", "1").await;
        let mut input = key_query("a");
        input.projection_expression = Some("hkey, #val".to_owned());
        input
            .expression_attribute_names
            .insert("#val".to_owned(), "value".to_owned());
        let out = store.query(input).await.unwrap();
        let item = &out.items[0];
        assert!(item.contains_key("value"));
        assert!(!item.contains_key("rkey"));
    }

    #[tokio::test]
    async fn test_should_require_partition_equality() {
        let store = store();
        let mut input = key_query("a");
        input.key_condition_expression = Some("rkey = :key".to_owned());
        let err = store.query(input).await.unwrap_err();
        assert_eq!(err.code, TransportErrorCode::ValidationException);
    }

    #[tokio::test]
    async fn test_should_leave_writes_over_capacity_unprocessed() {
        let store = MemoryTransport::new().with_batch_write_capacity(1);
        store.create_table("t");
        let requests = vec![
            WriteRequest::put(row("a", "1", "1")),
            WriteRequest::put(row("a", "2", "1")),
        ];
        let out = store
            .batch_write_item(BatchWriteItemInput {
                request_items: [("t".to_owned(), requests)].into_iter().collect(),
            })
            .await
            .unwrap();
        assert_eq!(out.unprocessed_items["t"].len(), 1);
        assert_eq!(store.row_count("t"), Some(1));
        assert_eq!(store.calls(), vec![StoreOperation::BatchWriteItem]);
    }
}
