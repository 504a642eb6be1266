//! Pagination iterator over `Query` and `Scan` pages.
//!
//! A [`QueryIter`] issues one store request at a time, buffers the page, and
//! hands out records until the buffer drains, then fetches the next page with
//! the store's continuation token. It ends when the store returns no token or
//! after the first page when a `limit` was given, exposing the token as a
//! [`Cursor`] so the caller can resume later.
//!
//! When a keyed query or scan asks for TTL filtering, the request carries the
//! filter `#ttl > :ttl` with `:ttl = 0`. That removes rows without a positive
//! ttl; it does not remove rows whose ttl has already passed. Point reads are
//! the only place expiry is enforced against the clock. Raw-condition queries
//! never add the filter.

use std::collections::VecDeque;
use std::sync::Arc;

use raziel_model::input::{QueryInput, ScanInput};
use raziel_model::{AttributeValue, Item};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::expression::ExpressionContext;
use crate::key::{self, Key};
use crate::transport::Transport;
use crate::ttl;

const KEY_ONLY: &str = "hkey = :key";
const KEY_AND_PREFIX: &str = "hkey = :key and begins_with(rkey, :prefix)";
const TTL_FILTER: &str = "#ttl > :ttl";
const PROJECTION: &str = "hkey, rkey, #raziel_value";
const PROJECTION_WITH_TTL: &str = "hkey, rkey, #ttl, #raziel_value";
const VALUE_NAME: &str = "#raziel_value";
const TTL_NAME: &str = "#ttl";

/// Opaque resume point returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(Item);

impl Cursor {
    /// Wrap a store start key.
    #[must_use]
    pub fn new(start_key: Item) -> Self {
        Self(start_key)
    }

    /// The store start key.
    #[must_use]
    pub fn as_item(&self) -> &Item {
        &self.0
    }

    /// Unwrap into the store start key.
    #[must_use]
    pub fn into_item(self) -> Item {
        self.0
    }
}

/// One decoded row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// `[hkey, rkey]`.
    pub key: Key,
    /// Decoded payload.
    pub value: serde_json::Value,
    /// Every column the store returned, undecoded.
    pub attributes: Item,
    /// Expiry in epoch seconds, when TTL filtering was requested.
    pub ttl: Option<f64>,
}

/// Result of advancing a [`QueryIter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The next record.
    Record(Record),
    /// No more records. Carries the cursor to resume from, if the store gave one.
    Done(Option<Cursor>),
}

/// Options of a keyed query or a full scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// `[hash]` for a partition query, `[hash, prefix...]` for a prefix query,
    /// `None` for a full scan.
    pub key: Option<Key>,
    /// Filter condition in `#name`/`"literal"` syntax.
    pub filter: Option<String>,
    /// Stop after the first page of at most this many evaluated rows.
    pub limit: Option<u32>,
    /// Resume from a previous iteration.
    pub start: Option<Cursor>,
    /// Drop rows without a positive `ttl` and report each row's expiry.
    /// Ignored by raw-condition queries.
    pub ttl: bool,
    /// Override the table name.
    pub table: Option<String>,
}

impl QueryOptions {
    /// Query one partition.
    pub fn partition(hash: impl Into<String>) -> Self {
        Self {
            key: Some(Key::new([hash.into()])),
            ..Self::default()
        }
    }

    /// Query the rows of one partition whose sort key starts with `prefix`.
    pub fn prefix<I, S>(hash: impl Into<String>, prefix: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut segments = vec![hash.into()];
        segments.extend(prefix.into_iter().map(Into::into));
        Self {
            key: Some(Key::from(segments)),
            ..Self::default()
        }
    }

    /// Add a filter condition.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Set a page limit.
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resume from a cursor.
    #[must_use]
    pub fn with_start(mut self, start: Cursor) -> Self {
        self.start = Some(start);
        self
    }

    /// Turn TTL filtering on or off.
    #[must_use]
    pub fn with_ttl(mut self, ttl: bool) -> Self {
        self.ttl = ttl;
        self
    }
}

/// How rows are selected.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Selector {
    /// Derive the key condition from `QueryOptions::key`.
    Keyed,
    /// Use a caller-written key condition.
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Request {
    Query(QueryInput),
    Scan(ScanInput),
}

impl Request {
    fn set_start(&mut self, start: Item) {
        match self {
            Self::Query(input) => input.exclusive_start_key = start,
            Self::Scan(input) => input.exclusive_start_key = start,
        }
    }

    fn table_name(&self) -> &str {
        match self {
            Self::Query(input) => &input.table_name,
            Self::Scan(input) => &input.table_name,
        }
    }
}

/// Iterator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Records may be buffered; the next fetch is allowed.
    Buffered,
    /// A page request is in flight.
    Fetching,
    /// No more pages will be fetched; the buffer may still hold records.
    Exhausted,
}

/// Lazy, resumable sequence of [`Record`]s.
///
/// Not meant for concurrent advancement; each caller should own its own.
/// Dropping it is enough to abandon it.
#[derive(Debug)]
pub struct QueryIter {
    transport: Arc<dyn Transport>,
    request: Request,
    buffer: VecDeque<Item>,
    state: State,
    cursor: Option<Cursor>,
    limited: bool,
    annotate_ttl: bool,
}

impl QueryIter {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        table: String,
        separator: &str,
        selector: Selector,
        opts: QueryOptions,
    ) -> Result<Self> {
        let annotate_ttl = opts.ttl && selector == Selector::Keyed;
        let limit = opts.limit.filter(|n| *n > 0);
        let request = build_request(table, separator, annotate_ttl, selector, &opts, limit)?;
        Ok(Self {
            transport,
            request,
            buffer: VecDeque::new(),
            state: State::Buffered,
            cursor: None,
            limited: limit.is_some(),
            annotate_ttl,
        })
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// The cursor captured when iteration ended, if any.
    #[must_use]
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Move to the next record.
    ///
    /// Buffered records are returned without I/O. Otherwise exactly one page
    /// is requested (a page that is empty but carries a token is followed when
    /// there is no limit). Transport errors leave the iterator where it was, so
    /// calling again re-sends the same request. A record whose payload does not
    /// decode is returned as an error; the records after it stay readable.
    pub async fn advance(&mut self) -> Result<Step> {
        loop {
            if let Some(raw) = self.buffer.pop_front() {
                return self.decode(raw).map(Step::Record);
            }
            if self.state == State::Exhausted {
                return Ok(Step::Done(self.cursor.clone()));
            }

            self.state = State::Fetching;
            let (items, next) = match self.fetch_page().await {
                Ok(page) => page,
                Err(err) => {
                    self.state = State::Buffered;
                    return Err(err);
                }
            };
            let next = (!next.is_empty()).then(|| Cursor(next));
            debug!(
                table = self.request.table_name(),
                items = items.len(),
                has_more = next.is_some(),
                "fetched page"
            );

            // An empty page with a token is followed unless a limit was set.
            let end = next.is_none() || self.limited;
            self.buffer.extend(items);

            if end {
                self.cursor = next;
                self.state = State::Exhausted;
            } else if let Some(cursor) = next {
                self.request.set_start(cursor.as_item().clone());
                self.cursor = Some(cursor);
                self.state = State::Buffered;
            }
        }
    }

    /// The next record, or `None` at the end.
    pub async fn try_next(&mut self) -> Result<Option<Record>> {
        match self.advance().await? {
            Step::Record(record) => Ok(Some(record)),
            Step::Done(_) => Ok(None),
        }
    }

    /// Drain the iterator, stopping at the first error.
    pub async fn collect_records(mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.try_next().await? {
            records.push(record);
        }
        Ok(records)
    }

    async fn fetch_page(&self) -> Result<(Vec<Item>, Item)> {
        match &self.request {
            Request::Query(input) => {
                let out = self.transport.query(input.clone()).await?;
                Ok((out.items, out.last_evaluated_key))
            }
            Request::Scan(input) => {
                let out = self.transport.scan(input.clone()).await?;
                Ok((out.items, out.last_evaluated_key))
            }
        }
    }

    fn decode(&self, raw: Item) -> Result<Record> {
        let text = raw
            .get(key::VALUE)
            .and_then(AttributeValue::as_s)
            .ok_or_else(|| {
                Error::Serialization(serde::de::Error::custom("row has no string value column"))
            })?;
        let value = serde_json::from_str(text)?;
        Ok(Record {
            key: key::decode_item(&raw),
            value,
            ttl: if self.annotate_ttl {
                ttl::expiry(&raw)
            } else {
                None
            },
            attributes: raw,
        })
    }
}

fn build_request(
    table: String,
    separator: &str,
    annotate_ttl: bool,
    selector: Selector,
    opts: &QueryOptions,
    limit: Option<u32>,
) -> Result<Request> {
    let mut ctx = ExpressionContext::new();
    let raw = matches!(selector, Selector::Raw(_));

    let key_condition = match selector {
        Selector::Raw(condition) => Some(ctx.compile(&condition)),
        Selector::Keyed => match opts.key.as_ref().map(Key::segments) {
            None | Some([]) => None,
            Some([hash, prefix @ ..]) => {
                if hash.is_empty() {
                    return Err(Error::KeyEmpty);
                }
                ctx.bind_value(":key", AttributeValue::s(hash));
                let prefix = prefix.join(separator);
                if prefix.is_empty() {
                    Some(KEY_ONLY.to_owned())
                } else {
                    ctx.bind_value(":prefix", AttributeValue::S(prefix));
                    Some(KEY_AND_PREFIX.to_owned())
                }
            }
        },
    };

    let mut filters = Vec::new();
    if let Some(filter) = &opts.filter {
        filters.push(ctx.compile(filter));
    }
    if annotate_ttl {
        reserve_name(&mut ctx, TTL_NAME, key::TTL)?;
        ctx.bind_value(":ttl", AttributeValue::n(0));
        filters.push(TTL_FILTER.to_owned());
    }
    let filter_expression = match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(
            filters
                .iter()
                .map(|f| format!("({f})"))
                .collect::<Vec<_>>()
                .join(" AND "),
        ),
    };

    let projection_expression = match (raw, annotate_ttl) {
        (_, true) => Some(PROJECTION_WITH_TTL),
        // Raw conditions return whole rows.
        (true, false) => None,
        (false, false) => Some(PROJECTION),
    };
    if projection_expression.is_some() {
        reserve_name(&mut ctx, VALUE_NAME, key::VALUE)?;
    }

    let limit = limit.map(|n| i32::try_from(n).unwrap_or(i32::MAX));
    let start = opts.start.clone().map(Cursor::into_item).unwrap_or_default();
    let (names, values) = ctx.into_parts();

    Ok(match key_condition {
        Some(condition) => Request::Query(QueryInput {
            table_name: table,
            key_condition_expression: Some(condition),
            filter_expression,
            projection_expression: projection_expression.map(str::to_owned),
            expression_attribute_names: names,
            expression_attribute_values: values,
            limit,
            exclusive_start_key: start,
            ..QueryInput::default()
        }),
        None => Request::Scan(ScanInput {
            table_name: table,
            filter_expression,
            projection_expression: projection_expression.map(str::to_owned),
            expression_attribute_names: names,
            expression_attribute_values: values,
            limit,
            exclusive_start_key: start,
            ..ScanInput::default()
        }),
    })
}

/// Bind a placeholder the engine needs, unless the caller's expressions already
/// use it for another attribute.
fn reserve_name(ctx: &mut ExpressionContext, placeholder: &str, name: &str) -> Result<()> {
    match ctx.names().get(placeholder) {
        Some(bound) if bound != name => Err(Error::ReservedName(placeholder.to_owned())),
        _ => {
            ctx.bind_name(placeholder, name);
            Ok(())
        }
    }
}
