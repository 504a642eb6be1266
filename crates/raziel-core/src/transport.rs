//! Seams to the outside world: the store RPC client and table provisioning.

use std::fmt::Debug;

use async_trait::async_trait;
use raziel_model::TransportError;
use raziel_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    QueryInput, ScanInput,
};
use raziel_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, PutItemOutput,
    QueryOutput, ScanOutput,
};

/// The store's RPC surface.
///
/// Implementations send each request exactly once. The engine never retries;
/// errors reach the caller unchanged.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Insert or replace one row.
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, TransportError>;

    /// Read one row by key.
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, TransportError>;

    /// Remove one row by key.
    async fn delete_item(&self, input: DeleteItemInput)
    -> Result<DeleteItemOutput, TransportError>;

    /// Read one page of a partition.
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, TransportError>;

    /// Read one page of the whole table.
    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, TransportError>;

    /// Apply up to 25 puts and deletes.
    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, TransportError>;

    /// Read up to 100 rows by key.
    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, TransportError>;
}

/// What a table must look like before the engine uses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Table name.
    pub name: String,
    /// Partition key column.
    pub hash_key: String,
    /// Sort key column.
    pub range_key: String,
    /// Expiry column, when TTL is enabled.
    pub ttl_attribute: Option<String>,
}

impl TableSpec {
    /// A table with the standard `hkey`/`rkey` schema.
    #[must_use]
    pub fn new(name: impl Into<String>, ttl: bool) -> Self {
        Self {
            name: name.into(),
            hash_key: crate::key::HASH_KEY.to_owned(),
            range_key: crate::key::RANGE_KEY.to_owned(),
            ttl_attribute: ttl.then(|| crate::key::TTL.to_owned()),
        }
    }
}

/// Creates tables on demand.
#[async_trait]
pub trait Provisioner: Send + Sync + Debug {
    /// Make sure the table exists. Creating a table that already exists is not
    /// an error.
    async fn ensure_table(&self, spec: &TableSpec) -> Result<(), TransportError>;
}
