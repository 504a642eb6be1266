//! The store RPCs the engine can issue.

use std::fmt;

/// One of the seven store RPCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    /// Insert or replace one row.
    PutItem,
    /// Read one row by key.
    GetItem,
    /// Remove one row by key.
    DeleteItem,
    /// Key-conditioned read of one partition.
    Query,
    /// Unconditioned read of the whole table.
    Scan,
    /// Up to 25 puts/deletes in one request.
    BatchWriteItem,
    /// Up to 100 key lookups in one request.
    BatchGetItem,
}

impl StoreOperation {
    /// The store's name for the RPC.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PutItem => "PutItem",
            Self::GetItem => "GetItem",
            Self::DeleteItem => "DeleteItem",
            Self::Query => "Query",
            Self::Scan => "Scan",
            Self::BatchWriteItem => "BatchWriteItem",
            Self::BatchGetItem => "BatchGetItem",
        }
    }

    /// Whether the RPC modifies data.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::PutItem | Self::DeleteItem | Self::BatchWriteItem)
    }
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
