//! Composite-key query and pagination engine.
//!
//! Application keys are sequences of string segments. The first segment
//! becomes the partition column `hkey`, the rest are joined with a separator
//! into the sort column `rkey`. Payloads are stored as JSON text in `value`,
//! with an optional epoch-seconds `ttl` column.
//!
//! The store itself is reached through the [`Transport`] trait; [`Table`]
//! shapes the requests and interprets the responses.
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod batch;
pub mod config;
pub mod error;
pub mod expression;
pub mod iterator;
pub mod key;
pub mod memory;
pub mod table;
pub mod transport;
pub mod ttl;

pub use batch::BatchOp;
pub use config::{DatabaseConfig, OpenOptions};
pub use error::{Error, Result};
pub use iterator::{Cursor, QueryIter, QueryOptions, Record, State, Step};
pub use key::Key;
pub use memory::MemoryTransport;
pub use table::{
    BatchOptions, BatchSummary, CallOptions, CountOptions, Database, DeleteOptions, GetOptions,
    PutOptions, Table,
};
pub use transport::{Provisioner, TableSpec, Transport};
pub use ttl::Ttl;
