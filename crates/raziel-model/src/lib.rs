//! Wire shapes for the Raziel composite-key store client.
//!
//! These are the parameter and result structs of the seven store RPCs the
//! engine drives (`PutItem`, `GetItem`, `DeleteItem`, `Query`, `Scan`,
//! `BatchWriteItem`, `BatchGetItem`). Field naming follows the store's JSON
//! protocol so the structs can be logged or persisted verbatim.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod operations;
pub mod output;
pub mod types;

pub use attribute_value::{AttributeValue, Item};
pub use error::{TransportError, TransportErrorCode};
pub use operations::StoreOperation;
