//! [`Transport`](raziel_core::Transport) over `aws-sdk-dynamodb`.
//!
//! Table provisioning is not provided here; open tables with
//! `assume_exists` or create them out of band.
#![allow(clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod config;
pub mod convert;
pub mod transport;

pub use config::SdkTransportConfig;
pub use transport::SdkTransport;
