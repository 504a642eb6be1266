//! Batch assembler: turns put/delete operations into store write requests.

use raziel_model::types::WriteRequest;
use raziel_model::{AttributeValue, Item};

use crate::error::{Error, Result};
use crate::key::{self, EncodedKey, Key};
use crate::ttl::Ttl;

/// Most write requests one `BatchWriteItem` call accepts.
pub const MAX_BATCH_WRITE: usize = 25;
/// Most keys one `BatchGetItem` call accepts.
pub const MAX_BATCH_GET: usize = 100;

/// One element of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// Insert or replace a row.
    Put {
        /// Application key.
        key: Key,
        /// Payload, stored as JSON text.
        value: serde_json::Value,
        /// Expiry.
        ttl: Option<Ttl>,
        /// Extra columns merged into the row.
        attributes: Item,
    },
    /// Remove a row.
    Delete {
        /// Application key.
        key: Key,
    },
}

impl BatchOp {
    /// A put without expiry or extra columns.
    pub fn put(key: impl Into<Key>, value: serde_json::Value) -> Self {
        Self::Put {
            key: key.into(),
            value,
            ttl: None,
            attributes: Item::new(),
        }
    }

    /// A delete.
    pub fn delete(key: impl Into<Key>) -> Self {
        Self::Delete { key: key.into() }
    }

    /// Set the expiry of a put. Deletes are returned unchanged.
    #[must_use]
    pub fn with_ttl(mut self, expires: impl Into<Ttl>) -> Self {
        if let Self::Put { ttl, .. } = &mut self {
            *ttl = Some(expires.into());
        }
        self
    }

    /// Add an extra column to a put. Deletes are returned unchanged.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        if let Self::Put { attributes, .. } = &mut self {
            attributes.insert(name.into(), value);
        }
        self
    }

    /// The application key.
    #[must_use]
    pub fn key(&self) -> &Key {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }

    /// Encode into a store write request.
    pub fn to_write_request(&self, separator: &str) -> Result<WriteRequest> {
        match self {
            Self::Put {
                key,
                value,
                ttl,
                attributes,
            } => {
                let encoded = key::encode(key, separator)?;
                let text = serde_json::to_string(value)?;
                let row = put_row(&encoded, text, attributes, ttl.as_ref())?;
                Ok(WriteRequest::put(row))
            }
            Self::Delete { key } => Ok(WriteRequest::delete(key::encode(key, separator)?.to_item())),
        }
    }
}

/// Build the full row of a put: key columns and payload, then extra columns,
/// then the `ttl` column.
pub(crate) fn put_row(
    encoded: &EncodedKey,
    value_json: String,
    attributes: &Item,
    ttl: Option<&Ttl>,
) -> Result<Item> {
    let mut row = encoded.to_item();
    row.insert(key::VALUE.to_owned(), AttributeValue::S(value_json));
    row.extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
    if let Some(ttl) = ttl.map(Ttl::to_attribute).transpose()?.flatten() {
        row.insert(key::TTL.to_owned(), ttl);
    }
    Ok(row)
}

/// Encode every operation and split the result into groups of at most
/// [`MAX_BATCH_WRITE`].
///
/// Nothing is returned unless every operation encodes, so a bad key or ttl
/// anywhere in `ops` means no group is sent. `ops` is only borrowed.
pub fn assemble(ops: &[BatchOp], separator: &str) -> Result<Vec<Vec<WriteRequest>>> {
    if ops.is_empty() {
        return Err(Error::EmptyRequest("batch"));
    }
    let requests = ops
        .iter()
        .map(|op| op.to_write_request(separator))
        .collect::<Result<Vec<_>>>()?;
    Ok(requests
        .chunks(MAX_BATCH_WRITE)
        .map(<[WriteRequest]>::to_vec)
        .collect())
}
