//! Shared request fragments: batch write/read shapes and scan selection.

use serde::{Deserialize, Serialize};

use crate::attribute_value::Item;

/// What a `Query` or `Scan` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Select {
    /// Every attribute of each item.
    #[default]
    #[serde(rename = "ALL_ATTRIBUTES")]
    AllAttributes,
    /// Only the attributes named by the projection expression.
    #[serde(rename = "SPECIFIC_ATTRIBUTES")]
    SpecificAttributes,
    /// Only the number of matching items.
    #[serde(rename = "COUNT")]
    Count,
}

impl Select {
    /// Wire spelling.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllAttributes => "ALL_ATTRIBUTES",
            Self::SpecificAttributes => "SPECIFIC_ATTRIBUTES",
            Self::Count => "COUNT",
        }
    }
}

impl std::fmt::Display for Select {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element of a `BatchWriteItem` request.
///
/// Serializes externally tagged, which is exactly the wire shape:
/// `{"PutRequest": {"Item": {...}}}` or `{"DeleteRequest": {"Key": {...}}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteRequest {
    /// Insert or replace a row.
    PutRequest(PutRequest),
    /// Remove a row by key.
    DeleteRequest(DeleteRequest),
}

impl WriteRequest {
    /// Build a put request for a full row.
    #[must_use]
    pub fn put(item: Item) -> Self {
        Self::PutRequest(PutRequest { item })
    }

    /// Build a delete request for a key.
    #[must_use]
    pub fn delete(key: Item) -> Self {
        Self::DeleteRequest(DeleteRequest { key })
    }

    /// Whether this is a put.
    #[must_use]
    pub fn is_put(&self) -> bool {
        matches!(self, Self::PutRequest(_))
    }
}

/// Row payload of a batched put.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutRequest {
    /// The full row.
    pub item: Item,
}

/// Key payload of a batched delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteRequest {
    /// Key columns of the row to remove.
    pub key: Item,
}

/// Keys to fetch from one table in a `BatchGetItem` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeysAndAttributes {
    /// Key columns of each row to fetch.
    pub keys: Vec<Item>,
    /// Attributes to return; all when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    /// Name placeholders used by the projection.
    #[serde(default, skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub expression_attribute_names: std::collections::HashMap<String, String>,
    /// Strongly consistent read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,
}
