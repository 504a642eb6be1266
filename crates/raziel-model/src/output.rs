//! Results of the seven store RPCs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute_value::Item;
use crate::types::{KeysAndAttributes, WriteRequest};

/// Result of `PutItem`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutItemOutput {
    /// Previous row, when the store was asked to return it.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: Item,
}

/// Result of `GetItem`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetItemOutput {
    /// The row, or `None` when no row has that key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
}

/// Result of `DeleteItem`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteItemOutput {
    /// Removed row, when the store was asked to return it.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: Item,
}

/// One page of a `Query`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryOutput {
    /// Matching rows (empty when `Select=COUNT`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    /// Number of rows that passed the filter.
    pub count: i32,
    /// Number of rows evaluated before the filter.
    pub scanned_count: i32,
    /// Continuation token; empty when this was the last page.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub last_evaluated_key: Item,
}

/// One page of a `Scan`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanOutput {
    /// Matching rows (empty when `Select=COUNT`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    /// Number of rows that passed the filter.
    pub count: i32,
    /// Number of rows evaluated before the filter.
    pub scanned_count: i32,
    /// Continuation token; empty when this was the last page.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub last_evaluated_key: Item,
}

/// Result of `BatchGetItem`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchGetItemOutput {
    /// Rows found, per table. Missing keys are simply absent.
    #[serde(default)]
    pub responses: HashMap<String, Vec<Item>>,
    /// Keys the store did not get to, per table.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub unprocessed_keys: HashMap<String, KeysAndAttributes>,
}

/// Result of `BatchWriteItem`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchWriteItemOutput {
    /// Requests the store did not apply, per table.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub unprocessed_items: HashMap<String, Vec<WriteRequest>>,
}
