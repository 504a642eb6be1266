//! Request parameters for the seven store RPCs.
//!
//! Field names serialize in `PascalCase` to match the store's JSON protocol.
//! Absent options and empty maps are skipped so logged requests stay minimal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute_value::{AttributeValue, Item};
use crate::types::{KeysAndAttributes, Select, WriteRequest};

/// Parameters of `PutItem`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutItemInput {
    /// Target table.
    pub table_name: String,
    /// The full row to write.
    pub item: Item,
    /// Condition that must hold for the write to be applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,
    /// Name placeholders used by the condition.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
    /// Value placeholders used by the condition.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
}

/// Parameters of `GetItem`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetItemInput {
    /// Target table.
    pub table_name: String,
    /// Key columns of the row.
    pub key: Item,
    /// Strongly consistent read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,
    /// Attributes to return; all when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    /// Name placeholders used by the projection.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
}

/// Parameters of `DeleteItem`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteItemInput {
    /// Target table.
    pub table_name: String,
    /// Key columns of the row.
    pub key: Item,
    /// Condition that must hold for the delete to be applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,
    /// Name placeholders used by the condition.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
    /// Value placeholders used by the condition.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
}

/// Parameters of `Query`: a key-conditioned read of one partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryInput {
    /// Target table.
    pub table_name: String,
    /// Condition on the key columns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_condition_expression: Option<String>,
    /// Post-condition on non-key attributes, applied after the key range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,
    /// Attributes to return; all when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    /// Name placeholders shared by every expression of the request.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
    /// Value placeholders shared by every expression of the request.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    /// Ascending (`true`, default) or descending sort-key order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_index_forward: Option<bool>,
    /// Maximum number of items to evaluate in this page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
    /// Resume point from a previous page's `LastEvaluatedKey`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub exclusive_start_key: Item,
    /// What to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<Select>,
}

/// Parameters of `Scan`: an unconditioned read of the whole table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanInput {
    /// Target table.
    pub table_name: String,
    /// Post-condition applied to every scanned item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,
    /// Attributes to return; all when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    /// Name placeholders shared by every expression of the request.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
    /// Value placeholders shared by every expression of the request.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    /// Maximum number of items to evaluate in this page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
    /// Resume point from a previous page's `LastEvaluatedKey`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub exclusive_start_key: Item,
    /// What to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<Select>,
}

/// Parameters of `BatchGetItem`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchGetItemInput {
    /// Keys to fetch, per table.
    pub request_items: HashMap<String, KeysAndAttributes>,
}

/// Parameters of `BatchWriteItem`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchWriteItemInput {
    /// Puts and deletes to apply, per table.
    pub request_items: HashMap<String, Vec<WriteRequest>>,
}
