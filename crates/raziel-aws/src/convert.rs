//! Conversions between model shapes and SDK shapes.

use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{
    AttributeValue as SdkValue, DeleteRequest as SdkDeleteRequest,
    KeysAndAttributes as SdkKeysAndAttributes, PutRequest as SdkPutRequest, Select as SdkSelect,
    WriteRequest as SdkWriteRequest,
};
use bytes::Bytes;
use raziel_model::types::{KeysAndAttributes, Select, WriteRequest};
use raziel_model::{AttributeValue, Item, TransportError, TransportErrorCode};

/// SDK item map.
pub type SdkItem = HashMap<String, SdkValue>;

fn unsupported(what: &str) -> TransportError {
    TransportError::with_message(
        TransportErrorCode::SerializationException,
        format!("unsupported {what} in store response"),
    )
}

/// Convert a model value into an SDK value.
#[must_use]
pub fn to_sdk_value(value: AttributeValue) -> SdkValue {
    match value {
        AttributeValue::S(s) => SdkValue::S(s),
        AttributeValue::N(n) => SdkValue::N(n),
        AttributeValue::B(b) => SdkValue::B(Blob::new(b.to_vec())),
        AttributeValue::Ss(set) => SdkValue::Ss(set),
        AttributeValue::Ns(set) => SdkValue::Ns(set),
        AttributeValue::Bs(set) => {
            SdkValue::Bs(set.into_iter().map(|b| Blob::new(b.to_vec())).collect())
        }
        AttributeValue::Bool(b) => SdkValue::Bool(b),
        AttributeValue::Null(b) => SdkValue::Null(b),
        AttributeValue::L(list) => SdkValue::L(list.into_iter().map(to_sdk_value).collect()),
        AttributeValue::M(map) => SdkValue::M(to_sdk_item(map)),
    }
}

/// Convert an SDK value into a model value.
pub fn from_sdk_value(value: SdkValue) -> Result<AttributeValue, TransportError> {
    Ok(match value {
        SdkValue::S(s) => AttributeValue::S(s),
        SdkValue::N(n) => AttributeValue::N(n),
        SdkValue::B(b) => AttributeValue::B(Bytes::from(b.into_inner())),
        SdkValue::Ss(set) => AttributeValue::Ss(set),
        SdkValue::Ns(set) => AttributeValue::Ns(set),
        SdkValue::Bs(set) => AttributeValue::Bs(
            set.into_iter()
                .map(|b| Bytes::from(b.into_inner()))
                .collect(),
        ),
        SdkValue::Bool(b) => AttributeValue::Bool(b),
        SdkValue::Null(b) => AttributeValue::Null(b),
        SdkValue::L(list) => AttributeValue::L(
            list.into_iter()
                .map(from_sdk_value)
                .collect::<Result<_, _>>()?,
        ),
        SdkValue::M(map) => AttributeValue::M(from_sdk_item(map)?),
        _ => return Err(unsupported("attribute type")),
    })
}

/// Convert a model item into an SDK item.
#[must_use]
pub fn to_sdk_item(item: Item) -> SdkItem {
    item.into_iter()
        .map(|(name, value)| (name, to_sdk_value(value)))
        .collect()
}

/// Convert an SDK item into a model item.
pub fn from_sdk_item(item: SdkItem) -> Result<Item, TransportError> {
    item.into_iter()
        .map(|(name, value)| Ok((name, from_sdk_value(value)?)))
        .collect()
}

/// A model map as the optional SDK map; empty maps are not sent.
#[must_use]
pub fn non_empty_item(item: Item) -> Option<SdkItem> {
    (!item.is_empty()).then(|| to_sdk_item(item))
}

/// Placeholder names as the optional SDK map; empty maps are not sent.
#[must_use]
pub fn non_empty_names(names: HashMap<String, String>) -> Option<HashMap<String, String>> {
    (!names.is_empty()).then_some(names)
}

/// An optional SDK item as a model item; absent becomes empty.
pub fn from_optional_item(item: Option<SdkItem>) -> Result<Item, TransportError> {
    item.map_or_else(|| Ok(Item::new()), from_sdk_item)
}

/// Convert the `Select` option.
#[must_use]
pub fn to_sdk_select(select: Select) -> SdkSelect {
    match select {
        Select::AllAttributes => SdkSelect::AllAttributes,
        Select::SpecificAttributes => SdkSelect::SpecificAttributes,
        Select::Count => SdkSelect::Count,
    }
}

/// Convert one write request.
pub fn to_sdk_write_request(request: WriteRequest) -> Result<SdkWriteRequest, TransportError> {
    let builder = SdkWriteRequest::builder();
    let builder = match request {
        WriteRequest::PutRequest(put) => builder.put_request(
            SdkPutRequest::builder()
                .set_item(Some(to_sdk_item(put.item)))
                .build()
                .map_err(|e| TransportError::validation(e.to_string()))?,
        ),
        WriteRequest::DeleteRequest(del) => builder.delete_request(
            SdkDeleteRequest::builder()
                .set_key(Some(to_sdk_item(del.key)))
                .build()
                .map_err(|e| TransportError::validation(e.to_string()))?,
        ),
    };
    Ok(builder.build())
}

/// Convert one write request handed back by the store.
pub fn from_sdk_write_request(request: SdkWriteRequest) -> Result<WriteRequest, TransportError> {
    if let Some(put) = request.put_request {
        return Ok(WriteRequest::put(from_sdk_item(put.item)?));
    }
    if let Some(del) = request.delete_request {
        return Ok(WriteRequest::delete(from_sdk_item(del.key)?));
    }
    Err(unsupported("write request"))
}

/// Convert the keys of one table in a batch read.
pub fn to_sdk_keys(spec: KeysAndAttributes) -> Result<SdkKeysAndAttributes, TransportError> {
    SdkKeysAndAttributes::builder()
        .set_keys(Some(spec.keys.into_iter().map(to_sdk_item).collect()))
        .set_projection_expression(spec.projection_expression)
        .set_expression_attribute_names(non_empty_names(spec.expression_attribute_names))
        .set_consistent_read(spec.consistent_read)
        .build()
        .map_err(|e| TransportError::validation(e.to_string()))
}

/// Convert keys handed back unprocessed by a batch read.
pub fn from_sdk_keys(spec: SdkKeysAndAttributes) -> Result<KeysAndAttributes, TransportError> {
    Ok(KeysAndAttributes {
        keys: spec
            .keys
            .into_iter()
            .map(from_sdk_item)
            .collect::<Result<_, _>>()?,
        projection_expression: spec.projection_expression,
        expression_attribute_names: spec.expression_attribute_names.unwrap_or_default(),
        consistent_read: spec.consistent_read,
    })
}
