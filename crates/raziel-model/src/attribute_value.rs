//! Attribute values as the store represents them on the wire.
//!
//! Every value is a single-key JSON object naming its type, e.g. `{"S": "a"}`
//! or `{"N": "1700000000"}`. Numbers stay string-encoded end to end.

use std::collections::HashMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A full row (or key) as a map of attribute name to value.
pub type Item = HashMap<String, AttributeValue>;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// String.
    S(String),
    /// Number, string-encoded.
    N(String),
    /// Binary (base64 on the wire).
    B(bytes::Bytes),
    /// String set.
    Ss(Vec<String>),
    /// Number set.
    Ns(Vec<String>),
    /// Binary set.
    Bs(Vec<bytes::Bytes>),
    /// Boolean.
    Bool(bool),
    /// Null marker.
    Null(bool),
    /// List.
    L(Vec<AttributeValue>),
    /// Map.
    M(HashMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Shorthand for a string value.
    #[must_use]
    pub fn s(value: impl Into<String>) -> Self {
        Self::S(value.into())
    }

    /// Shorthand for a number value from anything displayable.
    #[must_use]
    pub fn n(value: impl fmt::Display) -> Self {
        Self::N(value.to_string())
    }

    /// The string payload of an `S` value.
    #[must_use]
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    /// The raw number text of an `N` value.
    #[must_use]
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    /// An `N` value parsed as `f64`, or `None` for other variants and
    /// unparseable numbers.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_n().and_then(|n| n.trim().parse::<f64>().ok())
    }

    /// The type tag used on the wire (`"S"`, `"N"`, `"BOOL"`, ...).
    #[must_use]
    pub fn type_descriptor(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::B(_) => "B",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
            Self::Bs(_) => "BS",
            Self::Bool(_) => "BOOL",
            Self::Null(_) => "NULL",
            Self::L(_) => "L",
            Self::M(_) => "M",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S(s) => write!(f, "S:{s}"),
            Self::N(n) => write!(f, "N:{n}"),
            Self::B(b) => write!(f, "B:<{} bytes>", b.len()),
            Self::Bool(b) => write!(f, "BOOL:{b}"),
            Self::Null(_) => f.write_str("NULL"),
            Self::Ss(v) | Self::Ns(v) => write!(f, "{}:{v:?}", self.type_descriptor()),
            Self::Bs(v) => write!(f, "BS:<{} items>", v.len()),
            Self::L(v) => write!(f, "L:<{} items>", v.len()),
            Self::M(m) => write!(f, "M:<{} keys>", m.len()),
        }
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::S(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::S(value.to_owned())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::S(s) => map.serialize_entry("S", s)?,
            Self::N(n) => map.serialize_entry("N", n)?,
            Self::B(b) => map.serialize_entry("B", &STANDARD.encode(b))?,
            Self::Ss(v) => map.serialize_entry("SS", v)?,
            Self::Ns(v) => map.serialize_entry("NS", v)?,
            Self::Bs(v) => {
                let encoded: Vec<String> = v.iter().map(|b| STANDARD.encode(b)).collect();
                map.serialize_entry("BS", &encoded)?;
            }
            Self::Bool(b) => map.serialize_entry("BOOL", b)?,
            Self::Null(b) => map.serialize_entry("NULL", b)?,
            Self::L(list) => map.serialize_entry("L", list)?,
            Self::M(m) => map.serialize_entry("M", m)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TaggedValueVisitor)
    }
}

const TYPE_TAGS: &[&str] = &["S", "N", "B", "SS", "NS", "BS", "BOOL", "NULL", "L", "M"];

fn decode_binary<E: de::Error>(encoded: &str) -> Result<bytes::Bytes, E> {
    STANDARD
        .decode(encoded)
        .map(bytes::Bytes::from)
        .map_err(E::custom)
}

struct TaggedValueVisitor;

impl<'de> Visitor<'de> for TaggedValueVisitor {
    type Value = AttributeValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an object with exactly one type tag")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
        let Some(tag) = map.next_key::<String>()? else {
            return Err(de::Error::custom("attribute value has no type tag"));
        };

        let value = match tag.as_str() {
            "S" => AttributeValue::S(map.next_value()?),
            "N" => AttributeValue::N(map.next_value()?),
            "B" => AttributeValue::B(decode_binary::<M::Error>(&map.next_value::<String>()?)?),
            "SS" => AttributeValue::Ss(map.next_value()?),
            "NS" => AttributeValue::Ns(map.next_value()?),
            "BS" => AttributeValue::Bs(
                map.next_value::<Vec<String>>()?
                    .iter()
                    .map(|e| decode_binary::<M::Error>(e))
                    .collect::<Result<Vec<_>, M::Error>>()?,
            ),
            "BOOL" => AttributeValue::Bool(map.next_value()?),
            "NULL" => AttributeValue::Null(map.next_value()?),
            "L" => AttributeValue::L(map.next_value()?),
            "M" => AttributeValue::M(map.next_value()?),
            other => return Err(de::Error::unknown_field(other, TYPE_TAGS)),
        };

        if map.next_key::<String>()?.is_some() {
            return Err(de::Error::custom("attribute value has more than one type tag"));
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_serialize_key_columns_as_tagged_objects() {
        let json = serde_json::to_string(&AttributeValue::s("a")).unwrap();
        assert_eq!(json, r#"{"S":"a"}"#);

        let json = serde_json::to_string(&AttributeValue::n(1_700_000_000)).unwrap();
        assert_eq!(json, r#"{"N":"1700000000"}"#);
    }

    #[test]
    fn test_should_decode_nested_map_from_cursor_json() {
        let json = r#"{"M":{"hkey":{"S":"a"},"rkey":{"S":"b/c"}}}"#;
        let value: AttributeValue = serde_json::from_str(json).unwrap();
        let map = match value {
            AttributeValue::M(m) => m,
            other => panic!("expected map, got {other}"),
        };
        assert_eq!(map.get("rkey").and_then(AttributeValue::as_s), Some("b/c"));
    }

    #[test]
    fn test_should_reject_value_with_two_tags() {
        let result: Result<AttributeValue, _> = serde_json::from_str(r#"{"S":"a","N":"1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_should_parse_fractional_number() {
        let value = AttributeValue::N("1700000000.25".to_owned());
        assert_eq!(value.as_f64(), Some(1_700_000_000.25));
        assert_eq!(AttributeValue::s("x").as_f64(), None);
    }

    #[test]
    fn test_should_carry_binary_through_base64() {
        let value = AttributeValue::B(bytes::Bytes::from_static(b"\x00\x01raw"));
        let json = serde_json::to_string(&value).unwrap();
        let back: AttributeValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
