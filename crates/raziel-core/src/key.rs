//! Key codec: application keys to and from the two physical key columns.
//!
//! An application key is an ordered list of at least two segments. The first
//! segment becomes the partition column (`hkey`); the rest are joined with the
//! table separator into the sort column (`rkey`). Reading a row back yields a
//! two-segment key `[hkey, rkey]`; the original segmentation is not recovered.

use raziel_model::{AttributeValue, Item};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Partition key column.
pub const HASH_KEY: &str = "hkey";
/// Sort key column.
pub const RANGE_KEY: &str = "rkey";
/// Payload column, holding JSON text.
pub const VALUE: &str = "value";
/// Expiry column, holding epoch seconds.
pub const TTL: &str = "ttl";

/// An application key: an ordered list of string segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(Vec<String>);

impl Key {
    /// Build a key from its segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The segments, in order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Partition segment, if any.
    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key has no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check the segment count and that the first two segments are non-empty.
    pub fn validate(&self) -> Result<()> {
        if self.0.len() < 2 {
            return Err(Error::KeyLength);
        }
        if self.0[0].is_empty() || self.0[1].is_empty() {
            return Err(Error::KeyEmpty);
        }
        Ok(())
    }

    /// Consume the key, returning its segments.
    #[must_use]
    pub fn into_segments(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for Key {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl<const N: usize> From<[&str; N]> for Key {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

impl From<&[&str]> for Key {
    fn from(segments: &[&str]) -> Self {
        Self::new(segments.iter().copied())
    }
}

impl TryFrom<&serde_json::Value> for Key {
    type Error = Error;

    /// Accept only a JSON array of strings.
    fn try_from(value: &serde_json::Value) -> Result<Self> {
        let serde_json::Value::Array(elements) = value else {
            return Err(Error::KeyType);
        };
        elements
            .iter()
            .map(|v| v.as_str().map(str::to_owned).ok_or(Error::KeyType))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

/// The two physical key columns of a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedKey {
    /// Partition column value.
    pub hash: String,
    /// Sort column value.
    pub range: String,
}

impl EncodedKey {
    /// The key as a store key map (`hkey`, `rkey`).
    #[must_use]
    pub fn to_item(&self) -> Item {
        let mut item = Item::with_capacity(2);
        item.insert(HASH_KEY.to_owned(), AttributeValue::s(&self.hash));
        item.insert(RANGE_KEY.to_owned(), AttributeValue::s(&self.range));
        item
    }
}

/// Validate `key` and split it into the partition and sort columns.
///
/// The caller's key is never modified.
pub fn encode(key: &Key, separator: &str) -> Result<EncodedKey> {
    key.validate()?;
    let (hash, rest) = key.0.split_first().ok_or(Error::KeyLength)?;
    Ok(EncodedKey {
        hash: hash.clone(),
        range: rest.join(separator),
    })
}

/// Rebuild the two-segment key of a stored row.
#[must_use]
pub fn decode(hash: &str, range: &str) -> Key {
    Key(vec![hash.to_owned(), range.to_owned()])
}

/// Rebuild the key of a raw row from its `hkey`/`rkey` columns.
///
/// Missing or non-string columns decode as empty segments.
#[must_use]
pub fn decode_item(item: &Item) -> Key {
    let column = |name| {
        item.get(name)
            .and_then(AttributeValue::as_s)
            .unwrap_or_default()
    };
    decode(column(HASH_KEY), column(RANGE_KEY))
}
