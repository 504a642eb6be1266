//! Row storage of one in-memory table.
//!
//! ```text
//! DashMap<hkey, BTreeMap<rkey, Item>>
//! ```
//!
//! Partitions can be read and written concurrently; within a partition rows
//! are ordered by the UTF-8 bytes of their sort key, which is the store's
//! ordering for string keys.

use std::collections::BTreeMap;
use std::ops::Bound;

use dashmap::DashMap;
use raziel_model::{AttributeValue, Item};

use crate::key::{HASH_KEY, RANGE_KEY};

/// A row address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RowKey {
    /// Partition column.
    pub hash: String,
    /// Sort column.
    pub range: String,
}

impl RowKey {
    /// Read the key columns of `item`; `None` if either is missing or not a string.
    #[must_use]
    pub fn from_item(item: &Item) -> Option<Self> {
        Some(Self {
            hash: item.get(HASH_KEY)?.as_s()?.to_owned(),
            range: item.get(RANGE_KEY)?.as_s()?.to_owned(),
        })
    }

    /// The key as a start/last-evaluated key map.
    #[must_use]
    pub fn to_item(&self) -> Item {
        [
            (HASH_KEY.to_owned(), AttributeValue::s(&self.hash)),
            (RANGE_KEY.to_owned(), AttributeValue::s(&self.range)),
        ]
        .into_iter()
        .collect()
    }
}

/// One table's rows.
#[derive(Debug, Default)]
pub struct TableStorage {
    partitions: DashMap<String, BTreeMap<String, Item>>,
}

impl TableStorage {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a row, returning the previous one.
    pub fn put(&self, key: RowKey, item: Item) -> Option<Item> {
        self.partitions
            .entry(key.hash)
            .or_default()
            .insert(key.range, item)
    }

    /// Read a row.
    #[must_use]
    pub fn get(&self, key: &RowKey) -> Option<Item> {
        self.partitions
            .get(&key.hash)
            .and_then(|partition| partition.get(&key.range).cloned())
    }

    /// Remove a row, returning it.
    pub fn delete(&self, key: &RowKey) -> Option<Item> {
        let removed = self.partitions.get_mut(&key.hash)?.remove(&key.range);
        self.partitions.remove_if(&key.hash, |_, rows| rows.is_empty());
        removed
    }

    /// Total number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.value().len()).sum()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows of one partition after `after` (exclusive), in sort order, stopping
    /// once `accept` has said yes to `limit` of them.
    ///
    /// Returns the accepted rows and whether rows remained when the limit was
    /// reached.
    pub fn partition_rows(
        &self,
        hash: &str,
        forward: bool,
        after: Option<&str>,
        limit: usize,
        mut accept: impl FnMut(&Item) -> bool,
    ) -> (Vec<Item>, bool) {
        let Some(partition) = self.partitions.get(hash) else {
            return (Vec::new(), false);
        };
        let iter: Box<dyn Iterator<Item = (&String, &Item)>> = match (forward, after) {
            (true, Some(start)) => Box::new(
                partition.range::<str, _>((Bound::Excluded(start), Bound::Unbounded)),
            ),
            (true, None) => Box::new(partition.iter()),
            (false, Some(start)) => Box::new(
                partition
                    .range::<str, _>((Bound::Unbounded, Bound::Excluded(start)))
                    .rev(),
            ),
            (false, None) => Box::new(partition.iter().rev()),
        };
        take_accepted(iter.map(|(_, item)| item), limit, &mut accept)
    }

    /// Every row after `after` (exclusive), ordered by partition then sort key.
    pub fn all_rows(
        &self,
        after: Option<&RowKey>,
        limit: usize,
        mut accept: impl FnMut(&Item) -> bool,
    ) -> (Vec<Item>, bool) {
        let mut hashes: Vec<String> = self.partitions.iter().map(|p| p.key().clone()).collect();
        hashes.sort_unstable();

        let mut rows = Vec::new();
        for hash in hashes {
            let Some(partition) = self.partitions.get(&hash) else {
                continue;
            };
            for (range, item) in partition.iter() {
                let here = RowKey {
                    hash: hash.clone(),
                    range: range.clone(),
                };
                if after.is_some_and(|start| here <= *start) {
                    continue;
                }
                rows.push(item.clone());
            }
        }
        take_accepted(rows.iter(), limit, &mut accept)
    }
}

fn take_accepted<'a>(
    rows: impl Iterator<Item = &'a Item>,
    limit: usize,
    accept: &mut impl FnMut(&Item) -> bool,
) -> (Vec<Item>, bool) {
    let mut out = Vec::new();
    let mut rows = rows.filter(|item| accept(*item)).peekable();
    while out.len() < limit {
        match rows.next() {
            Some(item) => out.push(item.clone()),
            None => return (out, false),
        }
    }
    let more = rows.peek().is_some();
    (out, more)
}
