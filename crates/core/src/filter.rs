//! Inverted filter index over integer scalar fields.
//!
//! Maps `(field name, integer value)` to a compressed bitmap of record
//! identifiers. During search the selected bitmap acts as the allow-set
//! handed to the ANN adapters. Bitmap membership is 32-bit: record ids are
//! truncated at this boundary.
//!
//! Serialization format (stable across snapshots): one
//! `field|value|<portable-bitmap-bytes>\n` line per posting, where the
//! bitmap bytes are the roaring portable format. Field names must not
//! contain `|`.

use crate::storage::scalar::ScalarStore;
use roaring::RoaringBitmap;
use std::collections::BTreeMap;
use std::io::{self, Cursor};

/// Comparison operator for a filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    NotEqual,
}

/// A parsed filter predicate: `field op value`.
#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub field: String,
    pub op: FilterOp,
    pub value: i64,
}

/// Inverted index from `(field, value)` to a bitmap of record ids.
#[derive(Debug, Default)]
pub struct FilterIndex {
    postings: BTreeMap<String, BTreeMap<i64, RoaringBitmap>>,
}

impl FilterIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` under `posting[field][value]`, creating the bitmap if
    /// needed.
    pub fn add(&mut self, field: &str, value: i64, id: u64) {
        self.postings
            .entry(field.to_string())
            .or_default()
            .entry(value)
            .or_default()
            .insert(id as u32);
        tracing::debug!(field, value, id, "added filter posting");
    }

    /// Move `id` from the `old_value` posting (when supplied and present) to
    /// the `new_value` posting. Emptied bitmaps are kept. Falls back to
    /// [`add`](Self::add) when the field is not yet registered.
    pub fn update(&mut self, field: &str, old_value: Option<i64>, new_value: i64, id: u64) {
        match self.postings.get_mut(field) {
            Some(value_map) => {
                if let Some(old) = old_value {
                    if let Some(old_bitmap) = value_map.get_mut(&old) {
                        old_bitmap.remove(id as u32);
                    }
                }
                value_map.entry(new_value).or_default().insert(id as u32);
                tracing::debug!(field, ?old_value, new_value, id, "updated filter posting");
            }
            None => self.add(field, new_value, id),
        }
    }

    /// Select the ids satisfying `field op value`.
    ///
    /// An unregistered field yields an empty bitmap (no matches).
    pub fn select(&self, field: &str, op: FilterOp, value: i64) -> RoaringBitmap {
        let mut result = RoaringBitmap::new();
        if let Some(value_map) = self.postings.get(field) {
            match op {
                FilterOp::Equal => {
                    if let Some(bitmap) = value_map.get(&value) {
                        result |= bitmap;
                    }
                }
                FilterOp::NotEqual => {
                    for (&v, bitmap) in value_map {
                        if v != value {
                            result |= bitmap;
                        }
                    }
                }
            }
        }
        result
    }

    /// Membership test, used by tests and diagnostics.
    pub fn contains(&self, field: &str, value: i64, id: u64) -> bool {
        self.postings
            .get(field)
            .and_then(|m| m.get(&value))
            .is_some_and(|b| b.contains(id as u32))
    }

    /// Number of registered (field, value) postings.
    pub fn posting_count(&self) -> usize {
        self.postings.values().map(|m| m.len()).sum()
    }

    /// Dump every posting as `field|value|<portable-bitmap-bytes>\n`.
    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        for (field, value_map) in &self.postings {
            for (value, bitmap) in value_map {
                out.extend_from_slice(field.as_bytes());
                out.push(b'|');
                out.extend_from_slice(value.to_string().as_bytes());
                out.push(b'|');
                bitmap.serialize_into(&mut out)?;
                out.push(b'\n');
            }
        }
        Ok(out)
    }

    /// Restore a posting map dumped by [`serialize`](Self::serialize).
    ///
    /// The bitmap payload is binary and may itself contain `|` and newline
    /// bytes; the roaring decoder consumes exactly its own length, after
    /// which the line terminator is expected.
    pub fn deserialize(data: &[u8]) -> io::Result<Self> {
        let mut index = Self::new();
        let mut pos = 0usize;
        while pos < data.len() {
            let field_end = find_byte(&data[pos..], b'|').ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, "filter posting missing field separator")
            })?;
            let field = std::str::from_utf8(&data[pos..pos + field_end])
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
                .to_string();
            pos += field_end + 1;

            let value_end = find_byte(&data[pos..], b'|').ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, "filter posting missing value separator")
            })?;
            let value: i64 = std::str::from_utf8(&data[pos..pos + value_end])
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidData, "filter posting value not an integer")
                })?;
            pos += value_end + 1;

            let mut cursor = Cursor::new(&data[pos..]);
            let bitmap = RoaringBitmap::deserialize_from(&mut cursor)?;
            pos += cursor.position() as usize;

            if data.get(pos) != Some(&b'\n') {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "filter posting missing line terminator",
                ));
            }
            pos += 1;

            index
                .postings
                .entry(field)
                .or_default()
                .insert(value, bitmap);
        }
        Ok(index)
    }

    /// Persist the serialized posting map into the scalar store.
    pub fn save(&self, store: &ScalarStore, key: &str) -> io::Result<()> {
        let blob = self.serialize()?;
        store.put(key, &blob)
    }

    /// Load a posting map previously saved under `key`. A missing key yields
    /// an empty index.
    pub fn load(store: &ScalarStore, key: &str) -> io::Result<Self> {
        let blob = store.get(key)?;
        if blob.is_empty() {
            return Ok(Self::new());
        }
        Self::deserialize(&blob)
    }
}

fn find_byte(haystack: &[u8], needle: u8) -> Option<usize> {
    haystack.iter().position(|&b| b == needle)
}
