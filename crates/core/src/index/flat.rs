//! Exact brute-force vector index.
//!
//! Scans every stored vector per query: exact but O(n). Supports arbitrary
//! remove-by-label, which the graph index does not, so the orchestrator
//! routes old-vector removal here only.

use crate::distance::DistanceMetric;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::Path;

/// Padding identifier emitted when a query matches fewer than `k` vectors.
pub const PAD_ID: i64 = -1;

/// Brute-force flat index with label mapping.
#[derive(Debug, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    metric: DistanceMetric,
    labels: Vec<u64>,
    /// Vector arena: `labels.len() * dimension` f32 values, contiguous.
    vectors: Vec<f32>,
    label_to_slot: HashMap<u64, usize>,
}

impl FlatIndex {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            labels: Vec::new(),
            vectors: Vec::new(),
            label_to_slot: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn vector(&self, slot: usize) -> &[f32] {
        let start = slot * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    /// Insert a vector under `label`. Re-inserting an existing label
    /// overwrites its row in place.
    pub fn insert(&mut self, vector: &[f32], label: u64) -> io::Result<()> {
        if vector.len() != self.dimension {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "vector length {} does not match index dimension {}",
                    vector.len(),
                    self.dimension
                ),
            ));
        }
        if let Some(&slot) = self.label_to_slot.get(&label) {
            let start = slot * self.dimension;
            self.vectors[start..start + self.dimension].copy_from_slice(vector);
        } else {
            let slot = self.labels.len();
            self.labels.push(label);
            self.vectors.extend_from_slice(vector);
            self.label_to_slot.insert(label, slot);
        }
        Ok(())
    }

    /// Remove the rows for the given labels. Unknown labels are ignored.
    pub fn remove(&mut self, labels: &[u64]) -> io::Result<()> {
        for &label in labels {
            if let Some(slot) = self.label_to_slot.remove(&label) {
                let last = self.labels.len() - 1;
                if slot != last {
                    let moved = self.labels[last];
                    self.labels.swap(slot, last);
                    let (a, b) = (slot * self.dimension, last * self.dimension);
                    for i in 0..self.dimension {
                        self.vectors.swap(a + i, b + i);
                    }
                    self.label_to_slot.insert(moved, slot);
                }
                self.labels.pop();
                self.vectors.truncate(self.labels.len() * self.dimension);
            }
        }
        Ok(())
    }

    /// Exhaustive top-k search.
    ///
    /// `query` may hold several concatenated query vectors; its length must
    /// be a multiple of the index dimension. Results per query are sorted by
    /// ascending distance and padded with [`PAD_ID`] up to `k`. When
    /// `allow_set` is given, only labels whose (truncated) bit is set are
    /// scanned.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        allow_set: Option<&RoaringBitmap>,
    ) -> io::Result<(Vec<i64>, Vec<f32>)> {
        if self.dimension == 0 || query.len() % self.dimension != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "query length {} is not a multiple of index dimension {}",
                    query.len(),
                    self.dimension
                ),
            ));
        }
        let num_queries = query.len() / self.dimension;
        let mut ids = Vec::with_capacity(num_queries * k);
        let mut distances = Vec::with_capacity(num_queries * k);

        for q in query.chunks_exact(self.dimension) {
            let mut scored: Vec<(f32, u64)> = self
                .labels
                .iter()
                .enumerate()
                .filter(|(_, &label)| {
                    allow_set.map_or(true, |bitmap| bitmap.contains(label as u32))
                })
                .map(|(slot, &label)| (self.metric.distance(q, self.vector(slot)), label))
                .collect();
            scored.sort_unstable_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(k);

            for &(dist, label) in &scored {
                ids.push(label as i64);
                distances.push(dist);
            }
            for _ in scored.len()..k {
                ids.push(PAD_ID);
                distances.push(f32::MAX);
            }
        }

        Ok((ids, distances))
    }

    /// Serialize the index to a snapshot file.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        super::write_snapshot_file(path, self)
    }

    /// Load the index from a snapshot file. A missing file is a cold start:
    /// logged at warn, the instance is left unchanged.
    pub fn load(&mut self, path: &Path) -> io::Result<()> {
        match super::read_snapshot_file::<FlatIndex>(path)? {
            Some(loaded) => {
                *self = loaded;
                Ok(())
            }
            None => {
                tracing::warn!(path = %path.display(), "flat index file not found, skipping load");
                Ok(())
            }
        }
    }
}
