//! Graph index adapter over the HNSW structure.
//!
//! Maps client-chosen u64 labels to internal node ids and applies the
//! allow-set as a label predicate during traversal: navigation still
//! explores the full graph, only emitted candidates are filtered. With a
//! very sparse allow-set the search may therefore return fewer than `k`
//! hits even though more matching vectors exist farther from the query.
//!
//! The graph cannot remove nodes. Re-inserting an existing label adds a
//! second node under the same label; the stale vector stays reachable.

use crate::distance::DistanceMetric;
use crate::hnsw::{knn_search_filtered, HnswConfig, HnswGraph};
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// HNSW-backed approximate index with label mapping.
#[derive(Debug, Serialize, Deserialize)]
pub struct HnswIndex {
    graph: HnswGraph,
    /// Internal node id → label, indexed by node id.
    labels: Vec<u64>,
}

impl HnswIndex {
    pub fn new(dimension: usize, capacity: usize, metric: DistanceMetric) -> Self {
        let config = HnswConfig {
            capacity,
            metric,
            ..HnswConfig::default()
        };
        Self {
            graph: HnswGraph::new(dimension, config),
            labels: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.graph.dimension
    }

    /// Add a vector under `label`.
    pub fn insert(&mut self, vector: &[f32], label: u64) -> io::Result<()> {
        if vector.len() != self.graph.dimension {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "vector length {} does not match index dimension {}",
                    vector.len(),
                    self.graph.dimension
                ),
            ));
        }
        let internal_id = self.graph.node_count;
        self.graph.insert(internal_id, vector);
        self.labels.push(label);
        Ok(())
    }

    /// Removal is unsupported on the graph index.
    pub fn remove(&mut self, _labels: &[u64]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "HNSW index does not support removing vectors",
        ))
    }

    /// Graph search with a dynamic beam and an optional label filter.
    ///
    /// `query` may hold several concatenated query vectors. No padding is
    /// performed: each query contributes at most `k` results.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        allow_set: Option<&RoaringBitmap>,
    ) -> io::Result<(Vec<i64>, Vec<f32>)> {
        let dim = self.graph.dimension;
        if dim == 0 || query.len() % dim != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "query length {} is not a multiple of index dimension {}",
                    query.len(),
                    dim
                ),
            ));
        }

        let filter = |internal_id: u32| -> bool {
            allow_set.map_or(true, |bitmap| {
                bitmap.contains(self.labels[internal_id as usize] as u32)
            })
        };

        let mut ids = Vec::new();
        let mut distances = Vec::new();
        for q in query.chunks_exact(dim) {
            for (dist, internal_id) in knn_search_filtered(&self.graph, q, k, &filter) {
                ids.push(self.labels[internal_id as usize] as i64);
                distances.push(dist);
            }
        }
        Ok((ids, distances))
    }

    /// Serialize the graph and label map to a snapshot file.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        super::write_snapshot_file(path, self)
    }

    /// Load from a snapshot file; a missing file is a cold start.
    pub fn load(&mut self, path: &Path) -> io::Result<()> {
        match super::read_snapshot_file::<HnswIndex>(path)? {
            Some(loaded) => {
                *self = loaded;
                Ok(())
            }
            None => {
                tracing::warn!(path = %path.display(), "HNSW index file not found, skipping load");
                Ok(())
            }
        }
    }
}
