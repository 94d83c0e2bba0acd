//! HNSW graph structure and configuration.
//!
//! [`HnswConfig`] carries the tuning parameters fixed at instance creation
//! (fan-out, beam widths, capacity, distance metric). [`HnswGraph`] stores
//! the vectors in a contiguous f32 arena and the graph as per-node,
//! per-layer neighbor lists.

use crate::config;
use crate::distance::DistanceMetric;
use serde::{Deserialize, Serialize};

/// Configuration parameters for an HNSW graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Number of bidirectional links per node (layers above 0).
    pub m: usize,
    /// Maximum links per node at layer 0 (typically `2 * m`).
    pub m_max0: usize,
    /// Candidate list size during construction.
    pub ef_construction: usize,
    /// Candidate list size during search.
    pub ef_search: usize,
    /// Maximum number of layers in the graph.
    pub max_layers: usize,
    /// Maximum number of vectors this instance is expected to hold.
    pub capacity: usize,
    /// Distance function for similarity computation.
    pub metric: DistanceMetric,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: config::HNSW_DEFAULT_M,
            m_max0: config::HNSW_DEFAULT_M * 2,
            ef_construction: config::HNSW_DEFAULT_EF_CONSTRUCTION,
            ef_search: config::HNSW_DEFAULT_EF_SEARCH,
            max_layers: config::HNSW_DEFAULT_MAX_LAYERS,
            capacity: config::HNSW_DEFAULT_CAPACITY,
            metric: DistanceMetric::L2,
        }
    }
}

/// HNSW graph with a struct-of-arrays layout: one contiguous vector arena,
/// separate arrays for layer assignments and neighbor lists.
#[derive(Debug, Serialize, Deserialize)]
pub struct HnswGraph {
    pub config: HnswConfig,
    /// Vector arena: `node_count * dimension` f32 values, contiguous.
    pub vectors: Vec<f32>,
    /// Neighbor lists: `[node][layer][neighbor ids]`.
    pub neighbors: Vec<Vec<Vec<u32>>>,
    /// Top layer of each node.
    pub layers: Vec<u8>,
    pub entry_point: Option<u32>,
    pub max_layer: usize,
    pub dimension: usize,
    pub node_count: u32,
}

impl HnswGraph {
    /// Creates a new empty graph with the given dimension and configuration.
    pub fn new(dimension: usize, config: HnswConfig) -> Self {
        Self {
            config,
            vectors: Vec::new(),
            neighbors: Vec::new(),
            layers: Vec::new(),
            entry_point: None,
            max_layer: 0,
            dimension,
            node_count: 0,
        }
    }

    /// Returns the number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.node_count as usize
    }

    /// Returns `true` if the graph holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }

    /// Vector slice of the given node. O(1) slice into the arena.
    #[inline]
    pub fn vector(&self, id: u32) -> &[f32] {
        let start = id as usize * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    /// Distance from `query` to the given node's vector.
    #[inline]
    pub fn distance_to(&self, query: &[f32], id: u32) -> f32 {
        self.config.metric.distance(query, self.vector(id))
    }

    /// Generate a random layer for a new node (exponential distribution).
    pub fn random_level(&self) -> usize {
        let ml = 1.0 / (self.config.m as f64).ln();
        let r: f64 = rand::random();
        let level = (-r.ln() * ml).floor() as usize;
        level.min(self.config.max_layers - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_empty_graph() {
        let g = HnswGraph::new(8, HnswConfig::default());
        assert_eq!(g.dimension, 8);
        assert!(g.is_empty());
        assert!(g.entry_point.is_none());
    }

    #[test]
    fn test_random_level_respects_max_layers() {
        let g = HnswGraph::new(4, HnswConfig::default());
        for _ in 0..200 {
            assert!(g.random_level() < g.config.max_layers);
        }
    }

    #[test]
    fn test_vector_slice() {
        let mut g = HnswGraph::new(2, HnswConfig::default());
        g.vectors.extend_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        g.node_count = 2;
        assert_eq!(g.vector(0), &[1.0, 2.0]);
        assert_eq!(g.vector(1), &[3.0, 4.0]);
    }
}
