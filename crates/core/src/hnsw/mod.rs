//! Hierarchical Navigable Small World (HNSW) graph.
//!
//! The approximate nearest-neighbor structure behind the graph index
//! adapter. Vectors are stored as raw f32 in a contiguous arena
//! (struct-of-arrays layout); the graph itself is a per-node, per-layer
//! neighbor list. Nodes are never removed; the adapter layer compensates
//! with result filtering.

/// Graph structure, configuration, and vector storage.
pub mod graph;
/// Insertion with bidirectional connections and heuristic pruning.
pub mod insert;
/// Layer search and multi-layer KNN with an optional traversal filter.
pub mod search;
/// Generation-based visited set for graph traversal.
pub mod visited;

pub use graph::{HnswConfig, HnswGraph};
pub use search::{knn_search, knn_search_filtered};
