//! # vexdb-core
//!
//! Embeddable vector database engine: exact flat and HNSW approximate
//! nearest-neighbor indices over one logical record space, an inverted
//! bitmap index for integer-field filtering, a scalar record store, and
//! crash-safe persistence via a write-ahead log plus full snapshots.
//!
//! This crate has zero async dependencies; the HTTP service lives in
//! `vexdb-server`. The engine is intentionally single-threaded; callers
//! serialize access (the server uses a mutex).

/// Global configuration constants: on-disk layout, defaults, limits.
pub mod config;
/// The database orchestrator.
pub mod db;
/// Distance metrics.
pub mod distance;
/// Record document helpers.
pub mod document;
/// Inverted filter index over integer scalar fields.
pub mod filter;
/// HNSW graph structure.
pub mod hnsw;
/// Index kinds, ANN adapters, and the index registry.
pub mod index;
/// Scalar record store and WAL + snapshot persistence.
pub mod storage;

pub use db::VectorDatabase;
pub use distance::DistanceMetric;
pub use filter::{FilterIndex, FilterOp, SearchFilter};
pub use index::{IndexKind, IndexRegistry};
