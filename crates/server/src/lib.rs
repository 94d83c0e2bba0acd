//! vexdb-server: HTTP server for vexdb.
//!
//! Provides the REST API over the single-threaded engine in `vexdb-core`.
//! The axum runtime is multi-threaded; every core access goes through one
//! mutex, which also serializes snapshots against writes.

/// REST API layer: router, handlers, request/response models, errors.
pub mod api;
