//! Storage layer: the scalar record store and the WAL + snapshot module.

/// Scalar record store over the embedded key-value engine.
pub mod scalar;
/// Write-ahead log, snapshot cursor, and recovery reader.
pub mod wal;

pub use scalar::ScalarStore;
pub use wal::{Persistence, WalEntry};
