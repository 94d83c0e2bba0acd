//! Global configuration constants for vexdb.
//!
//! On-disk layout names, server defaults, index tuning parameters, and input
//! validation limits. Runtime overrides (port, data directory) are handled
//! via CLI arguments in the server binary.

/// Default HTTP server port.
pub const DEFAULT_PORT: u16 = 9729;

/// Default data directory (the service's working directory).
pub const DEFAULT_DATA_DIR: &str = ".";

/// Directory holding the key-value engine files, relative to the data dir.
pub const SCALAR_STORAGE_DIR: &str = "ScalarStorage";

/// Directory holding the write-ahead log, relative to the data dir.
pub const WAL_DIR: &str = "WALLogStorage";

/// File name of the append-only operation log inside [`WAL_DIR`].
pub const WAL_FILE: &str = "WALLog";

/// Sidecar file holding the snapshot cursor (single decimal line).
pub const SNAPSHOT_CURSOR_FILE: &str = "lastSnapshotID";

/// Directory holding one `<kind>.index` file per index kind.
pub const SNAPSHOT_DIR: &str = "snapshots";

/// Scalar-store key under which the serialized filter index round-trips.
pub const FILTER_INDEX_KEY: &str = "filter_index";

/// Schema version string written into every WAL entry.
pub const WAL_VERSION: &str = "1.0";

/// Reserved document field holding the record's vector.
pub const VECTOR_FIELD: &str = "vectors";

/// Reserved document field holding the record identifier.
pub const ID_FIELD: &str = "id";

/// Reserved document field naming the ANN index that owns the vector.
pub const INDEX_TYPE_FIELD: &str = "indexType";

/// Default number of bidirectional links per HNSW node.
pub const HNSW_DEFAULT_M: usize = 16;

/// Default candidate list size during HNSW construction.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default candidate list size during HNSW search.
///
/// Higher values improve recall at the cost of latency.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 50;

/// Maximum number of layers in the HNSW graph.
pub const HNSW_DEFAULT_MAX_LAYERS: usize = 16;

/// Default maximum capacity for a graph index instance.
pub const HNSW_DEFAULT_CAPACITY: usize = 1_000_000;

/// Maximum allowed vector dimension.
pub const MAX_DIMENSION: usize = 4096;

/// Maximum number of results (`k`) per search request.
pub const MAX_K: usize = 10_000;
