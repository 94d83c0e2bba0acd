//! The vector database orchestrator.
//!
//! Owns the scalar store, the persistence module, and the index registry.
//! An upsert flows through five steps in order: existing-record lookup,
//! old-vector removal (flat index only), ANN insert, filter-index updates,
//! authoritative scalar write. The WAL entry is appended by the RPC layer
//! *after* the full upsert returns, so a crash mid-upsert discards all five
//! steps on replay.

use crate::config;
use crate::document;
use crate::filter::SearchFilter;
use crate::index::{IndexKind, IndexRegistry};
use crate::storage::{Persistence, ScalarStore};
use roaring::RoaringBitmap;
use serde_json::Value;
use std::io;
use std::path::Path;

/// The database: indices, scalar records, and durability.
#[derive(Debug)]
pub struct VectorDatabase {
    registry: IndexRegistry,
    scalar: ScalarStore,
    persistence: Persistence,
}

impl VectorDatabase {
    /// Open the database rooted at `data_dir` with an initialized registry.
    ///
    /// Call [`reload`](Self::reload) afterwards to restore persisted state.
    pub fn open(data_dir: &Path, registry: IndexRegistry) -> io::Result<Self> {
        let scalar = ScalarStore::open(&data_dir.join(config::SCALAR_STORAGE_DIR))?;
        let persistence = Persistence::open(data_dir)?;
        Ok(Self {
            registry,
            scalar,
            persistence,
        })
    }

    /// Insert or update a record.
    pub fn upsert(&mut self, id: u64, data: &Value, kind: IndexKind) -> io::Result<()> {
        tracing::debug!(id, kind = ?kind, "upsert");

        let existing = self.scalar.get_scalar(id)?;

        // Drop the old vector where the index supports it. The graph index
        // cannot remove: its stale vector stays reachable until overwritten
        // results are post-filtered away.
        if existing.is_object() {
            match kind {
                IndexKind::Flat => {
                    if let Some(index) = self.registry.get_mut(kind) {
                        index.remove(&[id])?;
                    }
                }
                IndexKind::Hnsw => {
                    tracing::debug!(id, "skipping removal on graph index");
                }
                _ => {}
            }
        }

        let vector = document::extract_vector(data).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "document has no usable `vectors` field",
            )
        })?;
        // No adapter for this kind: skip the ANN step. The filter update
        // and the authoritative scalar write still run.
        match self.registry.get_mut(kind) {
            Some(index) => index.insert(&vector, id)?,
            None => tracing::debug!(id, kind = ?kind, "no ANN index for kind, skipping vector insert"),
        }

        if let Some(filter) = self.registry.filter_mut() {
            for (field, value) in document::int_fields(data) {
                let old_value = if existing.is_object() {
                    document::int_field(&existing, field)
                } else {
                    None
                };
                filter.update(field, old_value, value, id);
            }
        }

        self.scalar.insert_scalar(id, data)
    }

    /// Point lookup. Returns `Value::Null` for a miss.
    pub fn query(&self, id: u64) -> io::Result<Value> {
        self.scalar.get_scalar(id)
    }

    /// Insert a vector directly into an ANN index, bypassing the scalar
    /// store, the filter index, and the log.
    pub fn insert_vector(&mut self, id: u64, vector: &[f32], kind: IndexKind) -> io::Result<()> {
        let index = self.registry.get_mut(kind).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "index kind not initialized")
        })?;
        index.insert(vector, id)
    }

    /// k-NN search, optionally restricted to the records matching `filter`.
    ///
    /// An unknown or uninitialized index kind yields empty results. Padding
    /// identifiers (`-1`) from the flat index are passed through; consumers
    /// filter them before surfacing results.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        kind: IndexKind,
        filter: Option<&SearchFilter>,
    ) -> io::Result<(Vec<i64>, Vec<f32>)> {
        let index = match self.registry.get(kind) {
            Some(index) => index,
            None => return Ok((Vec::new(), Vec::new())),
        };

        let allow_set: Option<RoaringBitmap> = filter.map(|f| {
            self.registry
                .filter()
                .map_or_else(RoaringBitmap::new, |fi| fi.select(&f.field, f.op, f.value))
        });

        index.search(query, k, allow_set.as_ref())
    }

    /// Append one operation to the log. Durable once this returns.
    pub fn write_wal(&mut self, op: &str, data: &Value) -> io::Result<u64> {
        self.persistence.append(op, data, config::WAL_VERSION)
    }

    /// Snapshot all indices and advance the cursor. The caller must hold off
    /// concurrent writes for the duration.
    pub fn take_snapshot(&mut self) -> io::Result<()> {
        self.persistence.take_snapshot(&self.registry, &self.scalar)
    }

    /// Startup recovery: restore the latest snapshot, then re-drive the
    /// write path with every log entry above the snapshot cursor.
    pub fn reload(&mut self) -> io::Result<()> {
        self.persistence
            .load_snapshot(&mut self.registry, &self.scalar)?;

        let mut replayed = 0usize;
        while let Some(entry) = self.persistence.read_next()? {
            if entry.op != "upsert" {
                tracing::warn!(op = %entry.op, "skipping unknown WAL operation");
                continue;
            }
            let id = entry
                .document
                .get(config::ID_FIELD)
                .and_then(Value::as_u64)
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidData, "WAL upsert payload has no id")
                })?;
            let kind = document::index_kind(&entry.document);
            self.upsert(id, &entry.document, kind)?;
            replayed += 1;
        }
        tracing::info!(replayed, "WAL replay complete");
        Ok(())
    }

    /// The index registry (for diagnostics and tests).
    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;
    use crate::filter::FilterOp;
    use serde_json::json;

    fn registry(dim: usize) -> IndexRegistry {
        let mut reg = IndexRegistry::new();
        reg.init(IndexKind::Flat, dim, None, DistanceMetric::L2);
        reg.init(IndexKind::Hnsw, dim, Some(1000), DistanceMetric::L2);
        reg.init(IndexKind::Filter, 0, None, DistanceMetric::L2);
        reg
    }

    fn open_db(dir: &Path) -> VectorDatabase {
        let mut db = VectorDatabase::open(dir, registry(3)).unwrap();
        db.reload().unwrap();
        db
    }

    fn record(id: u64, vector: [f32; 3], category: i64) -> Value {
        json!({
            "id": id,
            "vectors": vector,
            "name": "A",
            "version": 1,
            "category": category,
            "indexType": "FLAT"
        })
    }

    #[test]
    fn test_upsert_query_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = open_db(dir.path());
        let doc = record(10, [0.1, 0.2, 0.3], 100);
        db.upsert(10, &doc, IndexKind::Flat).unwrap();
        assert_eq!(db.query(10).unwrap(), doc);
    }

    #[test]
    fn test_query_miss_is_null() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(dir.path());
        assert!(db.query(404).unwrap().is_null());
    }

    #[test]
    fn test_overwrite_takes_last_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = open_db(dir.path());
        db.upsert(10, &record(10, [0.1, 0.2, 0.3], 100), IndexKind::Flat)
            .unwrap();
        let second = record(10, [0.4, 0.5, 0.6], 150);
        db.upsert(10, &second, IndexKind::Flat).unwrap();
        assert_eq!(db.query(10).unwrap(), second);

        // The flat index dropped the old vector: searching near the old
        // position finds the new row once, not a duplicate.
        let (ids, _) = db
            .search(&[0.4, 0.5, 0.6], 2, IndexKind::Flat, None)
            .unwrap();
        assert_eq!(ids[0], 10);
        assert_eq!(ids[1], -1);
    }

    #[test]
    fn test_search_by_self_returns_zero_distance() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = open_db(dir.path());
        db.upsert(10, &record(10, [0.1, 0.2, 0.3], 100), IndexKind::Flat)
            .unwrap();
        db.upsert(11, &record(11, [0.7, 0.8, 0.9], 100), IndexKind::Flat)
            .unwrap();

        let (ids, dists) = db
            .search(&[0.1, 0.2, 0.3], 2, IndexKind::Flat, None)
            .unwrap();
        assert_eq!(ids, vec![10, 11]);
        assert_eq!(dists[0], 0.0);
        assert!((dists[1] - 1.08).abs() < 1e-5);
    }

    #[test]
    fn test_search_unknown_kind_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_db(dir.path());
        let (ids, dists) = db
            .search(&[0.1, 0.2, 0.3], 2, IndexKind::Unknown, None)
            .unwrap();
        assert!(ids.is_empty() && dists.is_empty());
    }

    #[test]
    fn test_filtered_search_excludes_other_categories() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = open_db(dir.path());
        db.upsert(10, &record(10, [0.1, 0.2, 0.3], 100), IndexKind::Flat)
            .unwrap();
        db.upsert(11, &record(11, [0.4, 0.5, 0.6], 150), IndexKind::Flat)
            .unwrap();
        db.upsert(12, &record(12, [0.7, 0.8, 0.9], 100), IndexKind::Flat)
            .unwrap();

        let filter = SearchFilter {
            field: "category".to_string(),
            op: FilterOp::Equal,
            value: 100,
        };
        let (ids, _) = db
            .search(&[0.1, 0.2, 0.3], 3, IndexKind::Flat, Some(&filter))
            .unwrap();
        let hits: Vec<i64> = ids.into_iter().filter(|&id| id != -1).collect();
        assert_eq!(hits, vec![10, 12]);
    }

    #[test]
    fn test_upsert_moves_filter_posting() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = open_db(dir.path());
        db.upsert(10, &record(10, [0.1, 0.2, 0.3], 100), IndexKind::Flat)
            .unwrap();
        assert!(db.registry().filter().unwrap().contains("category", 100, 10));

        db.upsert(10, &record(10, [0.1, 0.2, 0.3], 999), IndexKind::Flat)
            .unwrap();
        let filter = db.registry().filter().unwrap();
        assert!(!filter.contains("category", 100, 10));
        assert!(filter.contains("category", 999, 10));
    }

    #[test]
    fn test_replay_restores_records() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut db = open_db(dir.path());
            for id in [10u64, 11, 20, 21] {
                let doc = record(id, [id as f32, 0.0, 0.0], 100);
                db.upsert(id, &doc, IndexKind::Flat).unwrap();
                db.write_wal("upsert", &doc).unwrap();
            }
        }
        let db = open_db(dir.path());
        for id in [10u64, 11, 20, 21] {
            assert!(db.query(id).unwrap().is_object(), "record {id} lost across restart");
        }
        let (ids, dists) = db.search(&[10.0, 0.0, 0.0], 1, IndexKind::Flat, None).unwrap();
        assert_eq!(ids, vec![10]);
        assert_eq!(dists[0], 0.0);
    }

    #[test]
    fn test_snapshot_then_restart_covers_both_paths() {
        // Records before the snapshot come back via the snapshot files;
        // records after it come back via WAL replay.
        let dir = tempfile::tempdir().unwrap();
        {
            let mut db = open_db(dir.path());
            let doc = record(10, [1.0, 0.0, 0.0], 100);
            db.upsert(10, &doc, IndexKind::Flat).unwrap();
            db.write_wal("upsert", &doc).unwrap();
            db.take_snapshot().unwrap();

            let doc = record(11, [0.0, 1.0, 0.0], 150);
            db.upsert(11, &doc, IndexKind::Flat).unwrap();
            db.write_wal("upsert", &doc).unwrap();
        }

        let db = open_db(dir.path());
        assert!(db.query(10).unwrap().is_object());
        assert!(db.query(11).unwrap().is_object());
        let (ids, _) = db.search(&[1.0, 0.0, 0.0], 1, IndexKind::Flat, None).unwrap();
        assert_eq!(ids, vec![10]);
        let (ids, _) = db.search(&[0.0, 1.0, 0.0], 1, IndexKind::Flat, None).unwrap();
        assert_eq!(ids, vec![11]);
    }

    #[test]
    fn test_replay_is_idempotent_across_clean_restarts() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut db = open_db(dir.path());
            let doc = record(10, [1.0, 0.0, 0.0], 100);
            db.upsert(10, &doc, IndexKind::Flat).unwrap();
            db.write_wal("upsert", &doc).unwrap();
        }
        let first = open_db(dir.path()).query(10).unwrap();
        let second = open_db(dir.path()).query(10).unwrap();
        assert_eq!(first, second);

        // The filter index rebuilt identically each time.
        let db = open_db(dir.path());
        assert!(db.registry().filter().unwrap().contains("category", 100, 10));
        assert_eq!(db.registry().filter().unwrap().posting_count(), 2);
    }

    #[test]
    fn test_hnsw_upsert_and_search() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = open_db(dir.path());
        let doc = json!({
            "id": 30, "vectors": [0.2, 0.2, 0.2], "category": 7, "indexType": "HNSW"
        });
        db.upsert(30, &doc, IndexKind::Hnsw).unwrap();
        let (ids, dists) = db.search(&[0.2, 0.2, 0.2], 1, IndexKind::Hnsw, None).unwrap();
        assert_eq!(ids, vec![30]);
        assert!(dists[0] < 1e-6);
    }

    #[test]
    fn test_upsert_unknown_kind_still_writes_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = open_db(dir.path());
        let doc = json!({"id": 40, "vectors": [0.3, 0.3, 0.3], "category": 100});
        db.upsert(40, &doc, IndexKind::Unknown).unwrap();

        // The ANN step was skipped, the filter and scalar writes ran.
        assert_eq!(db.query(40).unwrap(), doc);
        assert!(db.registry().filter().unwrap().contains("category", 100, 40));
        let (ids, _) = db.search(&[0.3, 0.3, 0.3], 1, IndexKind::Flat, None).unwrap();
        assert_eq!(ids, vec![-1]);
    }

    #[test]
    fn test_replay_tolerates_unknown_index_kind() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut db = open_db(dir.path());
            let doc = json!({
                "id": 50, "vectors": [0.5, 0.5, 0.5], "category": 1, "indexType": "LSH"
            });
            db.upsert(50, &doc, IndexKind::Unknown).unwrap();
            db.write_wal("upsert", &doc).unwrap();
            let doc = record(51, [1.0, 1.0, 1.0], 2);
            db.upsert(51, &doc, IndexKind::Flat).unwrap();
            db.write_wal("upsert", &doc).unwrap();
        }
        // Replay must not abort at the unrecognized-kind entry.
        let db = open_db(dir.path());
        assert!(db.query(50).unwrap().is_object());
        assert!(db.query(51).unwrap().is_object());
        let (ids, _) = db.search(&[1.0, 1.0, 1.0], 1, IndexKind::Flat, None).unwrap();
        assert_eq!(ids, vec![51]);
    }

    #[test]
    fn test_upsert_without_vectors_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = open_db(dir.path());
        let err = db
            .upsert(1, &json!({"id": 1, "category": 5}), IndexKind::Flat)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
