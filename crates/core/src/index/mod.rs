//! Index kinds, the ANN adapter union, and the index registry.
//!
//! The registry owns one instance per index kind for the process lifetime
//! and fans out snapshot save/load across them. It is an explicit value
//! owned by the database, not process-wide state; ANN instances live in a
//! tagged union so callers never downcast.

/// Exact brute-force index with remove support.
pub mod flat;
/// HNSW graph adapter (insert-only).
pub mod hnsw;

pub use flat::FlatIndex;
pub use hnsw::HnswIndex;

use crate::config;
use crate::distance::DistanceMetric;
use crate::filter::FilterIndex;
use crate::storage::scalar::ScalarStore;
use roaring::RoaringBitmap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Magic bytes appended before the CRC32 footer of every snapshot file.
const SNAPSHOT_CRC_MAGIC: &[u8; 4] = b"VXS1";

/// The kinds of index the registry can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndexKind {
    Flat,
    Hnsw,
    Filter,
    Unknown,
}

impl IndexKind {
    /// Parse the wire name (`"FLAT"` / `"HNSW"`).
    pub fn parse(s: &str) -> Self {
        match s {
            "FLAT" => IndexKind::Flat,
            "HNSW" => IndexKind::Hnsw,
            _ => IndexKind::Unknown,
        }
    }

    /// Ordinal used in snapshot file names (`<ordinal>.index`).
    pub fn ordinal(&self) -> u8 {
        match self {
            IndexKind::Flat => 0,
            IndexKind::Hnsw => 1,
            IndexKind::Filter => 2,
            IndexKind::Unknown => u8::MAX,
        }
    }
}

/// Tagged union over the two ANN adapter types.
#[derive(Debug)]
pub enum AnnIndex {
    Flat(FlatIndex),
    Hnsw(HnswIndex),
}

impl AnnIndex {
    pub fn insert(&mut self, vector: &[f32], label: u64) -> io::Result<()> {
        match self {
            AnnIndex::Flat(idx) => idx.insert(vector, label),
            AnnIndex::Hnsw(idx) => idx.insert(vector, label),
        }
    }

    /// Remove by label. Unsupported on the graph variant.
    pub fn remove(&mut self, labels: &[u64]) -> io::Result<()> {
        match self {
            AnnIndex::Flat(idx) => idx.remove(labels),
            AnnIndex::Hnsw(idx) => idx.remove(labels),
        }
    }

    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        allow_set: Option<&RoaringBitmap>,
    ) -> io::Result<(Vec<i64>, Vec<f32>)> {
        match self {
            AnnIndex::Flat(idx) => idx.search(query, k, allow_set),
            AnnIndex::Hnsw(idx) => idx.search(query, k, allow_set),
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        match self {
            AnnIndex::Flat(idx) => idx.save(path),
            AnnIndex::Hnsw(idx) => idx.save(path),
        }
    }

    pub fn load(&mut self, path: &Path) -> io::Result<()> {
        match self {
            AnnIndex::Flat(idx) => idx.load(path),
            AnnIndex::Hnsw(idx) => idx.load(path),
        }
    }

    /// Whether this variant supports remove-by-label.
    pub fn supports_remove(&self) -> bool {
        matches!(self, AnnIndex::Flat(_))
    }
}

/// Registry of the index instances, keyed by kind.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    ann: BTreeMap<IndexKind, AnnIndex>,
    filter: Option<FilterIndex>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct and store an instance of the given kind.
    ///
    /// `capacity` and `metric` apply to the ANN kinds; the filter kind
    /// ignores both. Initializing [`IndexKind::Unknown`] is a no-op.
    pub fn init(
        &mut self,
        kind: IndexKind,
        dim: usize,
        capacity: Option<usize>,
        metric: DistanceMetric,
    ) {
        match kind {
            IndexKind::Flat => {
                self.ann.insert(kind, AnnIndex::Flat(FlatIndex::new(dim, metric)));
            }
            IndexKind::Hnsw => {
                let capacity = capacity.unwrap_or(config::HNSW_DEFAULT_CAPACITY);
                self.ann
                    .insert(kind, AnnIndex::Hnsw(HnswIndex::new(dim, capacity, metric)));
            }
            IndexKind::Filter => {
                self.filter = Some(FilterIndex::new());
            }
            IndexKind::Unknown => {
                tracing::warn!("refusing to initialize an unknown index kind");
            }
        }
    }

    /// The ANN instance for `kind`, if initialized.
    pub fn get(&self, kind: IndexKind) -> Option<&AnnIndex> {
        self.ann.get(&kind)
    }

    pub fn get_mut(&mut self, kind: IndexKind) -> Option<&mut AnnIndex> {
        self.ann.get_mut(&kind)
    }

    /// The filter index, if initialized.
    pub fn filter(&self) -> Option<&FilterIndex> {
        self.filter.as_ref()
    }

    pub fn filter_mut(&mut self) -> Option<&mut FilterIndex> {
        self.filter.as_mut()
    }

    /// Write every index to `folder/<ordinal>.index`. The filter blob is
    /// additionally stored through the scalar store.
    pub fn save_all(&self, folder: &Path, store: &ScalarStore) -> io::Result<()> {
        fs::create_dir_all(folder)?;
        for (kind, index) in &self.ann {
            let path = folder.join(format!("{}.index", kind.ordinal()));
            index.save(&path)?;
            tracing::debug!(kind = ?kind, path = %path.display(), "saved index snapshot");
        }
        if let Some(filter) = &self.filter {
            let path = folder.join(format!("{}.index", IndexKind::Filter.ordinal()));
            let blob = filter.serialize()?;
            atomic_write(&path, &blob)?;
            store.put(config::FILTER_INDEX_KEY, &blob)?;
            tracing::debug!(path = %path.display(), "saved filter index snapshot");
        }
        Ok(())
    }

    /// Load every index from `folder`, tolerating missing files (cold start
    /// for that index).
    pub fn load_all(&mut self, folder: &Path, store: &ScalarStore) -> io::Result<()> {
        for (kind, index) in &mut self.ann {
            let path = folder.join(format!("{}.index", kind.ordinal()));
            index.load(&path)?;
        }
        if self.filter.is_some() {
            let path = folder.join(format!("{}.index", IndexKind::Filter.ordinal()));
            let loaded = match fs::read(&path) {
                Ok(blob) => FilterIndex::deserialize(&blob)?,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::warn!(
                        path = %path.display(),
                        "filter index file not found, falling back to scalar store"
                    );
                    FilterIndex::load(store, config::FILTER_INDEX_KEY)?
                }
                Err(e) => return Err(e),
            };
            self.filter = Some(loaded);
        }
        Ok(())
    }
}

/// Serialize a value to `path` as `[bincode][magic][CRC32 BE]`, writing to a
/// temp file and renaming so a crash never leaves a torn snapshot.
pub(crate) fn write_snapshot_file<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let bytes = bincode::serialize(value).map_err(|e| io::Error::other(e.to_string()))?;
    let crc = crc32fast::hash(&bytes);

    let tmp_path = path.with_extension("index.tmp");
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(&bytes)?;
    file.write_all(SNAPSHOT_CRC_MAGIC)?;
    file.write_all(&crc.to_be_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Read a snapshot written by [`write_snapshot_file`]. Returns `Ok(None)`
/// for a missing file; a CRC mismatch or malformed payload is an error.
pub(crate) fn read_snapshot_file<T: DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != SNAPSHOT_CRC_MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("snapshot {} has no checksum footer", path.display()),
        ));
    }
    let payload = &raw[..raw.len() - 8];
    let stored_crc = u32::from_be_bytes([
        raw[raw.len() - 4],
        raw[raw.len() - 3],
        raw[raw.len() - 2],
        raw[raw.len() - 1],
    ]);
    let computed_crc = crc32fast::hash(payload);
    if computed_crc != stored_crc {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "snapshot CRC32 mismatch in {}: expected {:#010x}, got {:#010x}",
                path.display(),
                stored_crc,
                computed_crc
            ),
        ));
    }
    let value = bincode::deserialize(payload)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    Ok(Some(value))
}

/// Write `data` to `path` via temp file + rename.
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension("index.tmp");
    fs::write(&tmp_path, data)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOp;

    fn registry() -> IndexRegistry {
        let mut reg = IndexRegistry::new();
        reg.init(IndexKind::Flat, 3, None, DistanceMetric::L2);
        reg.init(IndexKind::Hnsw, 3, Some(1000), DistanceMetric::L2);
        reg.init(IndexKind::Filter, 0, None, DistanceMetric::L2);
        reg
    }

    #[test]
    fn test_kind_parse_and_ordinal() {
        assert_eq!(IndexKind::parse("FLAT"), IndexKind::Flat);
        assert_eq!(IndexKind::parse("HNSW"), IndexKind::Hnsw);
        assert_eq!(IndexKind::parse("bogus"), IndexKind::Unknown);
        assert_eq!(IndexKind::Flat.ordinal(), 0);
        assert_eq!(IndexKind::Hnsw.ordinal(), 1);
        assert_eq!(IndexKind::Filter.ordinal(), 2);
    }

    #[test]
    fn test_registry_get() {
        let reg = registry();
        assert!(reg.get(IndexKind::Flat).is_some());
        assert!(reg.get(IndexKind::Hnsw).is_some());
        assert!(reg.get(IndexKind::Unknown).is_none());
        assert!(reg.filter().is_some());
    }

    #[test]
    fn test_only_flat_supports_remove() {
        let reg = registry();
        assert!(reg.get(IndexKind::Flat).unwrap().supports_remove());
        assert!(!reg.get(IndexKind::Hnsw).unwrap().supports_remove());
    }

    #[test]
    fn test_save_all_load_all_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let snap_dir = dir.path().join("snapshots");
        let store = ScalarStore::open(&dir.path().join("scalar")).unwrap();

        let mut reg = registry();
        reg.get_mut(IndexKind::Flat)
            .unwrap()
            .insert(&[1.0, 0.0, 0.0], 10)
            .unwrap();
        reg.get_mut(IndexKind::Hnsw)
            .unwrap()
            .insert(&[0.0, 1.0, 0.0], 11)
            .unwrap();
        reg.filter_mut().unwrap().add("category", 100, 10);
        reg.save_all(&snap_dir, &store).unwrap();

        let mut restored = registry();
        restored.load_all(&snap_dir, &store).unwrap();
        let (ids, _) = restored
            .get(IndexKind::Flat)
            .unwrap()
            .search(&[1.0, 0.0, 0.0], 1, None)
            .unwrap();
        assert_eq!(ids, vec![10]);
        let bm = restored.filter().unwrap().select("category", FilterOp::Equal, 100);
        assert!(bm.contains(10));
    }

    #[test]
    fn test_load_all_missing_files_is_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScalarStore::open(&dir.path().join("scalar")).unwrap();
        let mut reg = registry();
        reg.load_all(&dir.path().join("nope"), &store).unwrap();
        assert!(reg.filter().unwrap().select("x", FilterOp::Equal, 1).is_empty());
    }

    #[test]
    fn test_corrupted_snapshot_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.index");
        let idx = FlatIndex::new(2, DistanceMetric::L2);
        idx.save(&path).unwrap();

        let mut raw = fs::read(&path).unwrap();
        let mid = raw.len() / 2;
        raw[mid] ^= 0xFF;
        fs::write(&path, &raw).unwrap();

        let mut fresh = FlatIndex::new(2, DistanceMetric::L2);
        assert!(fresh.load(&path).is_err());
    }
}
