//! Scalar record store.
//!
//! Persists `record id → canonical JSON document` in the embedded key-value
//! engine, plus raw byte access for snapshot metadata (the filter index
//! blob, etc.). Single-key writes are atomic; the store adds no cross-key
//! coordination.

use serde_json::Value;
use std::io;
use std::path::Path;

/// Record store over a `sled` tree.
#[derive(Debug)]
pub struct ScalarStore {
    db: sled::Db,
}

impl ScalarStore {
    /// Open (or create) the engine at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let db = sled::open(path).map_err(|e| io::Error::other(e.to_string()))?;
        Ok(Self { db })
    }

    /// Serialize `document` to canonical JSON and write it under `str(id)`,
    /// overwriting any prior value.
    pub fn insert_scalar(&self, id: u64, document: &Value) -> io::Result<()> {
        let json = serde_json::to_string(document)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.db
            .insert(id.to_string().as_bytes(), json.as_bytes())
            .map_err(|e| io::Error::other(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| io::Error::other(e.to_string()))?;
        Ok(())
    }

    /// Read the document stored under `str(id)`.
    ///
    /// A missing key returns `Value::Null`, the non-object sentinel callers
    /// test with `is_object()`.
    pub fn get_scalar(&self, id: u64) -> io::Result<Value> {
        match self
            .db
            .get(id.to_string().as_bytes())
            .map_err(|e| io::Error::other(e.to_string()))?
        {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            None => Ok(Value::Null),
        }
    }

    /// Raw byte write for snapshot metadata.
    pub fn put(&self, key: &str, value: &[u8]) -> io::Result<()> {
        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| io::Error::other(e.to_string()))?;
        self.db
            .flush()
            .map_err(|e| io::Error::other(e.to_string()))?;
        Ok(())
    }

    /// Raw byte read. A missing key returns an empty byte string.
    pub fn get(&self, key: &str) -> io::Result<Vec<u8>> {
        Ok(self
            .db
            .get(key.as_bytes())
            .map_err(|e| io::Error::other(e.to_string()))?
            .map(|ivec| ivec.to_vec())
            .unwrap_or_default())
    }
}
