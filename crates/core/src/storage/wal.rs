//! Write-ahead log and snapshot coordination.
//!
//! Every applied operation is appended as one `\n`-terminated line:
//! `<log_seq>|<version>|<op>|<json_payload>`. `|` separates the first three
//! fields; the remainder of the line is the single-line JSON payload, so `|`
//! inside JSON strings is safe. Sequence numbers are dense and strictly
//! increasing within one log.
//!
//! The snapshot cursor (the highest sequence whose effect is baked into the
//! snapshot files) lives in its own single-line sidecar file. Recovery
//! loads the snapshot, then replays only the log entries above the cursor.

use crate::config;
use crate::index::IndexRegistry;
use crate::storage::scalar::ScalarStore;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// One recovered log entry.
#[derive(Debug, Clone)]
pub struct WalEntry {
    /// Operation kind (currently only `upsert`).
    pub op: String,
    /// The JSON payload the operation was applied with.
    pub document: Value,
}

/// Append-only operation log with a monotonic sequence counter and the
/// snapshot cursor.
#[derive(Debug)]
pub struct Persistence {
    /// Last assigned sequence number. The first appended entry gets 2.
    current_id: u64,
    /// Highest sequence covered by the latest snapshot (0 = none).
    snapshot_cursor: u64,
    writer: BufWriter<File>,
    reader: BufReader<File>,
    cursor_path: PathBuf,
    snapshot_dir: PathBuf,
}

impl Persistence {
    /// Open (or create) the log under `data_dir` and load the snapshot
    /// cursor from its sidecar file (absent means 0).
    pub fn open(data_dir: &Path) -> io::Result<Self> {
        let wal_dir = data_dir.join(config::WAL_DIR);
        fs::create_dir_all(&wal_dir)?;
        let wal_path = wal_dir.join(config::WAL_FILE);

        let write_file = OpenOptions::new().create(true).append(true).open(&wal_path)?;
        let read_file = OpenOptions::new().read(true).open(&wal_path)?;

        let cursor_path = data_dir.join(config::SNAPSHOT_CURSOR_FILE);
        let snapshot_cursor = load_cursor(&cursor_path)?;
        tracing::debug!(snapshot_cursor, "loaded snapshot cursor");

        Ok(Self {
            current_id: 1,
            snapshot_cursor,
            writer: BufWriter::new(write_file),
            reader: BufReader::new(read_file),
            cursor_path,
            snapshot_dir: data_dir.join(config::SNAPSHOT_DIR),
        })
    }

    /// Assign and return the next sequence number.
    pub fn next_id(&mut self) -> u64 {
        self.current_id += 1;
        self.current_id
    }

    /// The last assigned sequence number.
    pub fn current(&self) -> u64 {
        self.current_id
    }

    /// The highest sequence covered by the latest snapshot.
    pub fn snapshot_cursor(&self) -> u64 {
        self.snapshot_cursor
    }

    /// Append one entry and make it durable before returning.
    ///
    /// The sequence counter advances even when the write fails: a gap in the
    /// log is tolerable, sequence reuse is not.
    pub fn append(&mut self, op: &str, document: &Value, version: &str) -> io::Result<u64> {
        let log_seq = self.next_id();
        debug_assert!(!op.contains('|') && !version.contains('|'));
        let payload = serde_json::to_string(document)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let line = format!("{log_seq}|{version}|{op}|{payload}\n");
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;
        self.writer.get_mut().sync_all()?;

        tracing::debug!(log_seq, version, op, "appended WAL entry");
        Ok(log_seq)
    }

    /// Return the next log entry above the snapshot cursor, or `None` at end
    /// of log. Entries at or below the cursor are read but skipped; the
    /// counter tracks the highest sequence seen either way.
    ///
    /// A malformed line is an error: recovery terminates at the offending
    /// entry.
    pub fn read_next(&mut self) -> io::Result<Option<WalEntry>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                tracing::debug!("no more WAL entries to read");
                return Ok(None);
            }
            let trimmed = line.trim_end_matches('\n');
            if trimmed.is_empty() {
                continue;
            }

            let mut parts = trimmed.splitn(4, '|');
            let (seq_str, version, op, payload) = match (
                parts.next(),
                parts.next(),
                parts.next(),
                parts.next(),
            ) {
                (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("malformed WAL entry: {trimmed}"),
                    ))
                }
            };
            let log_seq: u64 = seq_str.parse().map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("malformed WAL sequence number: {seq_str}"),
                )
            })?;

            if log_seq > self.current_id {
                self.current_id = log_seq;
            }

            if log_seq <= self.snapshot_cursor {
                tracing::debug!(log_seq, op, "skipping WAL entry covered by snapshot");
                continue;
            }

            let document: Value = serde_json::from_str(payload)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            tracing::debug!(log_seq, version, op, "read WAL entry");
            return Ok(Some(WalEntry {
                op: op.to_string(),
                document,
            }));
        }
    }

    /// Snapshot all indices and advance the cursor.
    ///
    /// Not atomic against concurrent writes: the caller must quiesce the
    /// database for the duration.
    pub fn take_snapshot(&mut self, registry: &IndexRegistry, store: &ScalarStore) -> io::Result<()> {
        tracing::info!(cursor = self.current_id, "taking snapshot");
        self.snapshot_cursor = self.current_id;
        registry.save_all(&self.snapshot_dir, store)?;
        save_cursor(&self.cursor_path, self.snapshot_cursor)?;
        Ok(())
    }

    /// Restore all indices from the snapshot directory.
    pub fn load_snapshot(&self, registry: &mut IndexRegistry, store: &ScalarStore) -> io::Result<()> {
        tracing::info!("loading snapshot");
        registry.load_all(&self.snapshot_dir, store)
    }
}

fn load_cursor(path: &Path) -> io::Result<u64> {
    match fs::read_to_string(path) {
        Ok(contents) => contents.trim().parse().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed snapshot cursor file {}", path.display()),
            )
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}

fn save_cursor(path: &Path, cursor: u64) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, format!("{cursor}\n"))?;
    fs::rename(&tmp_path, path)?;
    tracing::debug!(cursor, "saved snapshot cursor");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_assigns_increasing_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let mut wal = Persistence::open(dir.path()).unwrap();
        let a = wal.append("upsert", &json!({"id": 1}), "1.0").unwrap();
        let b = wal.append("upsert", &json!({"id": 2}), "1.0").unwrap();
        assert!(b > a);
        assert_eq!(wal.current(), b);
    }

    #[test]
    fn test_log_lines_are_monotonic_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut wal = Persistence::open(dir.path()).unwrap();
        for i in 0..5 {
            wal.append("upsert", &json!({"id": i}), "1.0").unwrap();
        }
        let contents =
            fs::read_to_string(dir.path().join(config::WAL_DIR).join(config::WAL_FILE)).unwrap();
        let seqs: Vec<u64> = contents
            .lines()
            .map(|l| l.split('|').next().unwrap().parse().unwrap())
            .collect();
        assert_eq!(seqs.len(), 5);
        assert!(seqs.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_read_next_replays_entries_in_order() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut wal = Persistence::open(dir.path()).unwrap();
            wal.append("upsert", &json!({"id": 1}), "1.0").unwrap();
            wal.append("upsert", &json!({"id": 2}), "1.0").unwrap();
        }
        let mut wal = Persistence::open(dir.path()).unwrap();
        let first = wal.read_next().unwrap().unwrap();
        assert_eq!(first.op, "upsert");
        assert_eq!(first.document["id"], 1);
        let second = wal.read_next().unwrap().unwrap();
        assert_eq!(second.document["id"], 2);
        assert!(wal.read_next().unwrap().is_none());
        // The counter caught up with the highest sequence on disk.
        assert_eq!(wal.current(), 3);
    }

    #[test]
    fn test_pipe_inside_json_payload_survives() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut wal = Persistence::open(dir.path()).unwrap();
            wal.append("upsert", &json!({"id": 1, "name": "a|b|c"}), "1.0")
                .unwrap();
        }
        let mut wal = Persistence::open(dir.path()).unwrap();
        let entry = wal.read_next().unwrap().unwrap();
        assert_eq!(entry.document["name"], "a|b|c");
    }

    #[test]
    fn test_malformed_entry_terminates_replay() {
        let dir = tempfile::tempdir().unwrap();
        let wal_path = dir.path().join(config::WAL_DIR).join(config::WAL_FILE);
        {
            let mut wal = Persistence::open(dir.path()).unwrap();
            wal.append("upsert", &json!({"id": 1}), "1.0").unwrap();
        }
        let mut contents = fs::read_to_string(&wal_path).unwrap();
        contents.push_str("not a wal line\n");
        fs::write(&wal_path, contents).unwrap();

        let mut wal = Persistence::open(dir.path()).unwrap();
        assert!(wal.read_next().unwrap().is_some());
        assert!(wal.read_next().is_err());
    }

    #[test]
    fn test_snapshot_cursor_roundtrip_and_skip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScalarStore::open(&dir.path().join("scalar")).unwrap();
        let registry = IndexRegistry::new();
        {
            let mut wal = Persistence::open(dir.path()).unwrap();
            wal.append("upsert", &json!({"id": 1}), "1.0").unwrap();
            wal.append("upsert", &json!({"id": 2}), "1.0").unwrap();
            wal.take_snapshot(&registry, &store).unwrap();
            wal.append("upsert", &json!({"id": 3}), "1.0").unwrap();
        }

        let mut wal = Persistence::open(dir.path()).unwrap();
        assert!(wal.snapshot_cursor() > 0);
        let entry = wal.read_next().unwrap().unwrap();
        assert_eq!(entry.document["id"], 3, "entries covered by the snapshot must be skipped");
        assert!(wal.read_next().unwrap().is_none());
    }

    #[test]
    fn test_missing_cursor_file_means_zero() {
        let dir = tempfile::tempdir().unwrap();
        let wal = Persistence::open(dir.path()).unwrap();
        assert_eq!(wal.snapshot_cursor(), 0);
    }
}
