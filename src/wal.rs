//! Write-ahead log (§4.6).
//!
//! Every mutation appends a record before any index mutation begins. On
//! restart, [`Wal::pending_records`] returns everything appended since the
//! last checkpoint so the facade can reconcile storage/index state against
//! it. [`Wal::checkpoint`] truncates records up to and including a sequence
//! number once the facade has confirmed their index mutations are durable.
//!
//! Disabled entirely when [`crate::config::WalConfig::enabled`] is `false`
//! or the database is opened with `Config::ephemeral = true` — in that mode
//! every method is a no-op and `append` returns a dummy sequence of 0.

use std::fs::{File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{Result, StorageError};
use crate::types::{EntityId, Timestamp};

/// The kind of mutation a WAL record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalOp {
    AddNoun,
    AddVerb,
    UpdateNoun,
    UpdateVerb,
    DeleteNoun,
    DeleteVerb,
}

/// A single write-ahead log record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalRecord {
    pub seq: u64,
    pub op: WalOp,
    pub entity: EntityId,
    /// Hash of the mutation's payload, used on replay to detect whether
    /// storage already reflects this record (not a cryptographic digest).
    pub payload_hash: u64,
    pub at: Timestamp,
}

/// Hashes a serializable payload for [`WalRecord::payload_hash`].
pub fn hash_payload<T: Hash>(payload: &T) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    payload.hash(&mut hasher);
    hasher.finish()
}

struct WalState {
    file: File,
}

/// Append-only write-ahead log backed by a single segment file.
///
/// Records are length-prefixed bincode frames. A record is durable once its
/// bytes are written and (depending on [`crate::config::SyncMode`]) synced;
/// the facade calls [`Wal::checkpoint`] once it has confirmed the
/// corresponding index mutations landed, which truncates the segment.
pub struct Wal {
    enabled: bool,
    path: PathBuf,
    state: Mutex<Option<WalState>>,
    next_seq: AtomicU64,
}

impl Wal {
    /// Opens (creating if absent) the WAL segment at `path`. If `enabled`
    /// is `false`, returns a disabled WAL that performs no I/O at all.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, enabled: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !enabled {
            debug!("WAL disabled (ephemeral or WalConfig::enabled = false)");
            return Ok(Self {
                enabled: false,
                path,
                state: Mutex::new(None),
                next_seq: AtomicU64::new(0),
            });
        }

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| StorageError::wal(format!("cannot open WAL segment: {e}")))?;

        let records = Self::read_all(&path)?;
        let next_seq = records.last().map(|r| r.seq + 1).unwrap_or(1);

        Ok(Self {
            enabled: true,
            path,
            state: Mutex::new(Some(WalState { file })),
            next_seq: AtomicU64::new(next_seq),
        })
    }

    /// Returns every record currently in the segment, oldest first. The
    /// facade replays these against storage on open to catch up any
    /// mutation whose index-side effects didn't make it to disk.
    pub fn pending_records(&self) -> Result<Vec<WalRecord>> {
        if !self.enabled {
            return Ok(Vec::new());
        }
        Self::read_all(&self.path)
    }

    /// Appends a record, returning its assigned sequence number.
    #[instrument(skip(self))]
    pub fn append(&self, op: WalOp, entity: EntityId, payload_hash: u64) -> Result<u64> {
        if !self.enabled {
            return Ok(0);
        }
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let record = WalRecord {
            seq,
            op,
            entity,
            payload_hash,
            at: Timestamp::now(),
        };
        let bytes =
            bincode::serialize(&record).map_err(|e| StorageError::wal(e.to_string()))?;
        let len = (bytes.len() as u32).to_be_bytes();

        let mut guard = self.state.lock().unwrap();
        let state = guard.as_mut().expect("WAL enabled implies state is Some");
        state
            .file
            .write_all(&len)
            .and_then(|_| state.file.write_all(&bytes))
            .and_then(|_| state.file.flush())
            .map_err(|e| StorageError::wal(format!("append failed: {e}")))?;
        Ok(seq)
    }

    /// Truncates all records with `seq <= up_to_seq`, keeping anything
    /// appended after the checkpoint was taken. Rewrites the segment in
    /// place via a temp-file-and-rename to stay crash-safe.
    #[instrument(skip(self))]
    pub fn checkpoint(&self, up_to_seq: u64) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let remaining: Vec<WalRecord> = Self::read_all(&self.path)?
            .into_iter()
            .filter(|r| r.seq > up_to_seq)
            .collect();

        let tmp_path = self.path.with_extension("wal.tmp");
        {
            let mut tmp = File::create(&tmp_path)
                .map_err(|e| StorageError::wal(format!("checkpoint tmp file: {e}")))?;
            for record in &remaining {
                let bytes =
                    bincode::serialize(record).map_err(|e| StorageError::wal(e.to_string()))?;
                tmp.write_all(&(bytes.len() as u32).to_be_bytes())
                    .and_then(|_| tmp.write_all(&bytes))
                    .map_err(|e| StorageError::wal(format!("checkpoint write: {e}")))?;
            }
            tmp.flush().map_err(|e| StorageError::wal(e.to_string()))?;
        }
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|e| StorageError::wal(format!("checkpoint rename: {e}")))?;

        let mut guard = self.state.lock().unwrap();
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StorageError::wal(format!("reopen after checkpoint: {e}")))?;
        *guard = Some(WalState { file });

        debug!(checkpoint_seq = up_to_seq, remaining = remaining.len(), "WAL checkpoint complete");
        Ok(())
    }

    /// Whether this WAL is actively logging (`false` in ephemeral mode).
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn read_all(path: &Path) -> Result<Vec<WalRecord>> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::wal(format!("cannot read WAL segment: {e}")).into()),
        };
        file.seek(SeekFrom::Start(0))
            .map_err(|e| StorageError::wal(e.to_string()))?;
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(StorageError::wal(format!("corrupt WAL length prefix: {e}")).into()),
            }
            let len = u32::from_be_bytes(len_buf) as usize;
            let mut payload = vec![0u8; len];
            if let Err(e) = reader.read_exact(&mut payload) {
                warn!(error = %e, "WAL segment truncated mid-record, stopping replay here");
                break;
            }
            match bincode::deserialize::<WalRecord>(&payload) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(error = %e, "corrupt WAL record, stopping replay here");
                    break;
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NounId;
    use tempfile::tempdir;

    #[test]
    fn test_append_and_pending_records() {
        let dir = tempdir().unwrap();
        let wal = Wal::open(dir.path().join("test.wal"), true).unwrap();

        let entity = EntityId::Noun(NounId::new());
        let seq = wal.append(WalOp::AddNoun, entity, 42).unwrap();
        assert_eq!(seq, 1);

        let pending = wal.pending_records().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].op, WalOp::AddNoun);
        assert_eq!(pending[0].payload_hash, 42);
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let dir = tempdir().unwrap();
        let wal = Wal::open(dir.path().join("test.wal"), true).unwrap();
        let entity = EntityId::Noun(NounId::new());
        let s1 = wal.append(WalOp::AddNoun, entity, 1).unwrap();
        let s2 = wal.append(WalOp::UpdateNoun, entity, 2).unwrap();
        assert!(s2 > s1);
    }

    #[test]
    fn test_checkpoint_truncates_up_to_seq() {
        let dir = tempdir().unwrap();
        let wal = Wal::open(dir.path().join("test.wal"), true).unwrap();
        let entity = EntityId::Noun(NounId::new());
        wal.append(WalOp::AddNoun, entity, 1).unwrap();
        let s2 = wal.append(WalOp::AddNoun, entity, 2).unwrap();
        let s3 = wal.append(WalOp::AddNoun, entity, 3).unwrap();

        wal.checkpoint(s2).unwrap();
        let pending = wal.pending_records().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].seq, s3);
    }

    #[test]
    fn test_reopen_recovers_pending_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let entity = EntityId::Noun(NounId::new());
        {
            let wal = Wal::open(&path, true).unwrap();
            wal.append(WalOp::AddVerb, entity, 7).unwrap();
        }
        let wal = Wal::open(&path, true).unwrap();
        let pending = wal.pending_records().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload_hash, 7);

        // Next sequence continues from where it left off.
        let next = wal.append(WalOp::AddNoun, entity, 8).unwrap();
        assert_eq!(next, 2);
    }

    #[test]
    fn test_disabled_wal_is_a_no_op() {
        let dir = tempdir().unwrap();
        let wal = Wal::open(dir.path().join("unused.wal"), false).unwrap();
        assert!(!wal.is_enabled());
        let entity = EntityId::Noun(NounId::new());
        assert_eq!(wal.append(WalOp::AddNoun, entity, 1).unwrap(), 0);
        assert!(wal.pending_records().unwrap().is_empty());
        assert!(wal.checkpoint(100).is_ok());
    }

    #[test]
    fn test_hash_payload_is_deterministic() {
        let a = hash_payload(&"hello");
        let b = hash_payload(&"hello");
        assert_eq!(a, b);
        let c = hash_payload(&"world");
        assert_ne!(a, c);
    }
}
