//! Recoverable move state.
//!
//! Each axis persists the offset its transform captured, the member positions
//! it was last seen at, and its last verified target. Records are keyed by
//! axis name. [`FileStore`] writes all records in one bincode file.

use kinax_common::axis::error::AxisError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Persistence failure.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Encoding error: {0}")]
    Encoding(String),
}

impl From<PersistenceError> for AxisError {
    fn from(e: PersistenceError) -> Self {
        AxisError::Persistence(e.to_string())
    }
}

/// What an axis needs to resume after a restart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RecoveryRecord {
    /// Offset captured by the transform.
    pub applied_offset: f64,
    /// Member positions at save time, in role order.
    pub reference_positions: Vec<f64>,
    /// Last verified logical target.
    pub target: Option<f64>,
}

impl RecoveryRecord {
    pub fn new(applied_offset: f64, reference_positions: Vec<f64>, target: Option<f64>) -> Self {
        Self {
            applied_offset,
            reference_positions,
            target,
        }
    }

    /// Whether `positions` match the stored ones within `precisions`.
    pub fn matches(&self, positions: &[f64], precisions: &[f64]) -> bool {
        self.reference_positions.len() == positions.len()
            && self
                .reference_positions
                .iter()
                .zip(positions)
                .enumerate()
                .all(|(i, (stored, now))| {
                    (stored - now).abs() <= precisions.get(i).copied().unwrap_or(0.0)
                })
    }
}

/// Keyed storage for recovery records.
pub trait RecoveryStore: Send + Sync {
    fn load(&self, axis: &str) -> Result<Option<RecoveryRecord>, PersistenceError>;
    fn save(&self, axis: &str, record: &RecoveryRecord) -> Result<(), PersistenceError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, RecoveryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove(&self, axis: &str) -> Option<RecoveryRecord> {
        self.records.lock().remove(axis)
    }
}

impl RecoveryStore for MemoryStore {
    fn load(&self, axis: &str) -> Result<Option<RecoveryRecord>, PersistenceError> {
        Ok(self.records.lock().get(axis).cloned())
    }

    fn save(&self, axis: &str, record: &RecoveryRecord) -> Result<(), PersistenceError> {
        self.records.lock().insert(axis.to_string(), record.clone());
        Ok(())
    }
}

/// On-disk layout.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PersistedState {
    /// Format version.
    pub version: u32,
    pub records: BTreeMap<String, RecoveryRecord>,
    /// Unix epoch seconds of the last save.
    pub saved_at: u64,
}

impl PersistedState {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            records: BTreeMap::new(),
            saved_at: 0,
        }
    }
}

/// Bincode file holding the records of every axis.
///
/// Saves are read-modify-write under a lock, so axes sharing one file do not
/// clobber each other.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_state(&self) -> Result<Option<PersistedState>, PersistenceError> {
        if !self.path.exists() {
            debug!(path = ?self.path, "state file does not exist, starting fresh");
            return Ok(None);
        }
        let file = File::open(&self.path).map_err(|e| self.io_error(e))?;
        let state: PersistedState = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| PersistenceError::Encoding(e.to_string()))?;

        if state.version != PersistedState::CURRENT_VERSION {
            warn!(
                "State file version {} differs from current {}, starting fresh",
                state.version,
                PersistedState::CURRENT_VERSION
            );
            return Ok(None);
        }
        Ok(Some(state))
    }

    fn write_state(&self, state: &mut PersistedState) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        state.saved_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let file = File::create(&self.path).map_err(|e| self.io_error(e))?;
        bincode::serialize_into(BufWriter::new(file), state)
            .map_err(|e| PersistenceError::Encoding(e.to_string()))
    }
}

impl RecoveryStore for FileStore {
    fn load(&self, axis: &str) -> Result<Option<RecoveryRecord>, PersistenceError> {
        let _guard = self.lock.lock();
        let record = self
            .read_state()?
            .and_then(|mut state| state.records.remove(axis));
        if let Some(r) = &record {
            info!(axis, offset = r.applied_offset, target = ?r.target, "loaded recovery record");
        }
        Ok(record)
    }

    fn save(&self, axis: &str, record: &RecoveryRecord) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock();
        // An unreadable file is replaced rather than blocking every save.
        let mut state = match self.read_state() {
            Ok(Some(state)) => state,
            Ok(None) => PersistedState::new(),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "discarding unreadable state file");
                PersistedState::new()
            }
        };
        state.records.insert(axis.to_string(), record.clone());
        self.write_state(&mut state)?;
        debug!(axis, path = ?self.path, "saved recovery record");
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
