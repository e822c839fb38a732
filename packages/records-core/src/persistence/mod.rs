//! Snapshot persistence for the store.
//!
//! The whole store is written to `records.json` in the data directory after
//! every committed mutation. The file carries a format version and a CRC32
//! of the compact JSON encoding of the tables, checked on load.

pub mod io_utils;

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::database::Tables;
use crate::error::DbError;

use io_utils::{classify_io_error, retry_io_operation};

/// Snapshot file name inside the data directory.
pub const SNAPSHOT_FILE: &str = "records.json";
/// Snapshot format version written by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    checksum: u32,
    tables: Tables,
}

fn checksum(tables: &Tables) -> Result<u32, DbError> {
    let bytes =
        serde_json::to_vec(tables).map_err(|e| DbError::SerializationError(e.to_string()))?;
    let mut hasher = Hasher::new();
    hasher.update(&bytes);
    Ok(hasher.finalize())
}

/// Reads and writes the store snapshot.
#[derive(Debug)]
pub struct PersistenceManager {
    /// Data directory path
    data_dir: PathBuf,
    /// Maximum retry attempts for transient I/O errors
    max_retries: u32,
    /// Delay between retry attempts in milliseconds
    retry_delay_ms: u64,
}

impl PersistenceManager {
    /// Creates a manager for `data_dir` using the retry settings in `config`.
    pub fn new(data_dir: PathBuf, config: &StoreConfig) -> Self {
        Self {
            data_dir,
            max_retries: config.persistence_max_retries,
            retry_delay_ms: config.persistence_retry_delay_ms,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    /// Writes `tables` to disk, replacing the previous snapshot atomically.
    pub(crate) fn save(&self, tables: &Tables) -> Result<(), DbError> {
        retry_io_operation(
            || self.save_internal(tables),
            self.max_retries,
            self.retry_delay_ms,
            "save_snapshot",
        )
    }

    fn save_internal(&self, tables: &Tables) -> Result<(), DbError> {
        let snapshot = SnapshotFile {
            version: SNAPSHOT_VERSION,
            checksum: checksum(tables)?,
            tables: tables.clone(),
        };
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| DbError::SerializationError(e.to_string()))?;

        fs::create_dir_all(&self.data_dir)
            .map_err(|e| classify_io_error(e, "Failed to create data directory"))?;

        // Write to temporary file first
        let temp_path = self.data_dir.join(format!("{}.tmp", SNAPSHOT_FILE));
        let mut file = File::create(&temp_path)
            .map_err(|e| classify_io_error(e, "Failed to create temp file"))?;
        file.write_all(&json)
            .map_err(|e| classify_io_error(e, "Failed to write snapshot"))?;
        file.sync_all()
            .map_err(|e| classify_io_error(e, "Failed to sync snapshot"))?;

        fs::rename(&temp_path, self.snapshot_path())
            .map_err(|e| classify_io_error(e, "Failed to rename snapshot file"))?;
        Ok(())
    }

    /// Loads the snapshot, or empty tables when none has been written yet.
    pub(crate) fn load(&self) -> Result<Tables, DbError> {
        let path = self.snapshot_path();
        if !path.exists() {
            tracing::debug!("No snapshot at {}, starting empty", path.display());
            return Ok(Tables::default());
        }

        let contents = retry_io_operation(
            || {
                let mut contents = Vec::new();
                File::open(&path)
                    .and_then(|mut file| file.read_to_end(&mut contents))
                    .map_err(|e| classify_io_error(e, "Failed to read snapshot file"))?;
                Ok(contents)
            },
            self.max_retries,
            self.retry_delay_ms,
            "load_snapshot",
        )?;

        let snapshot: SnapshotFile = serde_json::from_slice(&contents).map_err(|e| {
            DbError::DataCorruption(format!("Failed to parse snapshot: {}", e))
        })?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(DbError::DataCorruption(format!(
                "Unsupported snapshot version: {}",
                snapshot.version
            )));
        }

        let actual = checksum(&snapshot.tables)?;
        if actual != snapshot.checksum {
            return Err(DbError::DataCorruption(format!(
                "Snapshot checksum mismatch: expected {:08x}, got {:08x}",
                snapshot.checksum, actual
            )));
        }

        validate_tables(&snapshot.tables)?;
        Ok(snapshot.tables)
    }
}

/// Checks the invariants a hand-edited snapshot could break.
fn validate_tables(tables: &Tables) -> Result<(), DbError> {
    for (id, playbook) in &tables.playbooks {
        if playbook.id != *id || *id > tables.last_playbook_id {
            return Err(DbError::DataCorruption(format!(
                "Playbook entry {} is inconsistent with its id {}",
                id, playbook.id
            )));
        }
    }
    for (id, record) in &tables.records {
        if record.id != *id || *id > tables.last_record_id {
            return Err(DbError::DataCorruption(format!(
                "Record entry {} is inconsistent with its id {}",
                id, record.id
            )));
        }
        if !tables.playbooks.contains_key(&record.playbook) {
            return Err(DbError::DataCorruption(format!(
                "Record {} references missing playbook {}",
                id, record.playbook
            )));
        }
    }
    Ok(())
}
