//! Transactional store holding playbook and record tables.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard};

use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::entity::{NewPlaybook, NewRecord, Playbook, Record, RecordChanges};
use crate::error::{DbError, ValidationErrors};
use crate::persistence::PersistenceManager;
use crate::query::{Page, RecordQuery};

/// Table contents plus identifier counters.
///
/// Counters only grow, so identifiers are never reused after a delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Tables {
    pub last_playbook_id: u64,
    pub last_record_id: u64,
    pub playbooks: BTreeMap<u64, Playbook>,
    pub records: BTreeMap<u64, Record>,
}

impl Tables {
    fn next_playbook_id(&mut self) -> Result<u64, DbError> {
        self.last_playbook_id = self
            .last_playbook_id
            .checked_add(1)
            .ok_or(DbError::CapacityOverflow {
                operation: "playbook id allocation",
            })?;
        Ok(self.last_playbook_id)
    }

    fn next_record_id(&mut self) -> Result<u64, DbError> {
        self.last_record_id = self
            .last_record_id
            .checked_add(1)
            .ok_or(DbError::CapacityOverflow {
                operation: "record id allocation",
            })?;
        Ok(self.last_record_id)
    }

    fn check_playbook_reference(&self, playbook: u64) -> Result<(), DbError> {
        if self.playbooks.contains_key(&playbook) {
            Ok(())
        } else {
            Err(DbError::Constraint(ValidationErrors::single(
                "playbook",
                format!("Invalid pk \"{}\" - object does not exist.", playbook),
            )))
        }
    }
}

/// Store holding every playbook and record.
///
/// Reads share a read lock. Each mutation runs as one transaction under the
/// write lock: references are checked, the change is applied, and when a
/// data directory is configured the snapshot is written before the lock is
/// released. A failed write leaves the in-memory tables untouched.
#[derive(Debug)]
pub struct Database {
    tables: RwLock<Tables>,
    persistence: Option<PersistenceManager>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            persistence: None,
        }
    }

    /// Opens the store described by `config`.
    ///
    /// Without a data directory this is the same as [`Database::new`].
    /// Otherwise the snapshot in that directory is loaded (an absent snapshot
    /// yields an empty store).
    ///
    /// # Errors
    /// `DataCorruption` when the snapshot fails its checksum or has an
    /// unsupported version, I/O errors when it cannot be read.
    pub fn open(config: &StoreConfig) -> Result<Self, DbError> {
        let Some(data_dir) = &config.data_dir else {
            return Ok(Self::new());
        };
        let persistence = PersistenceManager::new(data_dir.clone(), config);
        let tables = persistence.load()?;
        tracing::info!(
            playbooks = tables.playbooks.len(),
            records = tables.records.len(),
            "Loaded snapshot from {}",
            data_dir.display()
        );
        Ok(Self {
            tables: RwLock::new(tables),
            persistence: Some(persistence),
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, DbError> {
        self.tables.read().map_err(|_| DbError::LockPoisoned)
    }

    /// Runs `f` as one write transaction.
    ///
    /// With persistence enabled `f` works on a staged copy that replaces the
    /// live tables only after the snapshot is on disk. Without persistence
    /// `f` must perform all of its checks before mutating.
    fn transaction<T, F>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&mut Tables) -> Result<T, DbError>,
    {
        let mut tables = self.tables.write().map_err(|_| DbError::LockPoisoned)?;
        match &self.persistence {
            None => f(&mut tables),
            Some(persistence) => {
                let mut staged = tables.clone();
                let result = f(&mut staged)?;
                persistence.save(&staged)?;
                *tables = staged;
                Ok(result)
            }
        }
    }

    /// Stores a new playbook and returns it with its assigned id.
    pub fn create_playbook(&self, new_playbook: NewPlaybook) -> Result<Playbook, DbError> {
        let playbook = self.transaction(|tables| {
            let id = tables.next_playbook_id()?;
            let playbook = Playbook {
                id,
                name: new_playbook.name,
                path: new_playbook.path,
            };
            tables.playbooks.insert(id, playbook.clone());
            Ok(playbook)
        })?;
        tracing::debug!(id = playbook.id, "Created playbook");
        Ok(playbook)
    }

    pub fn get_playbook(&self, id: u64) -> Result<Playbook, DbError> {
        self.read()?
            .playbooks
            .get(&id)
            .cloned()
            .ok_or(DbError::PlaybookNotFound { id })
    }

    /// Lists playbooks in id order.
    pub fn list_playbooks(
        &self,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Page<Playbook>, DbError> {
        let tables = self.read()?;
        Ok(Page::from_ordered(
            tables.playbooks.values().cloned(),
            limit,
            offset,
        ))
    }

    pub fn playbook_count(&self) -> Result<usize, DbError> {
        Ok(self.read()?.playbooks.len())
    }

    /// Stores a validated record and returns it with its assigned id.
    ///
    /// # Errors
    /// `Constraint` when `new_record.playbook` does not exist; nothing is
    /// stored in that case.
    pub fn insert_record(&self, new_record: NewRecord) -> Result<Record, DbError> {
        let record = self.transaction(|tables| {
            tables.check_playbook_reference(new_record.playbook)?;
            let id = tables.next_record_id()?;
            let record = new_record.into_record(id);
            tables.records.insert(id, record.clone());
            Ok(record)
        })?;
        tracing::debug!(id = record.id, playbook = record.playbook, "Created record");
        Ok(record)
    }

    pub fn get_record(&self, id: u64) -> Result<Record, DbError> {
        self.read()?
            .records
            .get(&id)
            .cloned()
            .ok_or(DbError::RecordNotFound { id })
    }

    /// Lists records matching `query`.
    pub fn list_records(&self, query: &RecordQuery) -> Result<Page<Record>, DbError> {
        let tables = self.read()?;
        Ok(query.run(tables.records.values()))
    }

    /// Applies a partial update and returns the updated record.
    ///
    /// # Errors
    /// `RecordNotFound` for an unknown id, `Constraint` when the update moves
    /// the record to a playbook that does not exist.
    pub fn update_record(&self, id: u64, changes: RecordChanges) -> Result<Record, DbError> {
        if changes.is_empty() {
            return self.get_record(id);
        }
        let record = self.transaction(|tables| {
            if !tables.records.contains_key(&id) {
                return Err(DbError::RecordNotFound { id });
            }
            if let Some(playbook) = changes.playbook {
                tables.check_playbook_reference(playbook)?;
            }
            let record = tables
                .records
                .get_mut(&id)
                .ok_or(DbError::RecordNotFound { id })?;
            changes.apply(record);
            Ok(record.clone())
        })?;
        tracing::debug!(id, "Updated record");
        Ok(record)
    }

    /// Removes a record and returns the removed row.
    pub fn delete_record(&self, id: u64) -> Result<Record, DbError> {
        let record = self.transaction(|tables| {
            tables
                .records
                .remove(&id)
                .ok_or(DbError::RecordNotFound { id })
        })?;
        tracing::debug!(id, "Deleted record");
        Ok(record)
    }

    pub fn record_count(&self) -> Result<usize, DbError> {
        Ok(self.read()?.records.len())
    }
}
