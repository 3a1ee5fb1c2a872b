//! Thread-safe storage handle shared by concurrent university agents

use crate::model::{CorrectionRecord, ProgramRecord};
use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::{
    CorrectionStore, ProgramStore, Storage, StorageError, StorageResult, VisitedStore,
};
use crate::storage::UpsertOutcome;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Cloneable handle around one SQLite connection
///
/// Every operation takes the lock for a single statement (or a
/// read-then-write pair for upserts), so the guard never lives across an
/// `.await` in the caller.
///
/// Calls block the current tokio worker. Each is a single indexed statement
/// and agents number one per configured university, so this stays off
/// `spawn_blocking`; move the calls there if agents ever outnumber workers.
#[derive(Clone)]
pub struct SharedStorage {
    inner: Arc<Mutex<SqliteStorage>>,
}

impl SharedStorage {
    pub fn new(storage: SqliteStorage) -> Self {
        Self {
            inner: Arc::new(Mutex::new(storage)),
        }
    }

    /// Locks the underlying storage for direct `Storage` calls
    pub fn lock(&self) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
        self.inner.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

impl VisitedStore for SharedStorage {
    fn get_visited(&self, university: &str) -> StorageResult<HashSet<String>> {
        self.lock()?.load_visited(university)
    }

    fn mark_visited(&self, university: &str, url: &str) -> StorageResult<()> {
        self.lock()?.insert_visited(university, url)?;
        Ok(())
    }
}

impl CorrectionStore for SharedStorage {
    fn get_corrections(&self, university: &str) -> StorageResult<HashMap<String, CorrectionRecord>> {
        self.lock()?.load_corrections(university)
    }

    fn put_correction(
        &self,
        university: &str,
        program_name: &str,
        correction: &CorrectionRecord,
    ) -> StorageResult<()> {
        self.lock()?
            .save_correction(university, program_name, correction)
    }
}

impl ProgramStore for SharedStorage {
    fn upsert_program(&self, record: &ProgramRecord) -> StorageResult<UpsertOutcome> {
        self.lock()?.upsert_program_record(record)
    }
}
