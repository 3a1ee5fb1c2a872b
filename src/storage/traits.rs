//! Storage traits and error types
//!
//! `Storage` is the full backend interface used by the binary. The narrow
//! `VisitedStore`, `CorrectionStore` and `ProgramStore` traits are what the
//! crawl and reconciliation engines depend on; they take `&self` so one
//! shared handle can serve several concurrent agents.

use crate::model::{CorrectionRecord, ProgramCategory, ProgramRecord, RunSummary};
use crate::storage::{RunRecord, UpsertOutcome};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Per-university set of URLs already fetched
pub trait VisitedStore: Send + Sync {
    /// Loads every URL visited for a university
    fn get_visited(&self, university: &str) -> StorageResult<HashSet<String>>;

    /// Records a visited URL; recording the same URL twice is not an error
    fn mark_visited(&self, university: &str, url: &str) -> StorageResult<()>;
}

/// Human-verified program overrides
pub trait CorrectionStore: Send + Sync {
    /// Loads corrections for a university, keyed by exact program name
    fn get_corrections(&self, university: &str)
        -> StorageResult<HashMap<String, CorrectionRecord>>;

    /// Inserts or replaces one correction
    fn put_correction(
        &self,
        university: &str,
        program_name: &str,
        correction: &CorrectionRecord,
    ) -> StorageResult<()>;
}

/// Reconciled program records
pub trait ProgramStore: Send + Sync {
    /// Inserts or updates a record keyed by `(university, normalised name)`
    fn upsert_program(&self, record: &ProgramRecord) -> StorageResult<UpsertOutcome>;
}

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the harvester.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run for a university
    ///
    /// # Arguments
    ///
    /// * `university` - The university the run covers
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, university: &str, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run of a university
    fn get_latest_run(&self, university: &str) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as completed and stores its summary counters
    fn complete_run(&mut self, run_id: i64, summary: &RunSummary) -> StorageResult<()>;

    /// Marks a run as failed
    fn fail_run(&mut self, run_id: i64, error_message: &str) -> StorageResult<()>;

    // ===== Visited URLs =====

    fn load_visited(&self, university: &str) -> StorageResult<HashSet<String>>;

    /// Inserts a visited URL, returning false if it was already present
    fn insert_visited(&mut self, university: &str, url: &str) -> StorageResult<bool>;

    // ===== Corrections =====

    fn load_corrections(&self, university: &str)
        -> StorageResult<HashMap<String, CorrectionRecord>>;

    fn save_correction(
        &mut self,
        university: &str,
        program_name: &str,
        correction: &CorrectionRecord,
    ) -> StorageResult<()>;

    // ===== Programs =====

    /// Inserts or updates a program record
    ///
    /// Returns `Unchanged` without writing when the stored record already
    /// holds the same values.
    fn upsert_program_record(&mut self, record: &ProgramRecord) -> StorageResult<UpsertOutcome>;

    /// Gets all stored programs of a university, ordered by name
    fn get_programs(&self, university: &str) -> StorageResult<Vec<ProgramRecord>>;

    // ===== Statistics =====

    /// Lists every university with any stored data
    fn get_universities(&self) -> StorageResult<Vec<String>>;

    fn count_visited(&self, university: &str) -> StorageResult<u64>;

    fn count_programs(&self, university: &str) -> StorageResult<u64>;

    fn count_corrections(&self, university: &str) -> StorageResult<u64>;

    /// Gets program count breakdown by category
    fn get_category_breakdown(
        &self,
        university: &str,
    ) -> StorageResult<HashMap<ProgramCategory, u64>>;
}
