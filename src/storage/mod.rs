//! Storage module for persisting harvest data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Per-university visited URL sets
//! - Human corrections and reconciled program records
//! - Run tracking with summary counters

mod schema;
mod shared;
mod sqlite;
mod traits;

pub use shared::SharedStorage;
pub use sqlite::SqliteStorage;
pub use traits::{
    CorrectionStore, ProgramStore, Storage, StorageError, StorageResult, VisitedStore,
};

use crate::model::RunSummary;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Represents an agent run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub university: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub summary: RunSummary,
    pub error_message: Option<String>,
}

/// Status of an agent run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// What an upsert did to the stored program row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}
