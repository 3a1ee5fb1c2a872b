//! Output module for run artifacts and summaries
//!
//! This module handles:
//! - Writing per-agent JSON checkpoints (pages, programs, divergences)
//! - Printing the completion summary of a harvest
//! - Printing database statistics for the `--stats` mode

mod artifacts;
pub mod stats;
mod summary;

pub use artifacts::{RunArtifacts, DIVERGENCES_FILE, PAGES_FILE, PROGRAMS_FILE};
pub use stats::{load_statistics, print_statistics, UniversityStatistics};
pub use summary::{format_run_summary, print_run_summary};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize artifact: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
