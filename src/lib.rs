//! Campus-Harvest: an incremental admissions crawler
//!
//! This crate crawls university websites, extracts admission programs with an
//! LLM and reconciles them against human-corrected records, persisting the
//! result so that re-runs are incremental and idempotent.

pub mod agent;
pub mod config;
pub mod crawler;
pub mod extraction;
pub mod model;
pub mod output;
pub mod reconcile;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Campus-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] extraction::ExtractionError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Agent task failed: {0}")]
    Task(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Campus-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use agent::{run_all, HarvestReport, RunOptions, UniversityAgent};
pub use model::{
    CorrectionRecord, Divergence, PageRecord, ProgramCategory, ProgramRecord, RunSummary,
};
pub use reconcile::{persist, reconcile, PersistReport, Reconciliation};
pub use url::{extract_domain, normalize_url, registrable_domain};
