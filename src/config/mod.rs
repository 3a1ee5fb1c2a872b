//! Configuration module for Campus-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use campus_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Crawling {} universities", config.universities.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, ExtractionConfig, FetchConfig, OutputConfig, RetryConfig,
    UniversityEntry,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, resolve_api_key};
