//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Campus-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per university agent run
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    university TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_fetched INTEGER NOT NULL DEFAULT 0,
    pages_rejected INTEGER NOT NULL DEFAULT 0,
    pages_skipped_visited INTEGER NOT NULL DEFAULT 0,
    fetch_failures INTEGER NOT NULL DEFAULT 0,
    programs_extracted INTEGER NOT NULL DEFAULT 0,
    divergences INTEGER NOT NULL DEFAULT 0,
    records_upserted INTEGER NOT NULL DEFAULT 0,
    records_failed INTEGER NOT NULL DEFAULT 0,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_university ON runs(university);

-- URLs fetched successfully at least once, per university
CREATE TABLE IF NOT EXISTS visited_urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    university TEXT NOT NULL,
    url TEXT NOT NULL,
    visited_at TEXT NOT NULL,
    UNIQUE(university, url)
);

CREATE INDEX IF NOT EXISTS idx_visited_university ON visited_urls(university);

-- Human-verified overrides, keyed by the exact program name
CREATE TABLE IF NOT EXISTS corrected_programs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    university TEXT NOT NULL,
    program_name TEXT NOT NULL,
    category TEXT NOT NULL,
    admission_open INTEGER NOT NULL,
    deadlines TEXT NOT NULL DEFAULT '[]',
    updated_at TEXT NOT NULL,
    UNIQUE(university, program_name)
);

-- Reconciled program records, keyed by the normalised program name
CREATE TABLE IF NOT EXISTS programs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    university TEXT NOT NULL,
    program_key TEXT NOT NULL,
    program_name TEXT NOT NULL,
    category TEXT NOT NULL,
    admission_open INTEGER NOT NULL,
    application_deadline TEXT,
    deadlines TEXT NOT NULL DEFAULT '[]',
    link TEXT NOT NULL,
    source_text TEXT NOT NULL,
    source_url TEXT NOT NULL,
    extracted_at TEXT NOT NULL,
    UNIQUE(university, program_key)
);

CREATE INDEX IF NOT EXISTS idx_programs_university ON programs(university);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
