//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::{
    normalize_program_name, CorrectionRecord, ProgramCategory, ProgramRecord, RunSummary,
};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, UpsertOutcome};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

const RUN_COLUMNS: &str = "id, university, started_at, finished_at, config_hash, status,
    pages_fetched, pages_rejected, pages_skipped_visited, fetch_failures,
    programs_extracted, divergences, records_upserted, records_failed, error_message";

const PROGRAM_COLUMNS: &str = "university, program_name, category, admission_open,
    application_deadline, deadlines, link, source_text, source_url";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn count(&self, table: &str, university: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE university = ?1", table),
            params![university],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn find_program(&self, university: &str, program_key: &str) -> StorageResult<Option<ProgramRecord>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM programs WHERE university = ?1 AND program_key = ?2",
                    PROGRAM_COLUMNS
                ),
                params![university, program_key],
                ProgramRow::from_row,
            )
            .optional()?;

        row.map(ProgramRow::into_record).transpose()
    }
}

/// Raw `programs` columns before type conversion
struct ProgramRow {
    university: String,
    program_name: String,
    category: String,
    admission_open: bool,
    application_deadline: Option<String>,
    deadlines: String,
    link: String,
    source_text: String,
    source_url: String,
}

impl ProgramRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            university: row.get(0)?,
            program_name: row.get(1)?,
            category: row.get(2)?,
            admission_open: row.get(3)?,
            application_deadline: row.get(4)?,
            deadlines: row.get(5)?,
            link: row.get(6)?,
            source_text: row.get(7)?,
            source_url: row.get(8)?,
        })
    }

    fn into_record(self) -> StorageResult<ProgramRecord> {
        let category = ProgramCategory::from_db_string(&self.category).ok_or_else(|| {
            StorageError::InvalidRecord(format!(
                "Unknown category '{}' for program '{}'",
                self.category, self.program_name
            ))
        })?;

        let application_deadline = self
            .application_deadline
            .as_deref()
            .map(|d| NaiveDate::parse_from_str(d, DATE_FORMAT))
            .transpose()
            .map_err(|e| StorageError::InvalidRecord(format!("Bad deadline: {}", e)))?;

        Ok(ProgramRecord {
            program_name: self.program_name,
            category,
            admission_open: self.admission_open,
            application_deadline,
            deadlines: serde_json::from_str(&self.deadlines)?,
            link: self.link,
            source_text: self.source_text,
            source_url: self.source_url,
            university: self.university,
        })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    let university: String = row.get(1)?;
    let counter = |idx: usize| -> rusqlite::Result<usize> { Ok(row.get::<_, i64>(idx)? as usize) };

    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Failed),
        summary: RunSummary {
            university: university.clone(),
            pages_fetched: counter(6)?,
            pages_rejected: counter(7)?,
            pages_skipped_visited: counter(8)?,
            fetch_failures: counter(9)?,
            programs_extracted: counter(10)?,
            divergences: counter(11)?,
            records_upserted: counter(12)?,
            records_failed: counter(13)?,
        },
        error_message: row.get(14)?,
        university,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, university: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (university, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![university, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self, university: &str) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM runs WHERE university = ?1 ORDER BY id DESC LIMIT 1",
                    RUN_COLUMNS
                ),
                params![university],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn complete_run(&mut self, run_id: i64, summary: &RunSummary) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2,
                pages_fetched = ?3, pages_rejected = ?4, pages_skipped_visited = ?5,
                fetch_failures = ?6, programs_extracted = ?7, divergences = ?8,
                records_upserted = ?9, records_failed = ?10
             WHERE id = ?11",
            params![
                RunStatus::Completed.to_db_string(),
                now,
                summary.pages_fetched as i64,
                summary.pages_rejected as i64,
                summary.pages_skipped_visited as i64,
                summary.fetch_failures as i64,
                summary.programs_extracted as i64,
                summary.divergences as i64,
                summary.records_upserted as i64,
                summary.records_failed as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn fail_run(&mut self, run_id: i64, error_message: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, error_message = ?3 WHERE id = ?4",
            params![RunStatus::Failed.to_db_string(), now, error_message, run_id],
        )?;
        Ok(())
    }

    // ===== Visited URLs =====

    fn load_visited(&self, university: &str) -> StorageResult<HashSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM visited_urls WHERE university = ?1")?;
        let urls = stmt
            .query_map(params![university], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(urls)
    }

    fn insert_visited(&mut self, university: &str, url: &str) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO visited_urls (university, url, visited_at) VALUES (?1, ?2, ?3)",
            params![university, url, now],
        )?;
        Ok(inserted > 0)
    }

    // ===== Corrections =====

    fn load_corrections(&self, university: &str) -> StorageResult<HashMap<String, CorrectionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT program_name, category, admission_open, deadlines
             FROM corrected_programs WHERE university = ?1",
        )?;

        let rows = stmt
            .query_map(params![university], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut corrections = HashMap::new();
        for (program_name, category, admission_open, deadlines) in rows {
            let Some(category) = ProgramCategory::from_db_string(&category) else {
                tracing::warn!(
                    "Ignoring correction for '{}' with unknown category '{}'",
                    program_name,
                    category
                );
                continue;
            };

            corrections.insert(
                program_name,
                CorrectionRecord {
                    category,
                    admission_open,
                    deadlines: serde_json::from_str(&deadlines)?,
                },
            );
        }

        Ok(corrections)
    }

    fn save_correction(
        &mut self,
        university: &str,
        program_name: &str,
        correction: &CorrectionRecord,
    ) -> StorageResult<()> {
        if university.trim().is_empty() || program_name.trim().is_empty() {
            return Err(StorageError::InvalidRecord(
                "Correction requires a university and a program name".to_string(),
            ));
        }

        let now = Utc::now().to_rfc3339();
        let deadlines = serde_json::to_string(&correction.deadlines)?;
        self.conn.execute(
            "INSERT INTO corrected_programs
                (university, program_name, category, admission_open, deadlines, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(university, program_name) DO UPDATE SET
                category = excluded.category,
                admission_open = excluded.admission_open,
                deadlines = excluded.deadlines,
                updated_at = excluded.updated_at",
            params![
                university,
                program_name,
                correction.category.to_db_string(),
                correction.admission_open,
                deadlines,
                now
            ],
        )?;
        Ok(())
    }

    // ===== Programs =====

    fn upsert_program_record(&mut self, record: &ProgramRecord) -> StorageResult<UpsertOutcome> {
        if record.university.trim().is_empty() {
            return Err(StorageError::InvalidRecord(format!(
                "Program '{}' has no university",
                record.program_name
            )));
        }

        let program_key = normalize_program_name(&record.program_name);
        if program_key.is_empty() {
            return Err(StorageError::InvalidRecord(format!(
                "Program from {} has no name",
                record.source_url
            )));
        }

        let existing = self.find_program(&record.university, &program_key)?;
        if existing.as_ref() == Some(record) {
            return Ok(UpsertOutcome::Unchanged);
        }

        let now = Utc::now().to_rfc3339();
        let deadlines = serde_json::to_string(&record.deadlines)?;
        let application_deadline = record
            .application_deadline
            .map(|d| d.format(DATE_FORMAT).to_string());

        self.conn.execute(
            "INSERT INTO programs
                (university, program_key, program_name, category, admission_open,
                 application_deadline, deadlines, link, source_text, source_url, extracted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(university, program_key) DO UPDATE SET
                program_name = excluded.program_name,
                category = excluded.category,
                admission_open = excluded.admission_open,
                application_deadline = excluded.application_deadline,
                deadlines = excluded.deadlines,
                link = excluded.link,
                source_text = excluded.source_text,
                source_url = excluded.source_url,
                extracted_at = excluded.extracted_at",
            params![
                record.university,
                program_key,
                record.program_name,
                record.category.to_db_string(),
                record.admission_open,
                application_deadline,
                deadlines,
                record.link,
                record.source_text,
                record.source_url,
                now
            ],
        )?;

        Ok(if existing.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    fn get_programs(&self, university: &str) -> StorageResult<Vec<ProgramRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM programs WHERE university = ?1 ORDER BY program_key",
            PROGRAM_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![university], ProgramRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(ProgramRow::into_record).collect()
    }

    // ===== Statistics =====

    fn get_universities(&self) -> StorageResult<Vec<String>> {
        let query = "
            SELECT university FROM runs
            UNION SELECT university FROM visited_urls
            UNION SELECT university FROM corrected_programs
            UNION SELECT university FROM programs
            ORDER BY 1
        ";

        let mut stmt = self.conn.prepare(query)?;
        let universities = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(universities)
    }

    fn count_visited(&self, university: &str) -> StorageResult<u64> {
        self.count("visited_urls", university)
    }

    fn count_programs(&self, university: &str) -> StorageResult<u64> {
        self.count("programs", university)
    }

    fn count_corrections(&self, university: &str) -> StorageResult<u64> {
        self.count("corrected_programs", university)
    }

    fn get_category_breakdown(
        &self,
        university: &str,
    ) -> StorageResult<HashMap<ProgramCategory, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT category, COUNT(*) FROM programs WHERE university = ?1 GROUP BY category",
        )?;
        let rows = stmt.query_map(params![university], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut breakdown = HashMap::new();
        for row in rows {
            let (category, count) = row?;
            if let Some(category) = ProgramCategory::from_db_string(&category) {
                *breakdown.entry(category).or_insert(0) += count as u64;
            }
        }

        Ok(breakdown)
    }
}
