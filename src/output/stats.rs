//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! per-university statistics from the storage layer.

use crate::model::ProgramCategory;
use crate::output::OutputResult;
use crate::storage::{RunRecord, Storage};
use std::collections::HashMap;

/// Stored totals for one university
#[derive(Debug, Clone)]
pub struct UniversityStatistics {
    pub university: String,

    /// Number of URLs in the visited set
    pub visited_urls: u64,

    /// Number of stored program records
    pub programs: u64,

    /// Number of human corrections
    pub corrections: u64,

    /// Stored programs by category
    pub programs_by_category: HashMap<ProgramCategory, u64>,

    /// Most recent run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics for every university in storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(Vec<UniversityStatistics>)` - One entry per university, sorted by name
/// * `Err(OutputError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> OutputResult<Vec<UniversityStatistics>> {
    let mut stats = Vec::new();

    for university in storage.get_universities()? {
        stats.push(UniversityStatistics {
            visited_urls: storage.count_visited(&university)?,
            programs: storage.count_programs(&university)?,
            corrections: storage.count_corrections(&university)?,
            programs_by_category: storage.get_category_breakdown(&university)?,
            latest_run: storage.get_latest_run(&university)?,
            university,
        });
    }

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &[UniversityStatistics]) {
    println!("=== Harvest Statistics ===\n");

    if stats.is_empty() {
        println!("No data in database.");
        return;
    }

    for entry in stats {
        println!("{}:", entry.university);
        println!("  Visited URLs: {}", entry.visited_urls);
        println!("  Programs: {}", entry.programs);
        println!("  Corrections: {}", entry.corrections);

        // Sort categories by count (descending)
        let mut categories: Vec<_> = entry.programs_by_category.iter().collect();
        categories.sort_by(|a, b| {
            b.1.cmp(a.1)
                .then_with(|| a.0.to_db_string().cmp(b.0.to_db_string()))
        });

        for (category, count) in categories {
            let percentage = if entry.programs > 0 {
                (*count as f64 / entry.programs as f64) * 100.0
            } else {
                0.0
            };
            println!("    {}: {} ({:.1}%)", category, count, percentage);
        }

        if let Some(run) = &entry.latest_run {
            println!(
                "  Last run: #{} {} ({}), {} page(s) fetched, {} record(s) upserted",
                run.id,
                run.status.to_db_string(),
                run.started_at,
                run.summary.pages_fetched,
                run.summary.records_upserted
            );
            if let Some(message) = &run.error_message {
                println!("  Last error: {}", message);
            }
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CorrectionRecord, ProgramRecord, RunSummary};
    use crate::storage::SqliteStorage;

    #[test]
    fn test_load_statistics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("NUST", "abc123").unwrap();
        storage.insert_visited("NUST", "https://nust.edu.pk/").unwrap();
        storage.insert_visited("NUST", "https://nust.edu.pk/admissions").unwrap();
        storage
            .save_correction(
                "NUST",
                "BS Physics",
                &CorrectionRecord {
                    category: ProgramCategory::Undergraduate,
                    admission_open: true,
                    deadlines: vec![],
                },
            )
            .unwrap();
        storage
            .upsert_program_record(&ProgramRecord {
                program_name: "MS Physics".to_string(),
                category: ProgramCategory::Masters,
                admission_open: false,
                application_deadline: None,
                deadlines: vec![],
                link: String::new(),
                source_text: String::new(),
                source_url: "https://nust.edu.pk/".to_string(),
                university: "NUST".to_string(),
            })
            .unwrap();
        storage.complete_run(run_id, &RunSummary::new("NUST")).unwrap();

        let stats = load_statistics(&storage).unwrap();

        assert_eq!(stats.len(), 1);
        let nust = &stats[0];
        assert_eq!(nust.university, "NUST");
        assert_eq!(nust.visited_urls, 2);
        assert_eq!(nust.programs, 1);
        assert_eq!(nust.corrections, 1);
        assert_eq!(
            nust.programs_by_category.get(&ProgramCategory::Masters),
            Some(&1)
        );
        assert_eq!(nust.latest_run.as_ref().map(|r| r.id), Some(run_id));
    }

    #[test]
    fn test_empty_database() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(load_statistics(&storage).unwrap().is_empty());
    }
}
