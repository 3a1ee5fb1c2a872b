//! Campus-Harvest main entry point
//!
//! This is the command-line interface for the Campus-Harvest admissions crawler.

use anyhow::{bail, Context};
use campus_harvest::agent::{run_all, RunOptions};
use campus_harvest::config::{load_config_with_hash, resolve_api_key, Config};
use campus_harvest::extraction::{Extractor, LlmExtractor};
use campus_harvest::model::{CorrectionRecord, ProgramCategory};
use campus_harvest::output::{load_statistics, print_run_summary, print_statistics};
use campus_harvest::storage::{open_storage, CorrectionStore, SharedStorage};
use chrono::NaiveDate;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Campus-Harvest: an incremental admissions crawler
///
/// Campus-Harvest crawls university websites, extracts admission programs
/// with an LLM and reconciles them against human-corrected records.
#[derive(Parser, Debug)]
#[command(name = "campus-harvest")]
#[command(version = "0.1.0")]
#[command(about = "An incremental admissions crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Re-fetch pages even if they were visited by an earlier run
    #[arg(long)]
    force_refresh: bool,

    /// Only harvest the university with this name or agent name
    #[arg(long, value_name = "NAME")]
    university: Option<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "import_corrections"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "import_corrections"])]
    stats: bool,

    /// Import human corrections from a JSON file and exit
    #[arg(long, value_name = "FILE", conflicts_with_all = ["dry_run", "stats"])]
    import_corrections: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, cli.university.as_deref())?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(path) = &cli.import_corrections {
        handle_import_corrections(&config, path)?;
    } else {
        let options = RunOptions {
            force_refresh: cli.force_refresh,
            university: cli.university.clone(),
        };
        handle_harvest(config, config_hash, options).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("campus_harvest=info,warn"),
            1 => EnvFilter::new("campus_harvest=debug,info"),
            2 => EnvFilter::new("campus_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, filter: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let selected = campus_harvest::agent::select_universities(config, filter)?;

    println!("=== Campus-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Link budget per seed: {}", config.crawler.link_budget_per_seed);
    println!(
        "  Minimum content length: {} chars",
        config.crawler.min_content_length
    );
    println!(
        "  Politeness delay: {}-{}ms (x{} load time)",
        config.crawler.min_delay_ms, config.crawler.max_delay_ms, config.crawler.delay_factor
    );
    println!(
        "  Retry: {} attempts, backoff {}-{}ms",
        config.retry.max_attempts, config.retry.backoff_base_ms, config.retry.backoff_cap_ms
    );

    println!("\nExtraction:");
    println!("  Endpoint: {}", config.extraction.endpoint);
    println!("  Model: {}", config.extraction.model);
    let key_status = match resolve_api_key(&config.extraction) {
        Ok(_) => "set",
        Err(_) => "MISSING",
    };
    println!("  API key ({}): {}", config.extraction.api_key_env, key_status);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Artifacts: {}", config.output.artifacts_dir);

    println!("\nUniversities ({}):", selected.len());
    for entry in &selected {
        println!(
            "  - {} [{}] {} ({} seeds)",
            entry.name,
            entry.agent,
            entry.domain,
            entry.seeds.len()
        );
        for seed in &entry.seeds {
            println!("    * {}", seed);
        }
        if !entry.keywords.is_empty() {
            println!("    keywords: {}", entry.keywords.join(", "));
        }
    }

    let seeds: usize = selected.iter().map(|u| u.seeds.len()).sum();
    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would fetch at most {} pages from {} seed URLs",
        seeds * (1 + config.crawler.link_budget_per_seed),
        seeds
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    // Open the database
    let storage = open_storage(Path::new(&config.output.database_path))?;

    // Load statistics
    let stats = load_statistics(&storage)?;

    // Print statistics
    print_statistics(&stats);

    Ok(())
}

/// One entry of a corrections file
#[derive(Debug, Deserialize)]
struct CorrectionEntry {
    university: String,
    program_name: String,
    category: String,
    admission_open: bool,
    #[serde(default)]
    deadlines: Vec<NaiveDate>,
}

/// Reads and checks a corrections file
fn read_corrections(path: &Path) -> anyhow::Result<Vec<(String, String, CorrectionRecord)>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corrections file {}", path.display()))?;
    let entries: Vec<CorrectionEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid corrections file {}", path.display()))?;

    let mut corrections = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        if entry.university.trim().is_empty() || entry.program_name.trim().is_empty() {
            bail!("Correction #{} needs a university and a program_name", index + 1);
        }
        let Some(category) = ProgramCategory::from_db_string(&entry.category) else {
            bail!(
                "Correction #{} ('{}') has unknown category '{}'",
                index + 1,
                entry.program_name,
                entry.category
            );
        };

        corrections.push((
            entry.university,
            entry.program_name,
            CorrectionRecord {
                category,
                admission_open: entry.admission_open,
                deadlines: entry.deadlines,
            },
        ));
    }

    Ok(corrections)
}

/// Handles the --import-corrections mode: stores human corrections
fn handle_import_corrections(config: &Config, path: &Path) -> anyhow::Result<()> {
    let corrections = read_corrections(path)?;

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let storage = SharedStorage::new(storage);

    for (university, program_name, correction) in &corrections {
        storage
            .put_correction(university, program_name, correction)
            .with_context(|| format!("Failed to store correction for '{}'", program_name))?;
    }

    println!(
        "✓ Imported {} correction(s) into {}",
        corrections.len(),
        config.output.database_path
    );

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    config_hash: String,
    options: RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    // Credentials are checked before any page is fetched
    let api_key = resolve_api_key(&config.extraction)?;
    let extractor: Arc<dyn Extractor> = Arc::new(LlmExtractor::new(&config.extraction, &api_key)?);

    let storage = SharedStorage::new(open_storage(Path::new(&config.output.database_path))?);

    if options.force_refresh {
        tracing::info!("Force refresh: visited pages will be fetched again");
    }
    tracing::info!(
        "Universities: {}, seed URLs: {}",
        config.universities.len(),
        config.universities.iter().map(|u| u.seeds.len()).sum::<usize>()
    );

    let report = run_all(&config, &config_hash, storage, extractor, &options).await?;
    print_run_summary(&report.summaries);

    if report.is_success() {
        tracing::info!("Harvest completed successfully");
        return Ok(());
    }

    for (university, error) in &report.failures {
        tracing::error!("{} failed: {}", university, error);
    }
    Err(format!("{} agent(s) failed", report.failures.len()).into())
}
