//! University agents: one configured crawl-extract-reconcile pipeline per site
//!
//! Every `[[university]]` entry becomes a `UniversityAgent`. Agents run as
//! independent tokio tasks and share only the storage handle.

use crate::config::{Config, CrawlerConfig, UniversityEntry};
use crate::crawler::{
    effective_keywords, AdaptiveThrottle, CrawlOutcome, Fetcher, FrontierEngine, HttpFetcher,
    RetryPolicy, SiteProfile,
};
use crate::extraction::Extractor;
use crate::model::{Divergence, PageRecord, ProgramRecord, RunSummary};
use crate::output::{OutputResult, RunArtifacts};
use crate::reconcile::{persist, reconcile};
use crate::storage::{CorrectionStore, SharedStorage, Storage, VisitedStore};
use crate::{ConfigError, HarvestError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Options shared by every agent of one harvest
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Re-fetch URLs already in the visited set
    pub force_refresh: bool,

    /// Only run the university with this name or agent name
    pub university: Option<String>,
}

/// Outcome of a harvest across all selected universities
#[derive(Debug, Default)]
pub struct HarvestReport {
    /// Summaries of the agents that completed, in configuration order
    pub summaries: Vec<RunSummary>,

    /// Agents that failed, with the error that stopped them
    pub failures: Vec<(String, HarvestError)>,
}

impl HarvestReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Crawl-extract-reconcile pipeline for one university
pub struct UniversityAgent<F, E: ?Sized> {
    entry: UniversityEntry,
    crawler: CrawlerConfig,
    fetcher: F,
    extractor: Arc<E>,
    storage: SharedStorage,
    artifacts_dir: PathBuf,
    config_hash: String,
}

impl<F, E> UniversityAgent<F, E>
where
    F: Fetcher,
    E: Extractor + ?Sized,
{
    pub fn new(
        entry: UniversityEntry,
        crawler: CrawlerConfig,
        fetcher: F,
        extractor: Arc<E>,
        storage: SharedStorage,
        artifacts_dir: PathBuf,
        config_hash: String,
    ) -> Self {
        Self {
            entry,
            crawler,
            fetcher,
            extractor,
            storage,
            artifacts_dir,
            config_hash,
        }
    }

    pub fn university(&self) -> &str {
        &self.entry.name
    }

    /// Runs the full pipeline once
    ///
    /// The run is recorded in storage as completed with its summary, or as
    /// failed with the error message.
    pub async fn run(&self, force_refresh: bool) -> Result<RunSummary> {
        let run_id = self
            .storage
            .lock()?
            .create_run(&self.entry.name, &self.config_hash)?;

        tracing::info!("[{}] Starting run {}", self.entry.name, run_id);

        match self.execute(force_refresh).await {
            Ok(summary) => {
                self.storage.lock()?.complete_run(run_id, &summary)?;
                tracing::info!(
                    "[{}] Run {} completed: {} page(s), {} program(s), {} divergence(s)",
                    self.entry.name,
                    run_id,
                    summary.pages_fetched,
                    summary.programs_extracted,
                    summary.divergences
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::error!("[{}] Run {} failed: {}", self.entry.name, run_id, e);
                if let Err(mark_err) = self.storage.lock()?.fail_run(run_id, &e.to_string()) {
                    tracing::warn!(
                        "[{}] Could not mark run {} as failed: {}",
                        self.entry.name,
                        run_id,
                        mark_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, force_refresh: bool) -> Result<RunSummary> {
        let university = self.entry.name.as_str();
        let artifacts = match RunArtifacts::create(&self.artifacts_dir, &self.entry.agent) {
            Ok(artifacts) => Some(artifacts),
            Err(e) => {
                tracing::warn!("[{}] Artifacts disabled for this run: {}", university, e);
                None
            }
        };

        let crawl = self.crawl(force_refresh).await?;
        if let Some(artifacts) = &artifacts {
            log_checkpoint(university, artifacts.write_pages(&crawl.pages));
        }

        let extracted = self.extract_all(&crawl.pages).await;
        let programs_extracted = extracted.len();

        let corrections = self.storage.get_corrections(university).unwrap_or_else(|e| {
            tracing::warn!(
                "[{}] Could not load corrections, reconciling without them: {}",
                university,
                e
            );
            HashMap::new()
        });
        let reconciliation = reconcile(extracted, &corrections);
        log_divergences(&reconciliation.divergences);

        if let Some(artifacts) = &artifacts {
            log_checkpoint(university, artifacts.write_programs(&reconciliation.records));
            log_checkpoint(
                university,
                artifacts.write_divergences(&reconciliation.divergences),
            );
        }

        let report = persist(&reconciliation.records, &self.storage);
        tracing::info!(
            "[{}] Persisted {} record(s): {} new, {} updated, {} unchanged, {} failed",
            university,
            reconciliation.records.len(),
            report.inserted,
            report.updated,
            report.unchanged,
            report.failed
        );

        Ok(RunSummary {
            university: university.to_string(),
            pages_fetched: crawl.stats.pages_fetched,
            pages_rejected: crawl.stats.pages_rejected,
            pages_skipped_visited: crawl.stats.pages_skipped_visited,
            fetch_failures: crawl.stats.fetch_failures,
            programs_extracted,
            divergences: reconciliation.divergences.len(),
            records_upserted: report.upserted(),
            records_failed: report.failed,
        })
    }

    async fn crawl(&self, force_refresh: bool) -> Result<CrawlOutcome> {
        let mut visited = self.storage.get_visited(&self.entry.name)?;
        tracing::debug!(
            "[{}] {} URL(s) already visited",
            self.entry.name,
            visited.len()
        );

        let site = SiteProfile {
            university: self.entry.name.clone(),
            domain: self.entry.domain.clone(),
            keywords: effective_keywords(&self.entry.keywords),
            min_content_length: self.crawler.min_content_length,
        };
        let throttle = AdaptiveThrottle::from_config(&self.crawler);
        let mut engine = FrontierEngine::new(&self.fetcher, &self.storage, throttle, site);

        Ok(engine
            .crawl(
                &self.entry.seeds,
                &mut visited,
                self.crawler.link_budget_per_seed,
                force_refresh,
            )
            .await)
    }

    /// Extracts programs from every page, skipping pages whose extraction fails
    async fn extract_all(&self, pages: &[PageRecord]) -> Vec<ProgramRecord> {
        let mut records = Vec::new();

        for page in pages {
            match self.extractor.extract(&page.text, &page.url).await {
                Ok(found) => {
                    records.extend(found.into_iter().map(|mut record| {
                        record.university = self.entry.name.clone();
                        record
                    }));
                }
                Err(e) => {
                    tracing::warn!(
                        "[{}] Extraction failed for {}: {}",
                        self.entry.name,
                        page.url,
                        e
                    );
                }
            }
        }

        records
    }
}

/// Checkpoint files are for inspection only; the run continues without them
fn log_checkpoint(university: &str, written: OutputResult<PathBuf>) {
    if let Err(e) = written {
        tracing::warn!("[{}] Could not write checkpoint: {}", university, e);
    }
}

fn log_divergences(divergences: &[Divergence]) {
    for divergence in divergences {
        let fields: Vec<String> = divergence
            .fields
            .iter()
            .map(|f| {
                format!(
                    "{} (extracted {}, corrected {})",
                    f.field.as_str(),
                    f.extracted,
                    f.corrected
                )
            })
            .collect();
        tracing::warn!(
            "[{}] Divergence for '{}': {}",
            divergence.university,
            divergence.program_name,
            fields.join("; ")
        );
    }
}

/// Selects the configured universities matching the filter
///
/// The filter matches a university's name or agent name, ignoring case.
pub fn select_universities<'a>(
    config: &'a Config,
    filter: Option<&str>,
) -> std::result::Result<Vec<&'a UniversityEntry>, ConfigError> {
    let Some(filter) = filter else {
        return Ok(config.universities.iter().collect());
    };

    let selected: Vec<_> = config
        .universities
        .iter()
        .filter(|u| u.name.eq_ignore_ascii_case(filter) || u.agent.eq_ignore_ascii_case(filter))
        .collect();

    if selected.is_empty() {
        return Err(ConfigError::Validation(format!(
            "No university named '{}' in config",
            filter
        )));
    }
    Ok(selected)
}

/// Runs one agent per selected university concurrently
///
/// A failing agent never stops the others; its error is reported in the
/// returned `HarvestReport`.
///
/// # Arguments
///
/// * `config` - The loaded configuration
/// * `config_hash` - Hash of the configuration file, stored on each run
/// * `storage` - Storage shared by all agents
/// * `extractor` - Extractor shared by all agents
/// * `options` - Refresh and filter options
pub async fn run_all(
    config: &Config,
    config_hash: &str,
    storage: SharedStorage,
    extractor: Arc<dyn Extractor>,
    options: &RunOptions,
) -> Result<HarvestReport> {
    let selected = select_universities(config, options.university.as_deref())?;
    let retry = RetryPolicy::from_config(&config.retry);

    let mut tasks = JoinSet::new();
    for (index, entry) in selected.into_iter().enumerate() {
        let fetcher = HttpFetcher::new(&config.fetch, retry.clone())?;
        let agent = UniversityAgent::new(
            entry.clone(),
            config.crawler.clone(),
            fetcher,
            Arc::clone(&extractor),
            storage.clone(),
            PathBuf::from(&config.output.artifacts_dir),
            config_hash.to_string(),
        );
        let force_refresh = options.force_refresh;

        tasks.spawn(async move {
            let result = agent.run(force_refresh).await;
            (index, agent.university().to_string(), result)
        });
    }

    let mut finished = Vec::new();
    let mut report = HarvestReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => finished.push(outcome),
            Err(e) => {
                tracing::error!("Agent task aborted: {}", e);
                report
                    .failures
                    .push(("<unknown>".to_string(), HarvestError::Task(e.to_string())));
            }
        }
    }

    finished.sort_by_key(|(index, _, _)| *index);
    for (_, university, result) in finished {
        match result {
            Ok(summary) => report.summaries.push(summary),
            Err(e) => report.failures.push((university, e)),
        }
    }

    Ok(report)
}
