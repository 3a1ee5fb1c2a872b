//! Crawl frontier engine
//!
//! Drives one university's crawl:
//! - seeds are fetched first, in configured order
//! - each accepted seed contributes at most `link_budget_per_seed` links
//! - links found on discovered pages are never followed
//! - every accepted or thin page is recorded in the visited set immediately

use crate::crawler::fetcher::Fetcher;
use crate::crawler::links::extract_candidate_links;
use crate::crawler::throttle::AdaptiveThrottle;
use crate::model::PageRecord;
use crate::storage::VisitedStore;
use crate::url::canonical_url;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use url::Url;

/// A URL waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,

    /// 0 for seeds, 1 for discovered links
    pub depth: u8,
}

/// Counters describing one crawl
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    /// Pages accepted and handed on for extraction
    pub pages_fetched: usize,

    /// Pages fetched but discarded as too thin
    pub pages_rejected: usize,

    /// URLs skipped because a previous run visited them
    pub pages_skipped_visited: usize,

    /// URLs whose fetch failed after retries
    pub fetch_failures: usize,

    /// Calls made to the fetcher
    pub fetch_attempts: usize,

    /// Candidate links queued from seed pages
    pub links_queued: usize,
}

/// Result of a crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    pub pages: Vec<PageRecord>,
    pub stats: CrawlStats,
}

/// Per-site settings of the frontier engine
#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// University whose visited set is read and written
    pub university: String,

    /// Registrable domain links must stay on
    pub domain: String,

    /// Lowercase topical keywords
    pub keywords: Vec<String>,

    /// Minimum plain-text length for a page to be accepted
    pub min_content_length: usize,
}

/// Bounded, incremental crawler for one site
pub struct FrontierEngine<'a, F, V> {
    fetcher: &'a F,
    visited_store: &'a V,
    throttle: AdaptiveThrottle,
    site: SiteProfile,
}

impl<'a, F, V> FrontierEngine<'a, F, V>
where
    F: Fetcher,
    V: VisitedStore,
{
    pub fn new(
        fetcher: &'a F,
        visited_store: &'a V,
        throttle: AdaptiveThrottle,
        site: SiteProfile,
    ) -> Self {
        Self {
            fetcher,
            visited_store,
            throttle,
            site,
        }
    }

    /// Crawls from the given seeds
    ///
    /// # Arguments
    ///
    /// * `seeds` - Seed URLs, attempted first and in order
    /// * `visited` - URLs visited by earlier runs; grows as pages are fetched
    /// * `link_budget_per_seed` - Maximum discovered links explored per seed
    /// * `force_refresh` - Fetch URLs even if they are already visited
    ///
    /// # Returns
    ///
    /// The accepted pages in fetch order plus crawl counters. Fetch attempts
    /// never exceed `seeds.len() * (1 + link_budget_per_seed)`.
    pub async fn crawl(
        &mut self,
        seeds: &[String],
        visited: &mut HashSet<String>,
        link_budget_per_seed: usize,
        force_refresh: bool,
    ) -> CrawlOutcome {
        let mut frontier: VecDeque<FrontierEntry> = seeds
            .iter()
            .map(|url| FrontierEntry {
                url: url.clone(),
                depth: 0,
            })
            .collect();

        let mut attempted: HashSet<String> = HashSet::new();
        let mut outcome = CrawlOutcome::default();

        tracing::info!(
            "[{}] Crawling {} seed(s), link budget {} per seed",
            self.site.university,
            seeds.len(),
            link_budget_per_seed
        );

        while let Some(entry) = frontier.pop_front() {
            let Some(url) = canonical_url(&entry.url) else {
                tracing::warn!("[{}] Skipping malformed URL {}", self.site.university, entry.url);
                continue;
            };

            if !attempted.insert(url.clone()) {
                continue;
            }

            if !force_refresh && visited.contains(&url) {
                tracing::debug!("[{}] Already visited: {}", self.site.university, url);
                outcome.stats.pages_skipped_visited += 1;
                continue;
            }

            self.throttle.wait().await;
            outcome.stats.fetch_attempts += 1;

            let page = match self.fetcher.fetch(&url).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!("[{}] Failed to fetch {}: {}", self.site.university, url, e);
                    self.throttle.record_failure(e.is_rate_limited());
                    outcome.stats.fetch_failures += 1;
                    continue;
                }
            };

            self.throttle
                .record_success(Duration::from_millis(page.load_duration_ms));

            self.record_visited(visited, &url);
            if page.url != url {
                let target_seen = !attempted.insert(page.url.clone())
                    || (!force_refresh && visited.contains(&page.url));
                self.record_visited(visited, &page.url);
                if target_seen {
                    tracing::debug!(
                        "[{}] {} redirected to already visited {}",
                        self.site.university,
                        url,
                        page.url
                    );
                    outcome.stats.pages_skipped_visited += 1;
                    continue;
                }
            }

            if page.text_len() < self.site.min_content_length {
                tracing::debug!(
                    "[{}] Rejected thin page {} ({} chars)",
                    self.site.university,
                    url,
                    page.text_len()
                );
                outcome.stats.pages_rejected += 1;
                continue;
            }

            if entry.depth == 0 {
                let discovered = self.discover_links(&page, link_budget_per_seed);
                outcome.stats.links_queued += discovered.len();
                frontier.extend(discovered.into_iter().map(|url| FrontierEntry { url, depth: 1 }));
            }

            tracing::debug!(
                "[{}] Accepted {} ({} chars)",
                self.site.university,
                page.url,
                page.text_len()
            );
            outcome.stats.pages_fetched += 1;
            outcome.pages.push(page);
        }

        tracing::info!(
            "[{}] Crawl finished: {} accepted, {} rejected, {} skipped, {} failed",
            self.site.university,
            outcome.stats.pages_fetched,
            outcome.stats.pages_rejected,
            outcome.stats.pages_skipped_visited,
            outcome.stats.fetch_failures
        );

        outcome
    }

    /// Returns the first `budget` candidate links of a seed page
    fn discover_links(&self, page: &PageRecord, budget: usize) -> Vec<String> {
        let Ok(page_url) = Url::parse(&page.url) else {
            return Vec::new();
        };

        let mut links =
            extract_candidate_links(&page.markup, &page_url, &self.site.domain, &self.site.keywords);
        links.truncate(budget);

        tracing::debug!(
            "[{}] {} candidate link(s) from {}",
            self.site.university,
            links.len(),
            page.url
        );
        links
    }

    /// Adds a URL to the in-memory set and persists it
    ///
    /// A persistence failure is logged; the in-memory set is updated
    /// regardless.
    fn record_visited(&self, visited: &mut HashSet<String>, url: &str) {
        if !visited.insert(url.to_string()) {
            return;
        }
        if let Err(e) = self.visited_store.mark_visited(&self.site.university, url) {
            tracing::warn!(
                "[{}] Could not persist visited URL {}: {}",
                self.site.university,
                url,
                e
            );
        }
    }
}
