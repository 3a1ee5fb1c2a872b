//! Crawler module for university site traversal
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - Content and link extraction
//! - Adaptive politeness delays
//! - The bounded crawl frontier

mod fetcher;
mod frontier;
mod links;
mod retry;
mod throttle;

pub use fetcher::{build_http_client, FetchError, Fetcher, HttpFetcher};
pub use frontier::{CrawlOutcome, CrawlStats, FrontierEngine, FrontierEntry, SiteProfile};
pub use links::{
    effective_keywords, extract_candidate_links, extract_page_content, origin_root, PageContent,
    DEFAULT_KEYWORDS,
};
pub use retry::{RetryPolicy, TransientKind};
pub use throttle::AdaptiveThrottle;
