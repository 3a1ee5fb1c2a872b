//! HTTP fetcher implementation
//!
//! This module handles all page requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeout
//! - Error classification into transient and permanent failures
//! - Retry with backoff per `RetryPolicy`
//! - Turning a response body into a `PageRecord`

use crate::config::FetchConfig;
use crate::crawler::links::extract_page_content;
use crate::crawler::retry::{RetryPolicy, TransientKind};
use crate::model::PageRecord;
use crate::url::canonical_url;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Page fetch failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Rate limited (HTTP 429)")]
    RateLimited,

    #[error("Server error: HTTP {0}")]
    Server(u16),

    #[error("HTTP {0}")]
    Http(u16),

    #[error("Expected HTML, got {0}")]
    ContentMismatch(String),

    #[error("Request failed: {0}")]
    Request(String),
}

impl FetchError {
    /// Transient class of this failure, or None if retrying cannot help
    pub fn transient_kind(&self) -> Option<TransientKind> {
        match self {
            Self::Timeout(_) => Some(TransientKind::Timeout),
            Self::Connect(_) => Some(TransientKind::Connect),
            Self::RateLimited => Some(TransientKind::RateLimited),
            Self::Server(_) => Some(TransientKind::ServerError),
            Self::Http(_) | Self::ContentMismatch(_) | Self::Request(_) => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        match TransientKind::from_reqwest(&err) {
            Some(TransientKind::Timeout) => Self::Timeout(err.to_string()),
            Some(_) => Self::Connect(err.to_string()),
            None => Self::Request(err.to_string()),
        }
    }

    fn from_status(status: StatusCode) -> Self {
        match TransientKind::from_status(status) {
            Some(TransientKind::RateLimited) => Self::RateLimited,
            Some(_) => Self::Server(status.as_u16()),
            None => Self::Http(status.as_u16()),
        }
    }
}

/// Retrieves one page
///
/// Implementations apply their own retry and backoff; an `Err` means the
/// page could not be fetched in this run.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<PageRecord, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `reqwest`-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig, retry: RetryPolicy) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            retry,
        })
    }

    /// Performs a single GET without retrying
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | 2xx with HTML (or no Content-Type) | `Ok(PageRecord)` |
    /// | 2xx with another Content-Type | `ContentMismatch` |
    /// | HTTP 429 | `RateLimited` |
    /// | HTTP 5xx | `Server` |
    /// | other non-2xx | `Http` |
    /// | timeout / connection failure | `Timeout` / `Connect` |
    async fn fetch_once(&self, url: &str) -> Result<PageRecord, FetchError> {
        let started = Instant::now();

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status));
        }

        let final_url = response.url().to_string();

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        if !content_type.is_empty()
            && !content_type.contains("text/html")
            && !content_type.contains("application/xhtml")
        {
            return Err(FetchError::ContentMismatch(content_type));
        }

        let body = response.text().await.map_err(FetchError::from_reqwest)?;
        let load_duration_ms = started.elapsed().as_millis() as u64;

        let content = extract_page_content(&body);

        Ok(PageRecord {
            url: canonical_url(&final_url).unwrap_or(final_url),
            title: content.title,
            text: content.text,
            markup: content.markup,
            fetched_at: Utc::now(),
            load_duration_ms,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<PageRecord, FetchError> {
        let mut attempt = 1;
        loop {
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(err) => {
                    if !self.retry.should_retry(err.transient_kind(), attempt) {
                        return Err(err);
                    }
                    let delay = self.retry.delay_for(attempt);
                    tracing::debug!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempt,
                        self.retry.max_attempts,
                        url,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
