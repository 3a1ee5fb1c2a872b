//! Retry policy shared by the page fetcher and the extraction client

use crate::config::{ExtractionConfig, RetryConfig};
use reqwest::StatusCode;
use std::time::Duration;

/// Failure classes that may succeed when tried again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransientKind {
    /// The request did not complete within the client timeout
    Timeout,

    /// Connection could not be established or the body was cut off
    Connect,

    /// The server answered HTTP 429
    RateLimited,

    /// The server answered with a 5xx status
    ServerError,
}

impl TransientKind {
    /// Classifies an HTTP status, returning None for non-retryable statuses
    pub fn from_status(status: StatusCode) -> Option<Self> {
        if status == StatusCode::TOO_MANY_REQUESTS {
            Some(Self::RateLimited)
        } else if status.is_server_error() {
            Some(Self::ServerError)
        } else {
            None
        }
    }

    /// Classifies a transport error, returning None when retrying cannot help
    pub fn from_reqwest(err: &reqwest::Error) -> Option<Self> {
        if err.is_timeout() {
            Some(Self::Timeout)
        } else if err.is_connect() || err.is_body() || err.is_request() {
            Some(Self::Connect)
        } else {
            None
        }
    }
}

/// Bounded retry with exponential backoff
///
/// The delay before retry `n` (1-based) is `backoff_base * 2^(n-1)`, capped
/// at `backoff_cap`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub retryable: Vec<TransientKind>,
}

impl RetryPolicy {
    /// Policy retrying every transient kind
    pub fn new(max_attempts: u32, backoff_base: Duration, backoff_cap: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
            backoff_cap,
            retryable: vec![
                TransientKind::Timeout,
                TransientKind::Connect,
                TransientKind::RateLimited,
                TransientKind::ServerError,
            ],
        }
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff_base: Duration::ZERO,
            backoff_cap: Duration::ZERO,
            retryable: Vec::new(),
        }
    }

    /// Builds the page-fetch policy from the `[retry]` section
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_cap_ms),
        )
    }

    /// Builds the extraction policy from the `[extraction]` section
    pub fn from_extraction_config(config: &ExtractionConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_cap_ms),
        )
    }

    /// Restricts the policy to the given kinds
    pub fn with_retryable(mut self, kinds: &[TransientKind]) -> Self {
        self.retryable = kinds.to_vec();
        self
    }

    /// Returns true if a failure of `kind` on attempt `attempt` (1-based)
    /// should be retried
    pub fn should_retry(&self, kind: Option<TransientKind>, attempt: u32) -> bool {
        match kind {
            Some(kind) => attempt < self.max_attempts && self.retryable.contains(&kind),
            None => false,
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let delay = self.backoff_base.saturating_mul(1u32 << exponent);
        delay.min(self.backoff_cap)
    }
}
