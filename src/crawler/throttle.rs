//! Adaptive politeness delay between fetches
//!
//! The delay before each fetch tracks how long the previous page took to
//! load, so a slow site is visited more gently than a fast one.

use crate::config::CrawlerConfig;
use std::time::Duration;

/// Computes and applies the delay before each fetch of one agent
#[derive(Debug, Clone)]
pub struct AdaptiveThrottle {
    min_delay: Duration,
    max_delay: Duration,
    factor: f64,

    /// Load time of the most recent successful fetch
    last_load: Option<Duration>,

    /// Set after a rate-limited failure; forces the maximum delay once
    backing_off: bool,

    /// No delay precedes the very first fetch
    started: bool,
}

impl AdaptiveThrottle {
    pub fn new(min_delay: Duration, max_delay: Duration, factor: f64) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
            factor,
            last_load: None,
            backing_off: false,
            started: false,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.delay_factor,
        )
    }

    /// Returns the delay to apply before the next fetch and advances state
    ///
    /// # Returns
    ///
    /// * `Duration::ZERO` before the first fetch
    /// * `max_delay` right after a rate-limited failure
    /// * otherwise the previous load time times the factor, clamped to
    ///   `[min_delay, max_delay]`
    pub fn next_delay(&mut self) -> Duration {
        if !self.started {
            self.started = true;
            return Duration::ZERO;
        }

        if self.backing_off {
            self.backing_off = false;
            return self.max_delay;
        }

        let scaled = self
            .last_load
            .map(|load| load.mul_f64(self.factor.max(0.0)))
            .unwrap_or(Duration::ZERO);

        scaled.clamp(self.min_delay, self.max_delay)
    }

    /// Records a successful fetch and its load time
    pub fn record_success(&mut self, load: Duration) {
        self.last_load = Some(load);
    }

    /// Records a failed fetch
    pub fn record_failure(&mut self, rate_limited: bool) {
        if rate_limited {
            self.backing_off = true;
        }
    }

    /// Sleeps for the next delay
    pub async fn wait(&mut self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tracing::debug!("Politeness delay {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }
}
