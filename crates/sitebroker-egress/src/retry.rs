//! Retry decisions
//!
//! Pure logic: whether a failed attempt may be repeated and how long to wait.
//! Network failures and timeouts are always retryable. An HTTP status is
//! retryable for reads on {408, 429, 500, 502, 503, 504}; for any other verb
//! only 429 qualifies, since a 5xx on a write may hide a partial success.

use rand::Rng;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use sitebroker_core::Error;
use std::time::Duration;

/// Statuses a read may be retried on
const READ_RETRY_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// The only status a mutating call may be retried on
const RATE_LIMITED: u16 = 429;

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the initial attempt (total attempts = 1 + max_retries)
    pub max_retries: u32,

    /// Backoff unit: attempt `n` (0-indexed) waits `base_delay_ms * 2^n`
    pub base_delay_ms: u64,

    /// Random jitter added to backoff, drawn from `[0, max_jitter_ms)`
    pub max_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_jitter_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Whether `error`, produced by a call using `method`, may be retried
    pub fn is_retryable(&self, error: &Error, method: &Method) -> bool {
        if error.is_network() {
            return true;
        }
        error
            .status()
            .is_some_and(|status| Self::is_retryable_status(status, method))
    }

    pub fn is_retryable_status(status: u16, method: &Method) -> bool {
        if *method == Method::GET {
            READ_RETRY_STATUSES.contains(&status)
        } else {
            status == RATE_LIMITED
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    ///
    /// A `Retry-After` seconds value on the error is used verbatim; otherwise
    /// exponential backoff plus jitter.
    pub fn delay_for(&self, attempt: u32, error: &Error) -> Duration {
        if let Some(secs) = error.retry_after_secs() {
            return Duration::from_millis(secs.saturating_mul(1000));
        }

        let exponential = 2u64.saturating_pow(attempt);
        let delay_ms = self.config.base_delay_ms.saturating_mul(exponential);
        let jitter = if self.config.max_jitter_ms > 0 {
            rand::rng().random_range(0..self.config.max_jitter_ms)
        } else {
            0
        };

        Duration::from_millis(delay_ms.saturating_add(jitter))
    }
}
