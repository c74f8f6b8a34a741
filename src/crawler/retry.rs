//! Retry policy for page fetches
//!
//! Fetchers never retry on their own; every retry decision and every backoff
//! delay is made here so the policy lives in one place.

use crate::config::{BackoffConfig, RunSettings};
use crate::crawler::fetcher::{FetchError, PageFetcher};
use std::time::Duration;
use url::Url;

/// Extra time granted to a fetcher beyond its own deadline before the call is
/// abandoned and reported as a timeout
pub const FETCH_GRACE: Duration = Duration::from_secs(1);

/// Exponential backoff between attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub multiplier: f64,
    pub max: Duration,
}

impl From<&BackoffConfig> for Backoff {
    fn from(config: &BackoffConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.initial_delay_ms),
            multiplier: config.multiplier,
            max: Duration::from_millis(config.max_delay_ms),
        }
    }
}

/// How often and how patiently a fetch is retried
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one; never below 1
    pub attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Backoff) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub fn from_settings(settings: &RunSettings) -> Self {
        Self::new(
            settings.retry_attempts,
            Backoff::from(&settings.retry_backoff),
        )
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self::new(1, Backoff::from(&BackoffConfig::default()))
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    ///
    /// `initial * multiplier^(attempt - 1)`, capped at `max`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff.multiplier.max(1.0).powi(exponent);
        let millis = self.backoff.initial.as_millis() as f64 * factor;
        let max = self.backoff.max.as_millis() as f64;

        Duration::from_millis(millis.min(max) as u64)
    }
}

/// Result of fetching a URL under a retry policy
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    /// The page body, or the error of the last attempt
    pub result: Result<String, FetchError>,
    /// Number of attempts actually made
    pub attempts: u32,
}

/// Calls the fetcher once, abandoning it if it overruns its own deadline
///
/// A well-behaved fetcher reports its own timeout; this only catches
/// implementations that do not.
pub async fn guarded_fetch(
    fetcher: &dyn PageFetcher,
    url: &Url,
    timeout: Duration,
) -> Result<String, FetchError> {
    match tokio::time::timeout(timeout + FETCH_GRACE, fetcher.fetch(url, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout {
            url: url.to_string(),
            after: timeout,
        }),
    }
}

/// Fetches `url`, retrying retryable failures with backoff
///
/// Non-retryable errors (e.g. HTTP 404) end the loop immediately. After the
/// last attempt the last error is returned.
pub async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    url: &Url,
    timeout: Duration,
    policy: &RetryPolicy,
) -> FetchAttempt {
    let mut attempt = 1;

    loop {
        match guarded_fetch(fetcher, url, timeout).await {
            Ok(body) => {
                return FetchAttempt {
                    result: Ok(body),
                    attempts: attempt,
                }
            }
            Err(error) if error.is_retryable() && attempt < policy.attempts => {
                let delay = policy.delay_for(attempt);
                tracing::debug!(
                    "Attempt {}/{} for {} failed ({}), retrying in {}ms",
                    attempt,
                    policy.attempts,
                    url,
                    error,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                return FetchAttempt {
                    result: Err(error),
                    attempts: attempt,
                }
            }
        }
    }
}
