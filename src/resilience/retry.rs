//! Retry executor
//!
//! Bounded retries with exponential backoff and optional full jitter.

use crate::{Error, ErrorContext, Result};
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Decides whether a failed attempt may be retried.
pub type RetryPredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Configuration for retry logic
#[derive(Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Full jitter: the actual sleep is uniform in `[0, delay]`.
    pub jitter: bool,
    /// `None` treats every error as retryable.
    pub is_retryable: Option<RetryPredicate>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
            jitter: true,
            is_retryable: None,
        }
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter", &self.jitter)
            .field("is_retryable", &self.is_retryable.is_some())
            .finish()
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_retryable<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Error) -> bool + Send + Sync + 'static,
    {
        self.is_retryable = Some(Arc::new(predicate));
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::configuration_with_context(
                "backoff multiplier must be a finite number >= 1",
                ErrorContext::new()
                    .with_field_path("backoff_multiplier")
                    .with_details(format!("got {}", self.backoff_multiplier))
                    .with_source("retry"),
            ));
        }
        if self.max_delay < self.base_delay {
            return Err(Error::configuration_with_context(
                "max delay must not be smaller than base delay",
                ErrorContext::new()
                    .with_field_path("max_delay")
                    .with_source("retry"),
            ));
        }
        Ok(())
    }

    fn retryable(&self, err: &Error) -> bool {
        self.is_retryable.as_ref().map_or(true, |p| p(err))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryStats {
    pub total_operations: u64,
    pub first_try_successes: u64,
    pub retry_successes: u64,
    pub total_failures: u64,
    /// Retries across all operations (attempts beyond the first).
    pub total_retries: u64,
    pub average_retries: f64,
}

impl RetryStats {
    fn record(&mut self, retries: u32) {
        self.total_operations += 1;
        self.total_retries += u64::from(retries);
        self.average_retries = self.total_retries as f64 / self.total_operations as f64;
    }
}

/// Runs async operations with bounded retries.
///
/// Statistics accumulate across calls until [`RetryExecutor::reset_stats`].
pub struct RetryExecutor {
    config: RetryConfig,
    stats: Mutex<RetryStats>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            stats: Mutex::new(RetryStats::default()),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Backoff before retry number `attempt + 1`, before jitter:
    /// `min(max_delay, base_delay * multiplier^attempt)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay.as_millis() as f64;
        let cap = self.config.max_delay.as_millis() as f64;
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = (base * self.config.backoff_multiplier.powi(exp)).min(cap);
        if delay.is_finite() && delay > 0.0 {
            Duration::from_millis(delay as u64)
        } else if delay.is_finite() {
            Duration::ZERO
        } else {
            self.config.max_delay
        }
    }

    fn sleep_duration(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if self.config.jitter && !delay.is_zero() {
            let ms = rand::thread_rng().gen_range(0..=delay.as_millis() as u64);
            Duration::from_millis(ms)
        } else {
            delay
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_retries` retries are used up.
    ///
    /// A non-retryable error is returned as is; exhaustion yields
    /// [`Error::RetryExhausted`] wrapping the last error.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    let mut stats = self.lock_stats();
                    stats.record(attempt);
                    if attempt == 0 {
                        stats.first_try_successes += 1;
                    } else {
                        stats.retry_successes += 1;
                        debug!(attempts = attempt + 1, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    if !self.config.retryable(&err) {
                        let mut stats = self.lock_stats();
                        stats.record(attempt);
                        stats.total_failures += 1;
                        debug!(attempt, error = %err, "non-retryable error, giving up");
                        return Err(err);
                    }
                    if attempt >= self.config.max_retries {
                        let mut stats = self.lock_stats();
                        stats.record(attempt);
                        stats.total_failures += 1;
                        warn!(attempts = attempt + 1, error = %err, "retry attempts exhausted");
                        return Err(Error::RetryExhausted {
                            attempts: attempt + 1,
                            last_error: Box::new(err),
                        });
                    }
                    let delay = self.sleep_duration(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    pub fn stats(&self) -> RetryStats {
        self.lock_stats().clone()
    }

    pub fn reset_stats(&self) {
        *self.lock_stats() = RetryStats::default();
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, RetryStats> {
        self.stats.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
