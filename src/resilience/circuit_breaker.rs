use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("closed"),
            CircuitState::Open => f.write_str("open"),
            CircuitState::HalfOpen => f.write_str("half_open"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in `Closed` that trip the breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays `Open` before admitting trial calls.
    pub reset_timeout: Duration,
    /// Successes in `HalfOpen` required to close again.
    pub success_threshold: u32,
    pub name: Option<String>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            success_threshold: 1,
            name: None,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        let ctx = |field: &str| {
            ErrorContext::new()
                .with_field_path(field)
                .with_source("circuit_breaker")
        };
        if self.failure_threshold == 0 {
            return Err(Error::configuration_with_context(
                "failure threshold must be at least 1",
                ctx("failure_threshold"),
            ));
        }
        if self.success_threshold == 0 {
            return Err(Error::configuration_with_context(
                "success threshold must be at least 1",
                ctx("success_threshold"),
            ));
        }
        if self.reset_timeout.is_zero() {
            return Err(Error::configuration_with_context(
                "reset timeout must be greater than zero",
                ctx("reset_timeout"),
            ));
        }
        Ok(())
    }
}

/// Point-in-time view of a breaker's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    /// Consecutive failures since the last transition or success.
    pub failure_count: u32,
    /// Successes recorded in the current half-open cohort.
    pub success_count: u32,
    /// Calls admitted to the wrapped operation.
    pub total_calls: u64,
    pub total_failures: u64,
    pub total_successes: u64,
    /// Calls rejected while open; never part of `total_calls`.
    pub total_rejections: u64,
    pub last_failure_at: Option<Instant>,
    pub last_success_at: Option<Instant>,
    pub opened_at: Option<Instant>,
    pub half_opened_at: Option<Instant>,
    pub closed_at: Option<Instant>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    total_calls: u64,
    total_failures: u64,
    total_successes: u64,
    total_rejections: u64,
    last_failure_at: Option<Instant>,
    last_success_at: Option<Instant>,
    opened_at: Option<Instant>,
    half_opened_at: Option<Instant>,
    closed_at: Option<Instant>,
    /// Bumped on every transition to open; a timer only acts on its own generation.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            total_calls: 0,
            total_failures: 0,
            total_successes: 0,
            total_rejections: 0,
            last_failure_at: None,
            last_success_at: None,
            opened_at: None,
            half_opened_at: None,
            closed_at: None,
            generation: 0,
            timer: None,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }

    fn remaining_cooldown(&self, reset_timeout: Duration, now: Instant) -> Duration {
        match self.opened_at {
            Some(opened) => reset_timeout.saturating_sub(now.saturating_duration_since(opened)),
            None => Duration::ZERO,
        }
    }

    fn enter_half_open(&mut self, now: Instant) {
        self.state = CircuitState::HalfOpen;
        self.failure_count = 0;
        self.success_count = 0;
        self.half_opened_at = Some(now);
    }

    fn enter_closed(&mut self, now: Instant) {
        self.cancel_timer();
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.success_count = 0;
        self.closed_at = Some(now);
    }

    fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: self.state,
            failure_count: self.failure_count,
            success_count: self.success_count,
            total_calls: self.total_calls,
            total_failures: self.total_failures,
            total_successes: self.total_successes,
            total_rejections: self.total_rejections,
            last_failure_at: self.last_failure_at,
            last_success_at: self.last_success_at,
            opened_at: self.opened_at,
            half_opened_at: self.half_opened_at,
            closed_at: self.closed_at,
        }
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    // critical sections are plain assignments; a poisoned guard is still consistent
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Three-state circuit breaker guarding one unreliable dependency.
///
/// - `Closed`: calls pass through; consecutive failures are counted
/// - `Open`: calls fail fast with [`Error::CircuitOpen`] until the reset timeout elapses
/// - `HalfOpen`: trial calls pass; enough successes close, any failure reopens
///
/// Admission and outcome recording are each one critical section; the lock is
/// never held while the wrapped operation runs.
pub struct CircuitBreaker {
    name: String,
    cfg: CircuitBreakerConfig,
    inner: Arc<Mutex<Inner>>,
}

impl CircuitBreaker {
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        let name = cfg.name.clone().unwrap_or_else(|| "default".to_string());
        Self {
            name,
            cfg,
            inner: Arc::new(Mutex::new(Inner::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.cfg
    }

    /// Run `operation` through the breaker.
    ///
    /// Operation errors are recorded and returned unchanged; only a rejected
    /// call produces [`Error::CircuitOpen`].
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.admit()?;
        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure(&err);
                Err(err)
            }
        }
    }

    /// Current state, performing a due open → half-open transition first.
    pub fn state(&self) -> CircuitState {
        let mut st = lock(&self.inner);
        self.refresh_locked(&mut st, Instant::now());
        st.state
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Time left before trial calls are admitted, if currently open.
    pub fn remaining_cooldown(&self) -> Option<Duration> {
        let now = Instant::now();
        let mut st = lock(&self.inner);
        self.refresh_locked(&mut st, now);
        (st.state == CircuitState::Open).then(|| st.remaining_cooldown(self.cfg.reset_timeout, now))
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let mut st = lock(&self.inner);
        self.refresh_locked(&mut st, Instant::now());
        st.stats()
    }

    pub fn force_open(&self) {
        let mut st = lock(&self.inner);
        warn!(breaker = self.name.as_str(), from = %st.state, "circuit breaker forced open");
        self.open_locked(&mut st, Instant::now());
    }

    pub fn force_close(&self) {
        let mut st = lock(&self.inner);
        info!(breaker = self.name.as_str(), from = %st.state, "circuit breaker forced closed");
        st.enter_closed(Instant::now());
    }

    /// Return to a clean closed state. Lifetime totals are kept.
    pub fn reset(&self) {
        let mut st = lock(&self.inner);
        st.cancel_timer();
        if st.state != CircuitState::Closed {
            info!(breaker = self.name.as_str(), from = %st.state, "circuit breaker reset");
            st.enter_closed(Instant::now());
        }
        st.failure_count = 0;
        st.success_count = 0;
    }

    fn admit(&self) -> Result<()> {
        let now = Instant::now();
        let mut st = lock(&self.inner);
        self.refresh_locked(&mut st, now);
        if st.state == CircuitState::Open {
            st.total_rejections += 1;
            let remaining = st.remaining_cooldown(self.cfg.reset_timeout, now);
            debug!(
                breaker = self.name.as_str(),
                remaining_ms = remaining.as_millis() as u64,
                "circuit breaker rejected call"
            );
            return Err(Error::CircuitOpen {
                name: self.name.clone(),
                remaining_ms: remaining.as_millis() as u64,
            });
        }
        st.total_calls += 1;
        Ok(())
    }

    fn on_success(&self) {
        let now = Instant::now();
        let mut st = lock(&self.inner);
        st.total_successes += 1;
        st.last_success_at = Some(now);
        match st.state {
            CircuitState::Closed => st.failure_count = 0,
            CircuitState::HalfOpen => {
                st.success_count += 1;
                if st.success_count >= self.cfg.success_threshold {
                    st.enter_closed(now);
                    info!(breaker = self.name.as_str(), "circuit breaker closed after successful trial");
                }
            }
            // Admitted before another caller tripped the breaker.
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self, err: &Error) {
        let now = Instant::now();
        let mut st = lock(&self.inner);
        st.total_failures += 1;
        st.last_failure_at = Some(now);
        match st.state {
            CircuitState::Closed => {
                st.failure_count = st.failure_count.saturating_add(1);
                if st.failure_count >= self.cfg.failure_threshold {
                    warn!(
                        breaker = self.name.as_str(),
                        failures = st.failure_count,
                        error = %err,
                        "circuit breaker opened"
                    );
                    self.open_locked(&mut st, now);
                }
            }
            CircuitState::HalfOpen => {
                warn!(breaker = self.name.as_str(), error = %err, "trial call failed, circuit breaker reopened");
                self.open_locked(&mut st, now);
            }
            CircuitState::Open => {}
        }
    }

    fn refresh_locked(&self, st: &mut Inner, now: Instant) {
        if st.state == CircuitState::Open
            && st.remaining_cooldown(self.cfg.reset_timeout, now).is_zero()
        {
            st.cancel_timer();
            st.enter_half_open(now);
            info!(breaker = self.name.as_str(), "circuit breaker half-open");
        }
    }

    fn open_locked(&self, st: &mut Inner, now: Instant) {
        st.cancel_timer();
        st.state = CircuitState::Open;
        st.failure_count = 0;
        st.success_count = 0;
        st.opened_at = Some(now);
        st.generation = st.generation.wrapping_add(1);
        st.timer = schedule_half_open(
            Arc::downgrade(&self.inner),
            st.generation,
            self.cfg.reset_timeout,
            self.name.clone(),
        );
    }
}

/// Spawn the open → half-open timer. Outside a runtime the transition is
/// left to the lazy check in `state()` and `execute()`.
fn schedule_half_open(
    inner: Weak<Mutex<Inner>>,
    generation: u64,
    delay: Duration,
    name: String,
) -> Option<JoinHandle<()>> {
    let handle = tokio::runtime::Handle::try_current().ok()?;
    Some(handle.spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut st = lock(&inner);
        if st.state == CircuitState::Open && st.generation == generation {
            st.timer = None;
            st.enter_half_open(Instant::now());
            info!(breaker = name.as_str(), "circuit breaker half-open");
        }
    }))
}

impl Drop for CircuitBreaker {
    fn drop(&mut self) {
        lock(&self.inner).cancel_timer();
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.cfg)
            .field("stats", &lock(&self.inner).stats())
            .finish()
    }
}
