//! 弹性模式模块：提供熔断器、熔断器注册表、重试执行器和超时控制。
//!
//! # Resilience Primitives Module
//!
//! Building blocks that decide *whether* and *when* a call to an unreliable
//! dependency runs.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`circuit_breaker`] | Three-state breaker that fails fast after repeated failures |
//! | [`registry`] | Name → breaker cache, one breaker per dependency |
//! | [`retry`] | Bounded retries with exponential backoff and full jitter |
//! | [`timeout`] | Deadline race used by the fallback chain and health checker |
//!
//! ## Circuit Breaker
//!
//! - **Closed**: Normal operation, calls pass through
//! - **Open**: Failure threshold reached, calls fail fast
//! - **Half-Open**: Cooldown elapsed, trial calls test recovery
//!
//! ```rust
//! use guardian_resilience::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn demo() -> guardian_resilience::Result<()> {
//! let config = CircuitBreakerConfig::new()
//!     .with_name("cloud_api")
//!     .with_failure_threshold(5)
//!     .with_reset_timeout(Duration::from_secs(30));
//! let breaker = CircuitBreaker::new(config);
//!
//! let verdict = breaker.execute(|| async { Ok("safe") }).await?;
//! # let _ = verdict;
//! # Ok(())
//! # }
//! ```
//!
//! ## Retry
//!
//! ```rust
//! use guardian_resilience::resilience::retry::{RetryConfig, RetryExecutor};
//! use std::time::Duration;
//!
//! # async fn demo() -> guardian_resilience::Result<()> {
//! let retry = RetryExecutor::new(
//!     RetryConfig::new()
//!         .with_max_retries(3)
//!         .with_base_delay(Duration::from_millis(200)),
//! );
//! let value = retry.execute(|| async { Ok(42) }).await?;
//! # let _ = value;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod registry;
pub mod retry;
pub mod timeout;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use registry::CircuitBreakerRegistry;
pub use retry::{RetryConfig, RetryExecutor, RetryPredicate, RetryStats};
pub use timeout::with_timeout;
