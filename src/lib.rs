//! # guardian-resilience
//!
//! 浏览器钓鱼防护扩展的容错引擎：熔断、重试、多层降级检测、健康检查与防护等级展示。
//!
//! Resilience engine for a phishing-protection client. It keeps detection
//! running when individual detection methods fail, and tells the user how much
//! protection is actually active.
//!
//! ## Overview
//!
//! Detection is layered: cloud analysis, an on-device model, URL reputation
//! and a blocklist. Each layer sits behind its own circuit breaker and
//! deadline, and the first layer to answer wins. A health checker probes every
//! component on a schedule and maps the results to a protection level; the
//! status indicator turns that level into user-facing text.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use guardian_resilience::{
//!     DetectionInput, DetectionLayer, DetectionResult, EngineConfig, HealthCheckResult,
//!     ProtectionEngine, RiskLevel,
//! };
//!
//! #[tokio::main]
//! async fn main() -> guardian_resilience::Result<()> {
//!     let engine = ProtectionEngine::new(EngineConfig::default())?;
//!
//!     engine.chain().register_fn(DetectionLayer::Blocklist, |input| async move {
//!         let risky = input.url.contains("login-verify");
//!         Ok(DetectionResult::new(
//!             if risky { RiskLevel::High } else { RiskLevel::Safe },
//!             0.7,
//!         ))
//!     })?;
//!     engine
//!         .checker()
//!         .register_fn("blocklist", || async { Ok(HealthCheckResult::healthy("blocklist")) });
//!
//!     engine.start()?;
//!     let verdict = engine.detect(&DetectionInput::new("https://example.test")).await?;
//!     println!("{:?} via {}", verdict.result.risk_level, verdict.layer);
//!     println!("{}", engine.indicator().summary());
//!     engine.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`resilience`] | Circuit breaker, breaker registry, retry with backoff, deadlines |
//! | [`fallback`] | Ordered detection layers with per-layer breakers |
//! | [`health`] | Component probes, periodic checks, protection level |
//! | [`status`] | User-facing protection status and level-change notifications |
//! | [`config`] | YAML/JSON engine configuration |
//! | [`engine`] | [`ProtectionEngine`] composition root |
//!
//! The library emits `tracing` events but never installs a subscriber.

pub mod config;
pub mod detection;
pub mod engine;
pub mod fallback;
pub mod health;
pub mod resilience;
pub mod status;

mod subscription;

// Re-export main types for convenience
pub use config::EngineConfig;
pub use detection::{DetectionInput, DetectionLayer, DetectionResult, LayerHandler, RiskLevel};
pub use engine::ProtectionEngine;
pub use fallback::{FallbackChain, FallbackChainConfig, FallbackResult, LayerStatus};
pub use health::{
    HealthCheckConfig, HealthCheckResult, HealthChecker, HealthProbe, ProtectionLevel,
    SystemHealth,
};
pub use resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState, RetryConfig,
    RetryExecutor,
};
pub use status::{ProtectionLevelInfo, StatusIndicator, StatusNotifier};
pub use subscription::SubscriptionId;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
