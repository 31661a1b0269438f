//! 降级链模块：按优先级依次尝试各检测层，首个成功者胜出。
//!
//! Layered fallback across detection methods.
//!
//! A [`FallbackChain`] walks its configured layers (cloud API → local ML →
//! URL reputation → blocklist by default). Every layer call runs behind the
//! layer's own [`CircuitBreaker`](crate::resilience::CircuitBreaker) and a
//! per-call deadline; an open breaker removes the layer from routing until it
//! recovers.
//!
//! ```rust
//! use guardian_resilience::detection::{DetectionInput, DetectionLayer, DetectionResult, RiskLevel};
//! use guardian_resilience::fallback::{FallbackChain, FallbackChainConfig};
//!
//! # async fn demo() -> guardian_resilience::Result<()> {
//! let chain = FallbackChain::new(FallbackChainConfig::default());
//! chain.register_fn(DetectionLayer::Blocklist, |_input| async {
//!     Ok(DetectionResult::new(RiskLevel::Safe, 0.6))
//! })?;
//!
//! let outcome = chain.execute(&DetectionInput::new("https://example.test")).await?;
//! assert_eq!(outcome.layer, DetectionLayer::Blocklist);
//! # Ok(())
//! # }
//! ```

mod chain;
mod status;

pub use chain::{FallbackChain, FallbackChainConfig};
pub use status::{FallbackResult, LayerStatus};
