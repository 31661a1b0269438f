use super::status::{FallbackResult, LayerStatus};
use crate::detection::{DetectionInput, DetectionLayer, DetectionResult, FnHandler, LayerHandler};
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
use crate::resilience::registry::CircuitBreakerRegistry;
use crate::resilience::timeout::with_timeout;
use crate::{Error, ErrorContext, Result};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct FallbackChainConfig {
    /// Layers in order of preference.
    pub layer_order: Vec<DetectionLayer>,
    pub layer_timeout: Duration,
    /// When false, a layer timeout ends the walk instead of moving on.
    pub continue_on_timeout: bool,
    /// Template for the per-layer breakers.
    pub breaker: CircuitBreakerConfig,
}

impl Default for FallbackChainConfig {
    fn default() -> Self {
        Self {
            layer_order: DetectionLayer::ALL.to_vec(),
            layer_timeout: Duration::from_secs(5),
            continue_on_timeout: true,
            // Fallback layers trip sooner and recover sooner than application defaults.
            breaker: CircuitBreakerConfig::new()
                .with_failure_threshold(3)
                .with_reset_timeout(Duration::from_secs(30)),
        }
    }
}

impl FallbackChainConfig {
    pub fn new(layer_order: Vec<DetectionLayer>) -> Self {
        Self {
            layer_order,
            ..Self::default()
        }
    }

    pub fn with_layer_timeout(mut self, timeout: Duration) -> Self {
        self.layer_timeout = timeout;
        self
    }

    pub fn with_continue_on_timeout(mut self, cont: bool) -> Self {
        self.continue_on_timeout = cont;
        self
    }

    pub fn with_breaker(mut self, breaker: CircuitBreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let ctx = |field: &str| {
            ErrorContext::new()
                .with_field_path(field)
                .with_source("fallback_chain")
        };
        if self.layer_order.is_empty() {
            return Err(Error::configuration_with_context(
                "layer order must name at least one layer",
                ctx("layer_order"),
            ));
        }
        let mut seen = HashSet::new();
        for layer in &self.layer_order {
            if !seen.insert(*layer) {
                return Err(Error::configuration_with_context(
                    format!("layer '{}' appears more than once", layer),
                    ctx("layer_order"),
                ));
            }
        }
        if self.layer_timeout.is_zero() {
            return Err(Error::configuration_with_context(
                "layer timeout must be greater than zero",
                ctx("layer_timeout"),
            ));
        }
        self.breaker.validate()
    }
}

fn breaker_name(layer: DetectionLayer) -> String {
    format!("fallback.{}", layer)
}

/// Ordered detection layers, each behind its own breaker and deadline.
///
/// The first layer to succeed wins; later layers are not consulted.
pub struct FallbackChain {
    config: FallbackChainConfig,
    handlers: RwLock<HashMap<DetectionLayer, Arc<dyn LayerHandler>>>,
    statuses: RwLock<HashMap<DetectionLayer, LayerStatus>>,
    breakers: HashMap<DetectionLayer, Arc<CircuitBreaker>>,
}

impl FallbackChain {
    /// Build a chain with private breakers.
    pub fn new(config: FallbackChainConfig) -> Self {
        Self::with_registry(config, &CircuitBreakerRegistry::new())
    }

    /// Build a chain whose breakers live in `registry` as `fallback.<layer>`.
    pub fn with_registry(config: FallbackChainConfig, registry: &CircuitBreakerRegistry) -> Self {
        let mut statuses = HashMap::new();
        let mut breakers = HashMap::new();
        for &layer in &config.layer_order {
            statuses.insert(layer, LayerStatus::new(layer));
            breakers.insert(
                layer,
                registry.get_or_create_with(&breaker_name(layer), config.breaker.clone()),
            );
        }
        Self {
            config,
            handlers: RwLock::new(HashMap::new()),
            statuses: RwLock::new(statuses),
            breakers,
        }
    }

    pub fn config(&self) -> &FallbackChainConfig {
        &self.config
    }

    /// Install the handler for `layer` and mark the layer available.
    pub fn register_handler(&self, layer: DetectionLayer, handler: Arc<dyn LayerHandler>) -> Result<()> {
        if !self.breakers.contains_key(&layer) {
            return Err(Error::configuration_with_context(
                format!("layer '{}' is not part of the configured layer order", layer),
                ErrorContext::new()
                    .with_field_path("layer_order")
                    .with_source("fallback_chain"),
            ));
        }
        self.handlers
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(layer, handler);
        self.update_status(layer, |s| s.available = true);
        debug!(layer = %layer, "detection handler registered");
        Ok(())
    }

    pub fn register_fn<F, Fut>(&self, layer: DetectionLayer, func: F) -> Result<()>
    where
        F: Fn(DetectionInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<DetectionResult>> + Send + 'static,
    {
        self.register_handler(layer, Arc::new(FnHandler::new(func)))
    }

    pub fn unregister_handler(&self, layer: DetectionLayer) -> bool {
        let removed = self
            .handlers
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&layer)
            .is_some();
        if removed {
            self.update_status(layer, |s| s.available = false);
        }
        removed
    }

    /// Administrative enable/disable; a disabled layer is skipped until
    /// re-enabled.
    pub fn set_layer_available(&self, layer: DetectionLayer, available: bool) {
        self.update_status(layer, |s| s.available = available);
    }

    pub fn has_handler(&self, layer: DetectionLayer) -> bool {
        self.handler(layer).is_some()
    }

    /// Run `input` through the configured layers in order.
    ///
    /// Layers without a handler, marked unavailable, or with an open breaker
    /// are skipped. Returns the first success, or
    /// [`Error::FallbackExhausted`] listing every layer attempted.
    pub async fn execute(&self, input: &DetectionInput) -> Result<FallbackResult> {
        let started = Instant::now();
        let mut tried_layers = Vec::new();
        let mut failed_layers = Vec::new();
        let mut last_error = None;

        for &layer in &self.config.layer_order {
            let Some(handler) = self.handler(layer) else {
                continue;
            };
            if !self.is_layer_available(layer) {
                debug!(layer = %layer, "skipping unavailable detection layer");
                continue;
            }
            let Some(breaker) = self.breakers.get(&layer) else {
                continue;
            };

            tried_layers.push(layer);
            let layer_started = Instant::now();
            let operation = format!("detection layer '{}'", layer);
            let timeout = self.config.layer_timeout;
            let outcome = breaker
                .execute(|| with_timeout(timeout, &operation, handler.detect(input)))
                .await;
            let elapsed = layer_started.elapsed();

            match outcome {
                Ok(result) => {
                    self.update_status(layer, |s| s.record_success(elapsed));
                    debug!(
                        layer = %layer,
                        elapsed_ms = elapsed.as_millis() as u64,
                        failed = failed_layers.len(),
                        "detection layer succeeded"
                    );
                    return Ok(FallbackResult {
                        result,
                        layer,
                        tried_layers,
                        failed_layers,
                        total_time: started.elapsed(),
                    });
                }
                Err(err) => {
                    let timed_out = err.is_timeout();
                    let message = err.to_string();
                    warn!(
                        layer = %layer,
                        elapsed_ms = elapsed.as_millis() as u64,
                        timed_out,
                        error = message.as_str(),
                        "detection layer failed"
                    );
                    self.update_status(layer, |s| s.record_failure(message.clone(), elapsed));
                    failed_layers.push(layer);
                    last_error = Some(message);
                    if timed_out && !self.config.continue_on_timeout {
                        break;
                    }
                }
            }
        }

        Err(Error::FallbackExhausted {
            tried_layers,
            last_error,
        })
    }

    /// The layer `execute` would try first right now.
    pub fn active_layer(&self) -> Option<DetectionLayer> {
        self.available_layers().into_iter().next()
    }

    /// Eligible layers in preference order.
    pub fn available_layers(&self) -> Vec<DetectionLayer> {
        self.config
            .layer_order
            .iter()
            .copied()
            .filter(|&layer| self.has_handler(layer) && self.is_layer_available(layer))
            .collect()
    }

    pub fn layer_status(&self, layer: DetectionLayer) -> Option<LayerStatus> {
        self.statuses
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&layer)
            .cloned()
    }

    pub fn layer_statuses(&self) -> Vec<LayerStatus> {
        let statuses = self.statuses.read().unwrap_or_else(|p| p.into_inner());
        self.config
            .layer_order
            .iter()
            .filter_map(|layer| statuses.get(layer).cloned())
            .collect()
    }

    pub fn breaker(&self, layer: DetectionLayer) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(&layer).cloned()
    }

    pub fn breaker_stats(&self) -> Vec<(DetectionLayer, CircuitBreakerStats)> {
        self.config
            .layer_order
            .iter()
            .filter_map(|layer| self.breakers.get(layer).map(|cb| (*layer, cb.stats())))
            .collect()
    }

    /// Close every layer breaker.
    pub fn reset_circuit_breakers(&self) {
        for (layer, cb) in &self.breakers {
            debug!(layer = %layer, "resetting layer circuit breaker");
            cb.reset();
        }
    }

    fn handler(&self, layer: DetectionLayer) -> Option<Arc<dyn LayerHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&layer)
            .cloned()
    }

    fn is_layer_available(&self, layer: DetectionLayer) -> bool {
        let marked = self
            .statuses
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&layer)
            .map_or(false, |s| s.available);
        marked
            && self
                .breakers
                .get(&layer)
                .map_or(false, |cb| cb.state() != CircuitState::Open)
    }

    fn update_status(&self, layer: DetectionLayer, f: impl FnOnce(&mut LayerStatus)) {
        if let Some(status) = self
            .statuses
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .get_mut(&layer)
        {
            f(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::RiskLevel;

    fn ok_result() -> DetectionResult {
        DetectionResult::new(RiskLevel::Safe, 0.9)
    }

    #[test]
    fn test_config_validation() {
        assert!(FallbackChainConfig::default().validate().is_ok());
        assert!(FallbackChainConfig::new(vec![]).validate().is_err());
        assert!(FallbackChainConfig::new(vec![DetectionLayer::Api, DetectionLayer::Api])
            .validate()
            .is_err());
        assert!(FallbackChainConfig::default()
            .with_layer_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_layers_start_unavailable() {
        let chain = FallbackChain::new(FallbackChainConfig::default());
        assert!(chain.layer_statuses().iter().all(|s| !s.available));
        assert_eq!(chain.active_layer(), None);
        assert_eq!(chain.layer_statuses().len(), 4);
        assert_eq!(chain.breaker(DetectionLayer::Api).unwrap().config().failure_threshold, 3);
    }

    #[test]
    fn test_register_unknown_layer_fails() {
        let chain = FallbackChain::new(FallbackChainConfig::new(vec![DetectionLayer::Api]));
        let err = chain
            .register_fn(DetectionLayer::Blocklist, |_| async { Ok(ok_result()) })
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_wins() {
        let chain = FallbackChain::new(FallbackChainConfig::default());
        chain
            .register_fn(DetectionLayer::LocalMl, |_| async { Ok(ok_result()) })
            .unwrap();
        chain
            .register_fn(DetectionLayer::Blocklist, |_| async {
                Err(Error::handler("later layers must not run"))
            })
            .unwrap();

        let out = chain.execute(&DetectionInput::new("https://a.test")).await.unwrap();
        assert_eq!(out.layer, DetectionLayer::LocalMl);
        assert_eq!(out.tried_layers, vec![DetectionLayer::LocalMl]);
        assert!(out.failed_layers.is_empty());
        assert!(!out.is_degraded());

        let status = chain.layer_status(DetectionLayer::LocalMl).unwrap();
        assert!(status.available);
        assert!(status.last_error.is_none());
        assert!(status.response_time_ms.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_handlers_exhausts_immediately() {
        let chain = FallbackChain::new(FallbackChainConfig::default());
        match chain.execute(&DetectionInput::new("https://a.test")).await {
            Err(Error::FallbackExhausted { tried_layers, last_error }) => {
                assert!(tried_layers.is_empty());
                assert!(last_error.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_layer_is_skipped() {
        let chain = FallbackChain::new(FallbackChainConfig::default());
        chain
            .register_fn(DetectionLayer::Api, |_| async { Ok(ok_result()) })
            .unwrap();
        chain
            .register_fn(DetectionLayer::Blocklist, |_| async { Ok(ok_result()) })
            .unwrap();
        chain.set_layer_available(DetectionLayer::Api, false);
        assert_eq!(chain.active_layer(), Some(DetectionLayer::Blocklist));

        let out = chain.execute(&DetectionInput::new("https://a.test")).await.unwrap();
        assert_eq!(out.layer, DetectionLayer::Blocklist);
        assert!(out.is_degraded());

        assert!(chain.unregister_handler(DetectionLayer::Blocklist));
        assert!(!chain.has_handler(DetectionLayer::Blocklist));
        assert!(chain.available_layers().is_empty());
    }
}
