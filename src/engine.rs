//! 防护引擎：组合根
//!
//! Protection engine: owns one breaker registry, one fallback chain, one
//! health checker and one status indicator, all built from a single
//! [`EngineConfig`]. Applications create as many engines as they need; nothing
//! here is global.

use crate::config::EngineConfig;
use crate::detection::{DetectionInput, DetectionLayer, LayerHandler};
use crate::fallback::{FallbackChain, FallbackResult};
use crate::health::{HealthChecker, HealthProbe, SystemHealth};
use crate::resilience::{CircuitBreakerRegistry, RetryExecutor};
use crate::status::{LogNotifier, ProtectionLevelInfo, StatusIndicator, StatusNotifier};
use crate::subscription::SubscriptionId;
use crate::Result;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct ProtectionEngine {
    config: EngineConfig,
    registry: Arc<CircuitBreakerRegistry>,
    chain: FallbackChain,
    checker: Arc<HealthChecker>,
    indicator: Arc<StatusIndicator>,
    retry: RetryExecutor,
    status_subscription: Mutex<Option<SubscriptionId>>,
}

impl ProtectionEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_notifier(config, Arc::new(LogNotifier))
    }

    /// Build an engine whose level changes go to `notifier`.
    pub fn with_notifier(config: EngineConfig, notifier: Arc<dyn StatusNotifier>) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(CircuitBreakerRegistry::with_default_config(
            config.circuit_breaker.to_config(),
        ));
        let chain = FallbackChain::with_registry(config.fallback.to_config(), &registry);
        let checker = Arc::new(HealthChecker::new(config.health.to_config()));
        let indicator = Arc::new(StatusIndicator::with_notifier(
            config.status.to_config(),
            notifier,
        ));
        let retry = RetryExecutor::new(config.retry.to_config());

        Ok(Self {
            config,
            registry,
            chain,
            checker,
            indicator,
            retry,
            status_subscription: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.registry
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    pub fn checker(&self) -> &Arc<HealthChecker> {
        &self.checker
    }

    pub fn indicator(&self) -> &Arc<StatusIndicator> {
        &self.indicator
    }

    /// Executor for application calls outside the chain (model downloads,
    /// blocklist refreshes).
    pub fn retry(&self) -> &RetryExecutor {
        &self.retry
    }

    pub fn register_layer(&self, layer: DetectionLayer, handler: Arc<dyn LayerHandler>) -> Result<()> {
        self.chain.register_handler(layer, handler)
    }

    pub fn register_probe(&self, component: impl Into<String>, probe: Arc<dyn HealthProbe>) {
        self.checker.register_probe(component, probe);
    }

    pub async fn detect(&self, input: &DetectionInput) -> Result<FallbackResult> {
        self.chain.execute(input).await
    }

    /// Wire the indicator to health snapshots and begin periodic checks.
    pub fn start(&self) -> Result<()> {
        {
            let mut sub = self
                .status_subscription
                .lock()
                .unwrap_or_else(|p| p.into_inner());
            if sub.is_none() {
                let indicator = Arc::downgrade(&self.indicator);
                *sub = Some(self.checker.subscribe(move |health| {
                    if let Some(indicator) = indicator.upgrade() {
                        indicator.update_from_health(health);
                    }
                }));
            }
        }
        self.checker.start()?;
        info!(
            layers = self.config.fallback.layer_order.len(),
            probes = self.checker.probe_names().len(),
            "protection engine started"
        );
        Ok(())
    }

    /// Cancel periodic checks and detach the indicator.
    pub fn stop(&self) {
        self.checker.stop();
        if let Some(id) = self
            .status_subscription
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            self.checker.unsubscribe(id);
        }
        info!("protection engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.checker.is_running()
    }

    /// Run one health cycle and make sure the indicator reflects it.
    pub async fn check_now(&self) -> Arc<SystemHealth> {
        let health = self.checker.check_now().await;
        let attached = self
            .status_subscription
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .is_some();
        if !attached {
            self.indicator.update_from_health(&health);
        }
        health
    }

    pub fn status(&self) -> ProtectionLevelInfo {
        self.indicator.protection_level()
    }
}

impl Drop for ProtectionEngine {
    fn drop(&mut self) {
        self.checker.stop();
    }
}
