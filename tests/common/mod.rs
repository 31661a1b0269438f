//! Shared helpers for integration tests

use guardian_resilience::{DetectionResult, Error, HealthCheckResult, RiskLevel};
use std::sync::Once;

static TRACING: Once = Once::new();

/// Route library logs to the test writer; `RUST_LOG=debug` shows transitions.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[allow(dead_code)]
pub async fn verdict(risk: RiskLevel) -> guardian_resilience::Result<DetectionResult> {
    Ok(DetectionResult::new(risk, 0.8))
}

#[allow(dead_code)]
pub async fn healthy(component: &'static str) -> guardian_resilience::Result<HealthCheckResult> {
    Ok(HealthCheckResult::healthy(component))
}

#[allow(dead_code)]
pub async fn down<T>(reason: &'static str) -> guardian_resilience::Result<T> {
    Err(Error::handler(reason))
}
