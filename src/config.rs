//! Engine configuration
//!
//! Plain structured settings for every component, loadable from YAML or JSON.
//! All durations are milliseconds; every field has a default, so a partial
//! document only overrides what it names.

use crate::detection::DetectionLayer;
use crate::fallback::FallbackChainConfig;
use crate::health::HealthCheckConfig;
use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use crate::status::StatusIndicatorConfig;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self::from(&CircuitBreakerConfig::default())
    }
}

impl From<&CircuitBreakerConfig> for CircuitBreakerSettings {
    fn from(cfg: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: cfg.failure_threshold,
            reset_timeout_ms: cfg.reset_timeout.as_millis() as u64,
            success_threshold: cfg.success_threshold,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn to_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_failure_threshold(self.failure_threshold)
            .with_reset_timeout(Duration::from_millis(self.reset_timeout_ms))
            .with_success_threshold(self.success_threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let cfg = RetryConfig::default();
        Self {
            max_retries: cfg.max_retries,
            base_delay_ms: cfg.base_delay.as_millis() as u64,
            max_delay_ms: cfg.max_delay.as_millis() as u64,
            backoff_multiplier: cfg.backoff_multiplier,
            jitter: cfg.jitter,
        }
    }
}

impl RetrySettings {
    /// The retryability predicate is code, not configuration; it defaults to
    /// [`Error::is_retryable_default`].
    pub fn to_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(self.max_retries)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_backoff_multiplier(self.backoff_multiplier)
            .with_jitter(self.jitter)
            .with_retryable(Error::is_retryable_default)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackSettings {
    pub layer_order: Vec<DetectionLayer>,
    pub layer_timeout_ms: u64,
    pub continue_on_timeout: bool,
    pub circuit_breaker: CircuitBreakerSettings,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        let cfg = FallbackChainConfig::default();
        Self {
            layer_order: cfg.layer_order.clone(),
            layer_timeout_ms: cfg.layer_timeout.as_millis() as u64,
            continue_on_timeout: cfg.continue_on_timeout,
            circuit_breaker: CircuitBreakerSettings::from(&cfg.breaker),
        }
    }
}

impl FallbackSettings {
    pub fn to_config(&self) -> FallbackChainConfig {
        FallbackChainConfig::new(self.layer_order.clone())
            .with_layer_timeout(Duration::from_millis(self.layer_timeout_ms))
            .with_continue_on_timeout(self.continue_on_timeout)
            .with_breaker(self.circuit_breaker.to_config())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub components: Vec<String>,
}

impl Default for HealthSettings {
    fn default() -> Self {
        let cfg = HealthCheckConfig::default();
        Self {
            interval_ms: cfg.interval.as_millis() as u64,
            timeout_ms: cfg.timeout.as_millis() as u64,
            components: cfg.components,
        }
    }
}

impl HealthSettings {
    pub fn to_config(&self) -> HealthCheckConfig {
        HealthCheckConfig::default()
            .with_interval(Duration::from_millis(self.interval_ms))
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_components(self.components.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSettings {
    pub history_limit: usize,
    pub notify_on_level_change: bool,
}

impl Default for StatusSettings {
    fn default() -> Self {
        let cfg = StatusIndicatorConfig::default();
        Self {
            history_limit: cfg.history_limit,
            notify_on_level_change: cfg.notify_on_level_change,
        }
    }
}

impl StatusSettings {
    pub fn to_config(&self) -> StatusIndicatorConfig {
        StatusIndicatorConfig {
            history_limit: self.history_limit,
            notify_on_level_change: self.notify_on_level_change,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Defaults for breakers created through the shared registry.
    pub circuit_breaker: CircuitBreakerSettings,
    pub retry: RetrySettings,
    pub fallback: FallbackSettings,
    pub health: HealthSettings,
    pub status: StatusSettings,
}

impl EngineConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.yaml`/`.yml` or `.json` file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            other => Err(Error::configuration_with_context(
                format!("unsupported config format: {:?}", other.unwrap_or("")),
                ErrorContext::new()
                    .with_field_path(path.to_string_lossy())
                    .with_details("expected .yaml, .yml or .json")
                    .with_source("config_loader"),
            )),
        }
    }

    /// Check every section, reporting the first invalid field with its
    /// dotted path.
    pub fn validate(&self) -> Result<()> {
        prefixed("circuit_breaker", self.circuit_breaker.to_config().validate())?;
        prefixed("retry", self.retry.to_config().validate())?;
        prefixed(
            "fallback.circuit_breaker",
            self.fallback.circuit_breaker.to_config().validate(),
        )?;
        prefixed("fallback", self.fallback.to_config().validate())?;
        prefixed("health", self.health.to_config().validate())?;
        prefixed("status", self.status.to_config().validate())?;
        Ok(())
    }
}

fn prefixed(section: &str, result: Result<()>) -> Result<()> {
    result.map_err(|err| match err {
        Error::Configuration { message, context } => {
            let field = match context.field_path {
                Some(ref f) => format!("{}.{}", section, f),
                None => section.to_string(),
            };
            Error::Configuration {
                message,
                context: ErrorContext {
                    field_path: Some(field),
                    ..context
                },
            }
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_component_defaults() {
        let cfg = EngineConfig::default();
        tokio_test::assert_ok!(cfg.validate());
        assert_eq!(cfg.circuit_breaker.failure_threshold, 5);
        assert_eq!(cfg.circuit_breaker.reset_timeout_ms, 60_000);
        assert_eq!(cfg.fallback.circuit_breaker.failure_threshold, 3);
        assert_eq!(cfg.retry.max_retries, 5);
        assert_eq!(cfg.status.history_limit, 100);
        assert_eq!(cfg.fallback.layer_order, DetectionLayer::ALL.to_vec());
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let cfg = EngineConfig::from_yaml_str(
            r#"
fallback:
  layer_order: [local_ml, blocklist]
  layer_timeout_ms: 1500
  continue_on_timeout: false
health:
  interval_ms: 10000
status:
  history_limit: 20
"#,
        )
        .unwrap();
        assert_eq!(
            cfg.fallback.layer_order,
            vec![DetectionLayer::LocalMl, DetectionLayer::Blocklist]
        );
        let chain = cfg.fallback.to_config();
        assert_eq!(chain.layer_timeout, Duration::from_millis(1500));
        assert!(!chain.continue_on_timeout);
        assert_eq!(cfg.health.to_config().interval, Duration::from_secs(10));
        assert_eq!(cfg.health.timeout_ms, 5_000);
        assert_eq!(cfg.status.history_limit, 20);
    }

    #[test]
    fn test_json_config() {
        let cfg =
            EngineConfig::from_json_str(r#"{"retry": {"max_retries": 2, "jitter": false}}"#)
                .unwrap();
        let retry = cfg.retry.to_config();
        assert_eq!(retry.max_retries, 2);
        assert!(!retry.jitter);
        assert!(retry.is_retryable.is_some());
    }

    #[test]
    fn test_invalid_field_is_reported_with_path() {
        let err = EngineConfig::from_yaml_str(
            "fallback:\n  circuit_breaker:\n    failure_threshold: 0\n",
        )
        .unwrap_err();
        let ctx = err.context().unwrap();
        assert_eq!(
            ctx.field_path.as_deref(),
            Some("fallback.circuit_breaker.failure_threshold")
        );

        let err = EngineConfig::from_yaml_str("health:\n  interval_ms: 0\n").unwrap_err();
        assert_eq!(err.context().unwrap().field_path.as_deref(), Some("health.interval"));
    }

    #[test]
    fn test_unknown_layer_is_rejected() {
        let err = EngineConfig::from_yaml_str("fallback:\n  layer_order: [api, cloud]\n").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let dir = std::env::temp_dir().join("guardian-resilience-config-test.toml");
        tokio::fs::write(&dir, "x = 1").await.unwrap();
        let err = EngineConfig::from_path(&dir).await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        let _ = tokio::fs::remove_file(&dir).await;
    }
}
