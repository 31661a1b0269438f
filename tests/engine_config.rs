//! Engine assembled from a configuration file

mod common;

use guardian_resilience::{
    CircuitState, DetectionInput, DetectionLayer, EngineConfig, Error, ProtectionEngine,
    ProtectionLevel, RiskLevel,
};
use std::time::Duration;

const ENGINE_YAML: &str = r#"
circuit_breaker:
  failure_threshold: 2
  reset_timeout_ms: 5000
retry:
  max_retries: 2
  base_delay_ms: 100
  max_delay_ms: 400
  jitter: false
fallback:
  layer_order: [api, local_ml, blocklist]
  layer_timeout_ms: 250
  circuit_breaker:
    failure_threshold: 1
    reset_timeout_ms: 10000
health:
  interval_ms: 15000
  timeout_ms: 200
  components: [api, local_ml, blocklist]
status:
  history_limit: 10
"#;

async fn write_config(name: &str, content: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!(
        "guardian-resilience-{}-{}",
        std::process::id(),
        name
    ));
    tokio::fs::write(&path, content).await.unwrap();
    path
}

#[tokio::test]
async fn test_load_yaml_and_json_files() {
    let yaml = write_config("engine.yaml", ENGINE_YAML).await;
    let config = EngineConfig::from_path(&yaml).await.unwrap();
    assert_eq!(config.fallback.layer_order.len(), 3);
    assert_eq!(config.health.components, vec!["api", "local_ml", "blocklist"]);

    let json = write_config("engine.json", &serde_json::to_string(&config).unwrap()).await;
    let reloaded = EngineConfig::from_path(&json).await.unwrap();
    assert_eq!(reloaded, config);

    let _ = tokio::fs::remove_file(&yaml).await;
    let _ = tokio::fs::remove_file(&json).await;
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let err = EngineConfig::from_path("/nonexistent/guardian.yaml")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[tokio::test(start_paused = true)]
async fn test_engine_end_to_end() {
    common::init_tracing();
    let engine = ProtectionEngine::new(EngineConfig::from_yaml_str(ENGINE_YAML).unwrap()).unwrap();

    engine
        .chain()
        .register_fn(DetectionLayer::Api, |_| common::down("502 bad gateway"))
        .unwrap();
    engine
        .chain()
        .register_fn(DetectionLayer::LocalMl, |_| common::verdict(RiskLevel::Critical))
        .unwrap();
    assert!(engine
        .chain()
        .register_fn(DetectionLayer::UrlReputation, |_| common::verdict(RiskLevel::Safe))
        .is_err());

    engine.checker().register_fn("api", || common::down("502 bad gateway"));
    engine
        .checker()
        .register_fn("local_ml", || common::healthy("local_ml"));
    engine
        .checker()
        .register_fn("blocklist", || common::healthy("blocklist"));

    engine.start().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let status = engine.status();
    assert_eq!(status.level, ProtectionLevel::Degraded);
    assert_eq!(status.unavailable_methods, vec!["Cloud threat analysis"]);
    assert!(!status.recommendations.is_empty());

    let input = DetectionInput::new("https://bank-verify.example.test");
    let out = engine.detect(&input).await.unwrap();
    assert_eq!(out.layer, DetectionLayer::LocalMl);
    assert_eq!(out.result.risk_level, RiskLevel::Critical);

    let api = engine.registry().get("fallback.api").unwrap();
    assert_eq!(api.state(), CircuitState::Open);
    let out = engine.detect(&input).await.unwrap();
    assert_eq!(out.tried_layers, vec![DetectionLayer::LocalMl]);

    engine.stop();
    assert!(!engine.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_engine_retry_uses_configured_backoff() {
    let engine = ProtectionEngine::new(EngineConfig::from_yaml_str(ENGINE_YAML).unwrap()).unwrap();
    assert_eq!(engine.retry().delay_for_attempt(0), Duration::from_millis(100));
    assert_eq!(engine.retry().delay_for_attempt(5), Duration::from_millis(400));

    let started = tokio::time::Instant::now();
    let err = engine
        .retry()
        .execute(|| common::down::<()>("flaky mirror"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RetryExhausted { attempts: 3, .. }));
    // 100 ms + 200 ms without jitter
    assert_eq!(started.elapsed(), Duration::from_millis(300));
    assert_eq!(engine.retry().stats().total_failures, 1);
}
