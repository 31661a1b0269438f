use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};

/// Well-known component names.
pub mod components {
    use crate::detection::DetectionLayer;

    pub const API: &str = "api";
    pub const LOCAL_ML: &str = "local_ml";
    pub const URL_REPUTATION: &str = "url_reputation";
    pub const BLOCKLIST: &str = "blocklist";
    pub const STORAGE: &str = "storage";

    pub const ALL: [&str; 5] = [API, LOCAL_ML, URL_REPUTATION, BLOCKLIST, STORAGE];

    /// Components that provide full content analysis.
    pub fn is_primary(name: &str) -> bool {
        DetectionLayer::parse(name).map_or(false, |layer| layer.is_primary())
    }

    /// Components that keep minimal protection alive on their own.
    pub fn is_baseline(name: &str) -> bool {
        matches!(name, URL_REPUTATION | BLOCKLIST | STORAGE)
    }
}

/// Coarse protection level, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtectionLevel {
    Full,
    Degraded,
    Minimal,
    Offline,
}

impl ProtectionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectionLevel::Full => "full",
            ProtectionLevel::Degraded => "degraded",
            ProtectionLevel::Minimal => "minimal",
            ProtectionLevel::Offline => "offline",
        }
    }
}

impl fmt::Display for ProtectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one probe in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub component: String,
    pub healthy: bool,
    pub response_time_ms: u64,
    pub checked_at: SystemTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl HealthCheckResult {
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            healthy: true,
            response_time_ms: 0,
            checked_at: SystemTime::now(),
            error: None,
            details: None,
        }
    }

    pub fn unhealthy(component: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            healthy: false,
            response_time_ms: 0,
            checked_at: SystemTime::now(),
            error: Some(error.into()),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_response_time_ms(mut self, ms: u64) -> Self {
        self.response_time_ms = ms;
        self
    }
}

/// Aggregate of one health cycle. Each cycle produces a fresh snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    /// True when at least one component was probed and all are healthy.
    pub healthy: bool,
    pub protection_level: ProtectionLevel,
    pub components: Vec<HealthCheckResult>,
    pub last_checked_at: SystemTime,
    pub next_check_in: Duration,
}

impl SystemHealth {
    /// Build a snapshot, deriving `healthy` and `protection_level` from `components`.
    pub fn from_results(components: Vec<HealthCheckResult>, next_check_in: Duration) -> Self {
        let healthy = !components.is_empty() && components.iter().all(|c| c.healthy);
        Self {
            healthy,
            protection_level: compute_protection_level(&components),
            components,
            last_checked_at: SystemTime::now(),
            next_check_in,
        }
    }

    pub fn component(&self, name: &str) -> Option<&HealthCheckResult> {
        self.components.iter().find(|c| c.component == name)
    }

    pub fn healthy_components(&self) -> Vec<&str> {
        self.components
            .iter()
            .filter(|c| c.healthy)
            .map(|c| c.component.as_str())
            .collect()
    }

    pub fn unhealthy_components(&self) -> Vec<&str> {
        self.components
            .iter()
            .filter(|c| !c.healthy)
            .map(|c| c.component.as_str())
            .collect()
    }
}

/// Map probe results to a protection level.
///
/// - every probed component healthy → `Full`
/// - fewer than half unhealthy and a primary component (`api`, `local_ml`) healthy → `Degraded`
/// - otherwise any primary or baseline (`url_reputation`, `blocklist`, `storage`) component healthy → `Minimal`
/// - nothing probed, or nothing known healthy → `Offline`
pub fn compute_protection_level(results: &[HealthCheckResult]) -> ProtectionLevel {
    if results.is_empty() {
        return ProtectionLevel::Offline;
    }
    let unhealthy = results.iter().filter(|r| !r.healthy).count();
    if unhealthy == 0 {
        return ProtectionLevel::Full;
    }
    let healthy = |pred: fn(&str) -> bool| {
        results
            .iter()
            .any(|r| r.healthy && pred(r.component.as_str()))
    };
    let primary_alive = healthy(components::is_primary);
    if primary_alive && unhealthy * 2 < results.len() {
        ProtectionLevel::Degraded
    } else if primary_alive || healthy(components::is_baseline) {
        ProtectionLevel::Minimal
    } else {
        ProtectionLevel::Offline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(components: &[(&str, bool)]) -> Vec<HealthCheckResult> {
        components.iter()
            .map(|(name, ok)| {
                if *ok {
                    HealthCheckResult::healthy(*name)
                } else {
                    HealthCheckResult::unhealthy(*name, "down")
                }
            })
            .collect()
    }

    #[test]
    fn test_levels_are_ordered_by_severity() {
        assert!(ProtectionLevel::Full < ProtectionLevel::Degraded);
        assert!(ProtectionLevel::Degraded < ProtectionLevel::Minimal);
        assert!(ProtectionLevel::Minimal < ProtectionLevel::Offline);
        assert_eq!(serde_json::to_string(&ProtectionLevel::Minimal).unwrap(), "\"minimal\"");
    }

    #[test]
    fn test_all_healthy_is_full() {
        let r = results(&[("api", true), ("local_ml", true), ("url_reputation", true), ("storage", true)]);
        assert_eq!(compute_protection_level(&r), ProtectionLevel::Full);
    }

    #[test]
    fn test_primary_alive_is_degraded() {
        let r = results(&[("api", false), ("local_ml", true), ("url_reputation", true), ("storage", true)]);
        assert_eq!(compute_protection_level(&r), ProtectionLevel::Degraded);
        let r = results(&[("api", true), ("local_ml", true), ("url_reputation", false), ("storage", true)]);
        assert_eq!(compute_protection_level(&r), ProtectionLevel::Degraded);
    }

    #[test]
    fn test_majority_down_is_not_degraded() {
        let r = results(&[
            ("api", true),
            ("local_ml", false),
            ("url_reputation", false),
            ("blocklist", false),
            ("storage", false),
        ]);
        let level = compute_protection_level(&r);
        assert_eq!(level, ProtectionLevel::Minimal);
        // exactly half down is not a minority either
        let r = results(&[("api", true), ("local_ml", true), ("blocklist", false), ("storage", false)]);
        assert_eq!(compute_protection_level(&r), ProtectionLevel::Minimal);
        let r = results(&[("api", true), ("local_ml", true), ("blocklist", true), ("storage", false)]);
        assert_eq!(compute_protection_level(&r), ProtectionLevel::Degraded);
    }

    #[test]
    fn test_only_baseline_is_minimal() {
        let r = results(&[("api", false), ("local_ml", false), ("blocklist", true)]);
        assert_eq!(compute_protection_level(&r), ProtectionLevel::Minimal);
    }

    #[test]
    fn test_nothing_healthy_is_offline() {
        let r = results(&[("api", false), ("local_ml", false), ("storage", false)]);
        assert_eq!(compute_protection_level(&r), ProtectionLevel::Offline);
        assert_eq!(compute_protection_level(&[]), ProtectionLevel::Offline);
        // an unknown component alone keeps nothing alive
        let r = results(&[("api", false), ("telemetry", true)]);
        assert_eq!(compute_protection_level(&r), ProtectionLevel::Offline);
    }

    #[test]
    fn test_system_health_from_results() {
        let health = SystemHealth::from_results(
            results(&[("api", true), ("blocklist", false)]),
            Duration::from_secs(30),
        );
        assert!(!health.healthy);
        assert_eq!(health.protection_level, ProtectionLevel::Minimal);
        assert_eq!(health.healthy_components(), vec!["api"]);
        assert_eq!(health.unhealthy_components(), vec!["blocklist"]);
        assert!(health.component("api").is_some());
    }
}
