use super::types::{components, HealthCheckResult, SystemHealth};
use crate::resilience::timeout::with_timeout;
use crate::subscription::{panic_message, SubscriptionId, Subscribers};
use crate::{Error, ErrorContext, Result};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckConfig {
    pub interval: Duration,
    /// Deadline for each individual probe.
    pub timeout: Duration,
    /// Components the application expects to probe.
    pub components: Vec<String>,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5),
            components: components::ALL.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl HealthCheckConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.components = components.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        let ctx = |field: &str| {
            ErrorContext::new()
                .with_field_path(field)
                .with_source("health_checker")
        };
        if self.interval.is_zero() {
            return Err(Error::configuration_with_context(
                "check interval must be greater than zero",
                ctx("interval"),
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::configuration_with_context(
                "check timeout must be greater than zero",
                ctx("timeout"),
            ));
        }
        Ok(())
    }
}

/// Health probe for one component.
///
/// The checker overwrites `component` and `response_time_ms` on the
/// returned result; an error marks the component unhealthy.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<HealthCheckResult>;
}

pub struct FnProbe<F> {
    func: F,
}

impl<F, Fut> FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<HealthCheckResult>> + Send,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> HealthProbe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<HealthCheckResult>> + Send,
{
    async fn check(&self) -> Result<HealthCheckResult> {
        (self.func)().await
    }
}

/// Periodic and on-demand health monitor.
///
/// Probes run concurrently, each under `timeout`. Cycles are serialized: a
/// snapshot reaches every subscriber before the next cycle starts.
pub struct HealthChecker {
    config: HealthCheckConfig,
    probes: RwLock<Vec<(String, Arc<dyn HealthProbe>)>>,
    last: ArcSwapOption<SystemHealth>,
    subscribers: Subscribers<SystemHealth>,
    cycle: tokio::sync::Mutex<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthChecker {
    pub fn new(config: HealthCheckConfig) -> Self {
        Self {
            config,
            probes: RwLock::new(Vec::new()),
            last: ArcSwapOption::empty(),
            subscribers: Subscribers::new("system_health"),
            cycle: tokio::sync::Mutex::new(()),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    /// Register (or replace) the probe for `component`.
    pub fn register_probe(&self, component: impl Into<String>, probe: Arc<dyn HealthProbe>) {
        let component = component.into();
        if !self.config.components.iter().any(|c| *c == component) {
            debug!(component = component.as_str(), "registering probe for unlisted component");
        }
        let mut probes = self.probes.write().unwrap_or_else(|p| p.into_inner());
        match probes.iter_mut().find(|(name, _)| *name == component) {
            Some(slot) => slot.1 = probe,
            None => probes.push((component, probe)),
        }
    }

    pub fn register_fn<F, Fut>(&self, component: impl Into<String>, func: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HealthCheckResult>> + Send + 'static,
    {
        self.register_probe(component, Arc::new(FnProbe::new(func)));
    }

    pub fn unregister_probe(&self, component: &str) -> bool {
        let mut probes = self.probes.write().unwrap_or_else(|p| p.into_inner());
        let before = probes.len();
        probes.retain(|(name, _)| name != component);
        probes.len() < before
    }

    pub fn probe_names(&self) -> Vec<String> {
        self.probes
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SystemHealth) + Send + Sync + 'static,
    {
        self.subscribers.add(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    pub fn last_result(&self) -> Option<Arc<SystemHealth>> {
        self.last.load_full()
    }

    /// Run one cycle now, outside the periodic schedule.
    pub async fn check_now(&self) -> Arc<SystemHealth> {
        let _cycle = self.cycle.lock().await;

        let probes: Vec<(String, Arc<dyn HealthProbe>)> = self
            .probes
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        let timeout = self.config.timeout;
        let results = join_all(
            probes
                .iter()
                .map(|(name, probe)| run_probe(name, probe.as_ref(), timeout)),
        )
        .await;

        let health = Arc::new(SystemHealth::from_results(results, self.config.interval));
        let previous = self.last.swap(Some(health.clone()));

        let previous_level = previous.as_ref().map(|p| p.protection_level);
        if previous_level != Some(health.protection_level) {
            info!(
                level = %health.protection_level,
                previous = ?previous_level,
                unhealthy = ?health.unhealthy_components(),
                "protection level changed"
            );
        } else {
            debug!(
                level = %health.protection_level,
                components = health.components.len(),
                "health check completed"
            );
        }

        self.subscribers.notify(&health);
        health
    }

    /// Start periodic checks; the first cycle runs immediately.
    ///
    /// Calling `start` on a running checker is a no-op.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            Error::runtime_with_context(
                "health checker requires a tokio runtime",
                ErrorContext::new().with_source("health_checker"),
            )
        })?;
        let mut task = self.task.lock().unwrap_or_else(|p| p.into_inner());
        if task.as_ref().map_or(false, |t| !t.is_finished()) {
            return Ok(());
        }

        let weak = Arc::downgrade(self);
        let interval = self.config.interval;
        *task = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(checker) = weak.upgrade() else {
                    break;
                };
                checker.check_now().await;
            }
        }));
        info!(interval_ms = interval.as_millis() as u64, "health checker started");
        Ok(())
    }

    pub fn stop(&self) {
        if let Some(task) = self.task.lock().unwrap_or_else(|p| p.into_inner()).take() {
            task.abort();
            info!("health checker stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .map_or(false, |t| !t.is_finished())
    }
}

async fn run_probe(name: &str, probe: &dyn HealthProbe, timeout: Duration) -> HealthCheckResult {
    let started = Instant::now();
    let operation = format!("health check '{}'", name);
    let outcome = AssertUnwindSafe(with_timeout(timeout, &operation, probe.check()))
        .catch_unwind()
        .await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(mut result)) => {
            result.component = name.to_string();
            result.response_time_ms = elapsed_ms;
            result
        }
        Ok(Err(err)) => {
            warn!(component = name, error = %err, "health probe failed");
            HealthCheckResult::unhealthy(name, err.to_string()).with_response_time_ms(elapsed_ms)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref()).to_string();
            warn!(component = name, panic = message.as_str(), "health probe panicked");
            HealthCheckResult::unhealthy(name, format!("probe panicked: {}", message))
                .with_response_time_ms(elapsed_ms)
        }
    }
}

impl Drop for HealthChecker {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().unwrap_or_else(|p| p.into_inner()).take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::types::ProtectionLevel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> HealthCheckConfig {
        HealthCheckConfig::default()
            .with_interval(Duration::from_secs(10))
            .with_timeout(Duration::from_millis(100))
    }

    #[test]
    fn test_config_validation() {
        assert!(HealthCheckConfig::default().validate().is_ok());
        assert!(config().with_interval(Duration::ZERO).validate().is_err());
        assert!(config().with_timeout(Duration::ZERO).validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_now_with_no_probes_is_offline() {
        let checker = HealthChecker::new(config());
        let health = checker.check_now().await;
        assert!(health.components.is_empty());
        assert!(!health.healthy);
        assert_eq!(health.protection_level, ProtectionLevel::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_results_are_normalized() {
        let checker = HealthChecker::new(config());
        checker.register_fn("api", || async {
            Ok(HealthCheckResult::healthy("whatever").with_details(serde_json::json!({"region": "eu"})))
        });
        checker.register_fn("blocklist", || async { Err(Error::handler("stale list")) });

        let health = checker.check_now().await;
        assert_eq!(health.components.len(), 2);
        let api = health.component("api").unwrap();
        assert!(api.healthy);
        assert_eq!(api.details.as_ref().unwrap()["region"], "eu");
        let blocklist = health.component("blocklist").unwrap();
        assert!(!blocklist.healthy);
        assert!(blocklist.error.as_ref().unwrap().contains("stale list"));
        // one of two down is not a minority
        assert_eq!(health.protection_level, ProtectionLevel::Minimal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_probe_times_out() {
        let checker = HealthChecker::new(config());
        checker.register_fn("local_ml", || futures::future::pending::<Result<HealthCheckResult>>());

        let health = checker.check_now().await;
        let ml = health.component("local_ml").unwrap();
        assert!(!ml.healthy);
        assert!(ml.error.as_ref().unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_probe_is_unhealthy() {
        let checker = HealthChecker::new(config());
        checker.register_fn("storage", || async {
            if true {
                panic!("disk gone");
            }
            Ok(HealthCheckResult::healthy("storage"))
        });
        let health = checker.check_now().await;
        let storage = health.component("storage").unwrap();
        assert!(!storage.healthy);
        assert!(storage.error.as_ref().unwrap().contains("disk gone"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_replaces_and_unregister_removes() {
        let checker = HealthChecker::new(config());
        checker.register_fn("api", || async { Err(Error::handler("down")) });
        checker.register_fn("api", || async { Ok(HealthCheckResult::healthy("api")) });
        assert_eq!(checker.probe_names(), vec!["api".to_string()]);
        assert!(checker.check_now().await.healthy);

        assert!(checker.unregister_probe("api"));
        assert!(!checker.unregister_probe("api"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_cycles_notify_subscribers() {
        let checker = Arc::new(HealthChecker::new(config()));
        checker.register_fn("api", || async { Ok(HealthCheckResult::healthy("api")) });
        let cycles = Arc::new(AtomicUsize::new(0));
        let c = cycles.clone();
        checker.subscribe(move |health| {
            assert!(health.healthy);
            c.fetch_add(1, Ordering::SeqCst);
        });

        checker.start().unwrap();
        assert!(checker.is_running());
        // immediate first tick, then one every 10s
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(cycles.load(Ordering::SeqCst), 3);

        checker.stop();
        assert!(!checker.is_running());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(cycles.load(Ordering::SeqCst), 3);
        assert!(checker.last_result().unwrap().healthy);
    }
}
