//! Named circuit breaker registry.

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Name → breaker cache, one breaker per logical dependency.
///
/// Lookups with the same name return the same instance, so failure history
/// accumulates per dependency rather than per call site. Owned by the
/// application's composition root; there is no global instance.
pub struct CircuitBreakerRegistry {
    default_config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::with_default_config(CircuitBreakerConfig::default())
    }

    pub fn with_default_config(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_config(&self) -> &CircuitBreakerConfig {
        &self.default_config
    }

    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_or_create_with(name, self.default_config.clone())
    }

    /// `config` only applies when the breaker does not exist yet.
    pub fn get_or_create_with(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.get(name) {
            return existing;
        }
        let mut breakers = self.breakers.write().unwrap_or_else(|p| p.into_inner());
        breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(config.with_name(name))))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(name)
            .cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .breakers
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn all_stats(&self) -> Vec<(String, CircuitBreakerStats)> {
        let breakers: Vec<(String, Arc<CircuitBreaker>)> = {
            let guard = self.breakers.read().unwrap_or_else(|p| p.into_inner());
            guard.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        let mut stats: Vec<_> = breakers
            .into_iter()
            .map(|(name, cb)| (name, cb.stats()))
            .collect();
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        stats
    }

    pub fn reset_all(&self) {
        let breakers: Vec<Arc<CircuitBreaker>> = self
            .breakers
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .cloned()
            .collect();
        for cb in breakers {
            cb.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.breakers.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
