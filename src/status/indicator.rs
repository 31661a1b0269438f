use super::levels::{descriptor, method_label};
use crate::health::{ProtectionLevel, SystemHealth};
use crate::subscription::{SubscriptionId, Subscribers};
use crate::{Error, ErrorContext, Result};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// User-facing description of the current protection level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtectionLevelInfo {
    pub level: ProtectionLevel,
    pub description: String,
    /// Sorted.
    pub available_methods: Vec<String>,
    /// Sorted.
    pub unavailable_methods: Vec<String>,
    pub recommendations: Vec<String>,
    pub updated_at: SystemTime,
}

impl ProtectionLevelInfo {
    pub fn new(
        level: ProtectionLevel,
        mut available_methods: Vec<String>,
        mut unavailable_methods: Vec<String>,
    ) -> Self {
        available_methods.sort();
        unavailable_methods.sort();
        let desc = descriptor(level);
        Self {
            level,
            description: desc.description.to_string(),
            available_methods,
            unavailable_methods,
            recommendations: desc.recommendations.iter().map(|r| r.to_string()).collect(),
            updated_at: SystemTime::now(),
        }
    }

    pub fn from_health(health: &SystemHealth) -> Self {
        let (available, unavailable): (Vec<_>, Vec<_>) =
            health.components.iter().partition(|c| c.healthy);
        Self::new(
            health.protection_level,
            available.iter().map(|c| method_label(&c.component)).collect(),
            unavailable.iter().map(|c| method_label(&c.component)).collect(),
        )
    }

    fn same_status(&self, other: &ProtectionLevelInfo) -> bool {
        self.level == other.level && self.available_methods == other.available_methods
    }
}

/// Level transition handed to a [`StatusNotifier`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelChange {
    pub previous: ProtectionLevel,
    pub current: ProtectionLevel,
    pub title: String,
    pub message: String,
}

impl LevelChange {
    pub fn is_downgrade(&self) -> bool {
        self.current > self.previous
    }
}

/// Destination for user-facing level-change notifications.
pub trait StatusNotifier: Send + Sync {
    fn notify(&self, change: &LevelChange);
}

/// Default notifier: records the change in the application log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl StatusNotifier for LogNotifier {
    fn notify(&self, change: &LevelChange) {
        if change.is_downgrade() {
            warn!(previous = %change.previous, current = %change.current, "{}", change.message);
        } else {
            info!(previous = %change.previous, current = %change.current, "{}", change.message);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusIndicatorConfig {
    pub history_limit: usize,
    /// Emit a notification when the level (not just the method set) changes.
    pub notify_on_level_change: bool,
}

impl Default for StatusIndicatorConfig {
    fn default() -> Self {
        Self {
            history_limit: 100,
            notify_on_level_change: true,
        }
    }
}

impl StatusIndicatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.history_limit == 0 {
            return Err(Error::configuration_with_context(
                "history limit must be at least 1",
                ErrorContext::new()
                    .with_field_path("history_limit")
                    .with_source("status_indicator"),
            ));
        }
        Ok(())
    }
}

struct State {
    current: ProtectionLevelInfo,
    history: VecDeque<ProtectionLevelInfo>,
}

/// Turns health snapshots into the protection status shown to the user.
pub struct StatusIndicator {
    config: StatusIndicatorConfig,
    state: Mutex<State>,
    subscribers: Subscribers<ProtectionLevelInfo>,
    notifier: Arc<dyn StatusNotifier>,
}

impl StatusIndicator {
    pub fn new(config: StatusIndicatorConfig) -> Self {
        Self::with_notifier(config, Arc::new(LogNotifier))
    }

    pub fn with_notifier(config: StatusIndicatorConfig, notifier: Arc<dyn StatusNotifier>) -> Self {
        Self {
            config,
            state: Mutex::new(State {
                current: ProtectionLevelInfo::new(ProtectionLevel::Full, Vec::new(), Vec::new()),
                history: VecDeque::new(),
            }),
            subscribers: Subscribers::new("protection_status"),
            notifier,
        }
    }

    /// Apply a health snapshot. Returns true when the visible status changed.
    pub fn update_from_health(&self, health: &SystemHealth) -> bool {
        let next = ProtectionLevelInfo::from_health(health);
        let previous_level = {
            let mut st = self.lock();
            if st.current.same_status(&next) {
                debug!(level = %next.level, "protection status unchanged");
                return false;
            }
            let previous = std::mem::replace(&mut st.current, next.clone());
            let previous_level = previous.level;
            st.history.push_back(previous);
            while st.history.len() > self.config.history_limit {
                st.history.pop_front();
            }
            previous_level
        };

        self.subscribers.notify(&next);

        if previous_level != next.level && self.config.notify_on_level_change {
            let desc = descriptor(next.level);
            self.notifier.notify(&LevelChange {
                previous: previous_level,
                current: next.level,
                title: desc.title.to_string(),
                message: desc.description.to_string(),
            });
        }
        true
    }

    pub fn protection_level(&self) -> ProtectionLevelInfo {
        self.lock().current.clone()
    }

    pub fn level(&self) -> ProtectionLevel {
        self.lock().current.level
    }

    /// Previous snapshots, oldest first.
    pub fn history(&self) -> Vec<ProtectionLevelInfo> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn clear_history(&self) {
        self.lock().history.clear();
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ProtectionLevelInfo) + Send + Sync + 'static,
    {
        self.subscribers.add(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    pub fn icon(&self) -> &'static str {
        descriptor(self.level()).icon
    }

    pub fn summary(&self) -> String {
        let current = self.protection_level();
        let title = descriptor(current.level).title;
        let total = current.available_methods.len() + current.unavailable_methods.len();
        if total == 0 {
            title.to_string()
        } else {
            format!(
                "{} ({}/{} methods active)",
                title,
                current.available_methods.len(),
                total
            )
        }
    }

    /// Warning text for anything below full protection.
    pub fn warning_message(&self) -> Option<String> {
        let current = self.protection_level();
        let missing = if current.unavailable_methods.is_empty() {
            String::new()
        } else {
            format!(" Unavailable: {}.", current.unavailable_methods.join(", "))
        };
        match current.level {
            ProtectionLevel::Full => None,
            ProtectionLevel::Degraded => Some(format!(
                "Some protection methods are unavailable.{} Detection accuracy may be reduced.",
                missing
            )),
            ProtectionLevel::Minimal => Some(format!(
                "Only basic protection is active.{} Be careful with sensitive information.",
                missing
            )),
            ProtectionLevel::Offline => Some(
                "Protection is offline. Do not enter sensitive information.".to_string(),
            ),
        }
    }

    pub fn is_adequate_for_sensitive_operations(&self) -> bool {
        matches!(self.level(), ProtectionLevel::Full | ProtectionLevel::Degraded)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for StatusIndicator {
    fn default() -> Self {
        Self::new(StatusIndicatorConfig::default())
    }
}
