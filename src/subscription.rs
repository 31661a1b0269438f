//! Synchronous, panic-isolated subscriber lists.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::error;

/// Handle returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub(crate) struct Subscribers<T> {
    topic: &'static str,
    next_id: AtomicU64,
    callbacks: RwLock<Vec<(SubscriptionId, Callback<T>)>>,
}

impl<T> Subscribers<T> {
    pub(crate) fn new(topic: &'static str) -> Self {
        Self {
            topic,
            next_id: AtomicU64::new(1),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn add<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .push((id, Arc::new(callback)));
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.write().unwrap_or_else(|p| p.into_inner());
        let before = callbacks.len();
        callbacks.retain(|(sid, _)| *sid != id);
        callbacks.len() < before
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.callbacks.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Call every subscriber in registration order. A panicking subscriber
    /// is logged and skipped.
    pub(crate) fn notify(&self, value: &T) {
        let callbacks: Vec<(SubscriptionId, Callback<T>)> = self
            .callbacks
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        for (id, callback) in callbacks {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(value))) {
                error!(
                    topic = self.topic,
                    subscription = id.0,
                    panic = panic_message(panic.as_ref()),
                    "subscriber panicked"
                );
            }
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
