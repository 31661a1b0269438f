use crate::detection::{DetectionLayer, DetectionResult};
use serde::Serialize;
use std::time::{Duration, SystemTime};

/// Last known condition of one fallback layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerStatus {
    pub layer: DetectionLayer,
    /// False until a handler is registered, or while administratively disabled.
    pub available: bool,
    pub last_checked: Option<SystemTime>,
    pub last_error: Option<String>,
    pub response_time_ms: Option<u64>,
}

impl LayerStatus {
    pub(crate) fn new(layer: DetectionLayer) -> Self {
        Self {
            layer,
            available: false,
            last_checked: None,
            last_error: None,
            response_time_ms: None,
        }
    }

    pub(crate) fn record_success(&mut self, elapsed: Duration) {
        self.available = true;
        self.last_checked = Some(SystemTime::now());
        self.last_error = None;
        self.response_time_ms = Some(elapsed.as_millis() as u64);
    }

    pub(crate) fn record_failure(&mut self, error: String, elapsed: Duration) {
        self.last_checked = Some(SystemTime::now());
        self.last_error = Some(error);
        self.response_time_ms = Some(elapsed.as_millis() as u64);
    }
}

/// Outcome of a successful chain run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackResult {
    pub result: DetectionResult,
    /// The layer whose handler produced `result`.
    pub layer: DetectionLayer,
    /// Layers attempted, in order, including the winner.
    pub tried_layers: Vec<DetectionLayer>,
    pub failed_layers: Vec<DetectionLayer>,
    pub total_time: Duration,
}

impl FallbackResult {
    /// True when the verdict came from a baseline layer or an earlier layer failed.
    pub fn is_degraded(&self) -> bool {
        !self.layer.is_primary() || !self.failed_layers.is_empty()
    }
}
