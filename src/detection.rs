//! 检测层类型：检测层标识、输入输出以及处理器接口。
//!
//! Detection layer types shared by the fallback chain and the health monitor.
//!
//! The engine never inspects detection payloads; handlers are opaque async
//! operations injected per layer.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;

/// A detection method, in order of preference.
///
/// Declaration order matters: `Ord` follows it, and [`DetectionLayer::ALL`]
/// is the default fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionLayer {
    Api,
    LocalMl,
    UrlReputation,
    Blocklist,
}

impl DetectionLayer {
    pub const ALL: [DetectionLayer; 4] = [
        DetectionLayer::Api,
        DetectionLayer::LocalMl,
        DetectionLayer::UrlReputation,
        DetectionLayer::Blocklist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionLayer::Api => "api",
            DetectionLayer::LocalMl => "local_ml",
            DetectionLayer::UrlReputation => "url_reputation",
            DetectionLayer::Blocklist => "blocklist",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.as_str() == name)
    }

    /// Primary layers carry full content analysis; the rest are baseline.
    pub fn is_primary(&self) -> bool {
        matches!(self, DetectionLayer::Api | DetectionLayer::LocalMl)
    }
}

impl fmt::Display for DetectionLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input handed to every layer handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionInput {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom: Option<String>,
}

impl DetectionInput {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: None,
            dom: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_dom(mut self, dom: impl Into<String>) -> Self {
        self.dom = Some(dom.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

/// Verdict produced by a layer handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub risk_level: RiskLevel,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    #[serde(default)]
    pub signals: Vec<String>,
    #[serde(default)]
    pub processing_time_ms: u64,
}

impl DetectionResult {
    pub fn new(risk_level: RiskLevel, confidence: f64) -> Self {
        Self {
            risk_level,
            confidence: confidence.clamp(0.0, 1.0),
            signals: Vec::new(),
            processing_time_ms: 0,
        }
    }

    pub fn with_signal(mut self, signal: impl Into<String>) -> Self {
        self.signals.push(signal.into());
        self
    }

    pub fn with_processing_time_ms(mut self, ms: u64) -> Self {
        self.processing_time_ms = ms;
        self
    }
}

/// A detection method behind one fallback layer.
#[async_trait]
pub trait LayerHandler: Send + Sync {
    async fn detect(&self, input: &DetectionInput) -> Result<DetectionResult>;
}

/// Adapts an async closure into a [`LayerHandler`].
///
/// The closure receives an owned copy of the input.
pub struct FnHandler<F> {
    func: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(DetectionInput) -> Fut + Send + Sync,
    Fut: Future<Output = Result<DetectionResult>> + Send,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> LayerHandler for FnHandler<F>
where
    F: Fn(DetectionInput) -> Fut + Send + Sync,
    Fut: Future<Output = Result<DetectionResult>> + Send,
{
    async fn detect(&self, input: &DetectionInput) -> Result<DetectionResult> {
        (self.func)(input.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_order_and_names() {
        let mut layers = vec![
            DetectionLayer::Blocklist,
            DetectionLayer::Api,
            DetectionLayer::UrlReputation,
            DetectionLayer::LocalMl,
        ];
        layers.sort();
        assert_eq!(layers, DetectionLayer::ALL.to_vec());
        assert_eq!(DetectionLayer::parse("local_ml"), Some(DetectionLayer::LocalMl));
        assert_eq!(DetectionLayer::parse("cloud"), None);
        assert_eq!(
            serde_json::to_string(&DetectionLayer::UrlReputation).unwrap(),
            "\"url_reputation\""
        );
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(DetectionResult::new(RiskLevel::High, 1.7).confidence, 1.0);
        assert_eq!(DetectionResult::new(RiskLevel::Safe, -0.2).confidence, 0.0);
    }

    #[tokio::test]
    async fn test_fn_handler_receives_input() {
        let handler = FnHandler::new(|input: DetectionInput| async move {
            Ok(DetectionResult::new(RiskLevel::Low, 0.4).with_signal(input.url))
        });
        let result = handler
            .detect(&DetectionInput::new("https://example.test"))
            .await
            .unwrap();
        assert_eq!(result.signals, vec!["https://example.test".to_string()]);
    }
}
