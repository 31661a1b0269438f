use crate::detection::DetectionLayer;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "fallback.layer_order", "health.interval_ms")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected range, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "circuit_breaker", "config_loader")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the resilience engine.
///
/// Errors produced by layer handlers and health probes pass through the
/// breaker and retry layers unchanged; only the variants below are synthesized
/// by the engine itself (`CircuitOpen`, `RetryExhausted`, `FallbackExhausted`,
/// `Timeout`).
#[derive(Debug, Error)]
pub enum Error {
    /// The breaker rejected the call without running the operation.
    #[error("circuit breaker '{name}' is open (retry in {remaining_ms} ms)")]
    CircuitOpen { name: String, remaining_ms: u64 },

    #[error("retry attempts exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted {
        attempts: u32,
        last_error: Box<Error>,
    },

    #[error("all detection layers failed (tried: {}){}", format_layers(.tried_layers), format_last_error(.last_error))]
    FallbackExhausted {
        tried_layers: Vec<DetectionLayer>,
        last_error: Option<String>,
    },

    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Handler error: {message}{}", format_context(.context))]
    Handler {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn format_layers(layers: &[DetectionLayer]) -> String {
    if layers.is_empty() {
        return "none".to_string();
    }
    layers
        .iter()
        .map(|l| l.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_last_error(err: &Option<String>) -> String {
    match err {
        Some(e) => format!("; last error: {}", e),
        None => String::new(),
    }
}

impl Error {
    /// Create a handler failure
    pub fn handler(msg: impl Into<String>) -> Self {
        Error::Handler {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Error::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Handler { context, .. }
            | Error::Configuration { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// True for timeout errors, including a timeout that ended a retry sequence.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout { .. } => true,
            Error::RetryExhausted { last_error, .. } => last_error.is_timeout(),
            _ => false,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Error::CircuitOpen { .. })
    }

    /// Default retry classification: configuration problems and engine
    /// rejections are permanent, everything else may be transient.
    pub fn is_retryable_default(&self) -> bool {
        !matches!(
            self,
            Error::Configuration { .. }
                | Error::CircuitOpen { .. }
                | Error::FallbackExhausted { .. }
                | Error::RetryExhausted { .. }
        )
    }
}
