//! Vendora error types

use std::time::Duration;

/// Connectivity-level failure reaching an upstream.
///
/// These are the only failures that count against a circuit breaker and the
/// only ones the retry policy re-attempts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport failure: {0}")]
    Other(String),
}

/// Vendora error types
#[derive(Debug, thiserror::Error)]
pub enum VendoraError {
    // Upstream errors
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Upstream was reachable and answered with a well-formed failure.
    #[error("upstream reported failure: {0}")]
    Business(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("data error: {0}")]
    DataError(String),

    /// Breaker is open for this key; no network call was attempted.
    #[error("circuit open for {service} (key {key})")]
    CircuitOpen { service: String, key: String },

    // Agent errors
    /// The agent for a tenant could not be built. Distinct from a failed turn:
    /// it means the tenant is misconfigured, not that the service is degraded.
    #[error("agent build failed for tenant {tenant}: {reason}")]
    Build { tenant: u64, reason: String },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl VendoraError {
    /// Whether this error is worth retrying and counts as a breaker failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, VendoraError::Transport(_))
    }

    /// Stable classification used in metrics labels and chat replies.
    pub fn kind(&self) -> &'static str {
        match self {
            VendoraError::Transport(_) => "transport",
            VendoraError::Business(_) => "business",
            VendoraError::Api { .. } => "api",
            VendoraError::DataError(_) => "data",
            VendoraError::CircuitOpen { .. } => "circuit_open",
            VendoraError::Build { .. } => "build",
            VendoraError::Llm(_) => "llm",
            VendoraError::Timeout(_) => "timeout",
            VendoraError::Json(_) => "json",
            VendoraError::InvalidInput(_) => "invalid_input",
            VendoraError::Configuration(_) => "configuration",
            VendoraError::Internal(_) => "internal",
        }
    }
}

impl From<reqwest::Error> for VendoraError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout.into()
        } else if err.is_connect() {
            TransportError::Connect(err.to_string()).into()
        } else if err.is_decode() {
            VendoraError::DataError(err.to_string())
        } else if let Some(status) = err.status() {
            VendoraError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            // request/body errors: the exchange never completed
            TransportError::Other(err.to_string()).into()
        }
    }
}

impl From<llm::error::LLMError> for VendoraError {
    fn from(err: llm::error::LLMError) -> Self {
        VendoraError::Llm(err.to_string())
    }
}

/// Result type alias for Vendora operations
pub type Result<T> = std::result::Result<T, VendoraError>;
