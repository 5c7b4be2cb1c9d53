//! Error types for the orchestration engine

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Capability served by a fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Text generation from a prompt
    Generation,
    /// Top-k passage retrieval for a query
    Retrieval,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Generation => write!(f, "generation"),
            Capability::Retrieval => write!(f, "retrieval"),
        }
    }
}

/// One failed attempt inside a fallback chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierFailure {
    /// Tier label, e.g. "primary"
    pub tier: String,
    /// Provider name, e.g. "1minai-gateway"
    pub provider: String,
    /// Normalized failure message
    pub message: String,
}

impl fmt::Display for TierFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.tier, self.provider, self.message)
    }
}

fn tier_names(failures: &[TierFailure]) -> String {
    if failures.is_empty() {
        return "no tiers configured".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{} ({})", f.tier, f.provider))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Orchestration errors
#[derive(Debug, Error)]
pub enum Error {
    /// Bad request, surfaced to the caller immediately
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A generation backend failed (connection, status or payload)
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// A retrieval backend failed (unreachable, missing collection, bad payload)
    #[error("Retrieval failed: {0}")]
    RetrievalFailed(String),

    /// Every retrieval tier failed; pipelines proceed without passages
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Every tier of a fallback chain failed
    #[error("{capability} unavailable, tried: {}", tier_names(.failures))]
    CapabilityUnavailable {
        capability: Capability,
        failures: Vec<TierFailure>,
    },

    /// Embedding dimensionality differs from the index configuration
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A provider call exceeded its timeout
    #[error("Provider '{provider}' timed out after {after:?}")]
    Timeout { provider: String, after: Duration },

    /// The caller aborted the request
    #[error("Request cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        // Request URLs may carry credentials
        Error::Http(error.without_url())
    }
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::GenerationFailed(message.into())
    }

    /// Create a retrieval error
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::RetrievalFailed(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Errors that must stop a fallback chain instead of moving to the next tier.
    ///
    /// Mixing embedding dimensionalities corrupts the index, and configuration
    /// errors will fail identically on every tier.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::DimensionMismatch { .. } | Error::Config(_) | Error::Cancelled
        )
    }

    /// Tier failures carried by this error, if any
    pub fn tier_failures(&self) -> &[TierFailure] {
        match self {
            Error::CapabilityUnavailable { failures, .. } => failures,
            _ => &[],
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            Error::GenerationFailed(_) => (StatusCode::BAD_GATEWAY, "generation_failed"),
            Error::RetrievalFailed(_) => (StatusCode::BAD_GATEWAY, "retrieval_failed"),
            Error::RetrievalUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "retrieval_unavailable")
            }
            Error::CapabilityUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "capability_unavailable")
            }
            Error::DimensionMismatch { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "dimension_mismatch")
            }
            Error::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::Cancelled => (StatusCode::REQUEST_TIMEOUT, "cancelled"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Toml(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_unavailable_names_every_tier() {
        let err = Error::CapabilityUnavailable {
            capability: Capability::Generation,
            failures: vec![
                TierFailure {
                    tier: "primary".to_string(),
                    provider: "1minai-gateway".to_string(),
                    message: "connection refused".to_string(),
                },
                TierFailure {
                    tier: "secondary".to_string(),
                    provider: "gemini".to_string(),
                    message: "HTTP 500".to_string(),
                },
            ],
        };

        let text = err.to_string();
        assert!(text.starts_with("generation unavailable"));
        assert!(text.contains("primary (1minai-gateway)"));
        assert!(text.contains("secondary (gemini)"));
        assert_eq!(err.tier_failures().len(), 2);
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::DimensionMismatch { expected: 768, actual: 384 }.is_fatal());
        assert!(Error::Config("bad".into()).is_fatal());
        assert!(!Error::generation("HTTP 502").is_fatal());
        assert!(!Error::retrieval("unreachable").is_fatal());
    }
}
