//! Query types

use serde::{Deserialize, Serialize};

/// An analyzed query. Built once by the query stage and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    raw: String,
    normalized: String,
    needs_retrieval: bool,
}

impl Query {
    pub(crate) fn new(raw: String, normalized: String, needs_retrieval: bool) -> Self {
        Self {
            raw,
            normalized,
            needs_retrieval,
        }
    }

    /// Input exactly as received
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Trimmed, whitespace-collapsed text
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Whether external retrieval should run for this query
    pub fn needs_retrieval(&self) -> bool {
        self.needs_retrieval
    }
}

/// Invocation request: `{ query, mode }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The natural-language query
    pub query: String,

    /// Fixed pipeline name, "auto" or "meta" (default: "auto")
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_mode() -> String {
    "auto".to_string()
}

impl QueryRequest {
    /// Create a request with automatic pipeline selection
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mode: default_mode(),
        }
    }

    /// Set the requested mode
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }
}
