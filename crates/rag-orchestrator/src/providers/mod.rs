//! Capability providers for generation and retrieval
//!
//! Trait-based abstractions so the stages never know which concrete backend
//! served a request. Concrete providers are grouped into tiers by
//! [`crate::fallback::FallbackChain`].

pub mod embedding;
pub mod gateway;
pub mod gemini;
pub mod llm;
pub mod memory;
pub mod ollama;
pub mod qdrant;
pub mod retrieval;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use llm::{flatten_messages, ChatMessage, GenerationRequest, GenerationResponse, LlmProvider};
pub use retrieval::{RetrievalProvider, VectorRetriever};
pub use vector_store::VectorStoreProvider;

/// Describe a reqwest failure without its URL.
///
/// Some backends authenticate through the URL, and these messages end up in
/// logs and in trace details returned to clients.
pub(crate) fn transport_error(context: &str, error: reqwest::Error) -> String {
    format!("{}: {}", context, error.without_url())
}

/// Build the shared HTTP client for a backend.
///
/// Created once per provider at startup and reused read-only.
pub(crate) fn http_client(timeout: std::time::Duration) -> crate::error::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(5)
        .build()
        .map_err(|e| crate::error::Error::Config(format!("Failed to create HTTP client: {}", e)))
}
