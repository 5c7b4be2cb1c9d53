//! Provider wiring
//!
//! Builds the generation and retrieval fallback chains once at startup from
//! configuration, credentials and the deployment environment. Chains are
//! read-only afterwards and shared by every request.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Deployment, OrchestratorConfig, RetrievalBackend};
use crate::error::{Capability, Result};
use crate::fallback::FallbackChain;
use crate::providers::{
    gateway::GatewayClient, gemini::GeminiClient, memory::MemoryVectorStore,
    ollama::OllamaProvider, qdrant::QdrantStore, EmbeddingProvider, LlmProvider,
    RetrievalProvider, VectorRetriever, VectorStoreProvider,
};

/// Capability chains shared by all stages
#[derive(Clone)]
pub struct Capabilities {
    pub generation: Arc<FallbackChain<dyn LlmProvider>>,
    pub retrieval: Arc<FallbackChain<dyn RetrievalProvider>>,
    /// Gateway client behind the OpenAI-compatible proxy routes, when configured
    pub chat: Option<Arc<dyn LlmProvider>>,
}

impl Capabilities {
    pub fn new(
        generation: Arc<FallbackChain<dyn LlmProvider>>,
        retrieval: Arc<FallbackChain<dyn RetrievalProvider>>,
    ) -> Self {
        Self {
            generation,
            retrieval,
            chat: None,
        }
    }

    /// Serve the chat-completions proxy through `provider`
    pub fn with_chat(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.chat = Some(provider);
        self
    }

    /// Register every provider the configuration and environment allow.
    ///
    /// Generation tiers, in order:
    /// 1. primary: multi-model gateway, when an API key is present
    /// 2. secondary: Gemini, when an API key is present
    /// 3. local: Ollama, when enabled and not on a hosted platform
    ///
    /// An empty generation chain is allowed; every answer then degrades.
    pub fn from_config(config: &OrchestratorConfig, deployment: &Deployment) -> Result<Self> {
        let gen_timeout = Duration::from_secs(config.generation.provider_timeout_secs);
        let mut generation: FallbackChain<dyn LlmProvider> =
            FallbackChain::new(Capability::Generation, gen_timeout);
        let mut chat = None;

        if let Some(key) = config.gateway.api_key.clone() {
            let client = GatewayClient::new(&config.gateway, key, gen_timeout)?;
            tracing::info!("Registered gateway tier (model: {})", client.model());
            let client: Arc<dyn LlmProvider> = Arc::new(client);
            generation.push_tier("primary", Arc::clone(&client));
            chat = Some(client);
        } else {
            tracing::info!("Gateway API key not set; skipping primary tier");
        }

        if let Some(key) = config.gemini.api_key.clone() {
            let client = GeminiClient::new(&config.gemini, key, gen_timeout)?;
            tracing::info!("Registered Gemini tier (model: {})", client.model());
            generation.push_tier("secondary", Arc::new(client) as Arc<dyn LlmProvider>);
        } else {
            tracing::info!("Gemini API key not set; skipping secondary tier");
        }

        if !config.ollama.enabled {
            tracing::info!("Ollama disabled; skipping local tier");
        } else if !deployment.allows_local_models() {
            tracing::info!("Running on {}; skipping local Ollama tier", deployment);
        } else {
            let ollama = OllamaProvider::new(
                &config.ollama,
                config.retrieval.embedding_dimensions,
                gen_timeout,
            )?;
            tracing::info!("Registered Ollama tier (model: {})", config.ollama.generate_model);
            generation.push_tier("local", Arc::new(ollama) as Arc<dyn LlmProvider>);
        }

        if generation.is_empty() {
            tracing::warn!("No generation providers configured; answers will be degraded");
        }

        let retrieval = Self::retrieval_chain(config)?;

        Ok(Self {
            generation: Arc::new(generation),
            retrieval: Arc::new(retrieval),
            chat,
        })
    }

    fn retrieval_chain(
        config: &OrchestratorConfig,
    ) -> Result<FallbackChain<dyn RetrievalProvider>> {
        let timeout = Duration::from_secs(config.retrieval.provider_timeout_secs);
        let dimensions = config.retrieval.embedding_dimensions;

        let embedder: Arc<dyn EmbeddingProvider> =
            Arc::new(OllamaProvider::new(&config.ollama, dimensions, timeout)?);

        let store: Arc<dyn VectorStoreProvider> = match config.retrieval.backend {
            RetrievalBackend::Qdrant => {
                tracing::info!(
                    "Using Qdrant collection '{}' at {}",
                    config.retrieval.collection,
                    config.retrieval.qdrant_url
                );
                Arc::new(QdrantStore::new(&config.retrieval, timeout)?)
            }
            RetrievalBackend::Memory => {
                tracing::info!("Using in-memory vector store ({} dimensions)", dimensions);
                Arc::new(MemoryVectorStore::new(dimensions))
            }
        };

        let retriever = VectorRetriever::new(embedder, store, dimensions);
        Ok(FallbackChain::new(Capability::Retrieval, timeout)
            .with_tier("primary", Arc::new(retriever) as Arc<dyn RetrievalProvider>))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_follow_credentials() {
        let mut config = OrchestratorConfig::default();
        config.gemini.api_key = Some("gem-key".to_string());

        let caps = Capabilities::from_config(&config, &Deployment::Local).unwrap();
        assert_eq!(
            caps.generation.describe(),
            vec!["secondary (gemini)".to_string(), "local (ollama)".to_string()]
        );
        assert_eq!(caps.retrieval.describe(), vec!["primary (ollama+qdrant)".to_string()]);
    }

    #[test]
    fn test_hosted_deployment_skips_local_tier() {
        let mut config = OrchestratorConfig::default();
        config.gateway.api_key = Some("key".to_string());
        config.retrieval.backend = RetrievalBackend::Memory;

        let hosted = Deployment::Hosted {
            platform: "render".to_string(),
        };
        let caps = Capabilities::from_config(&config, &hosted).unwrap();
        assert_eq!(caps.generation.describe(), vec!["primary (1minai-gateway)".to_string()]);
        assert_eq!(caps.retrieval.describe(), vec!["primary (ollama+memory)".to_string()]);
        assert_eq!(caps.chat.as_ref().map(|c| c.name()), Some("1minai-gateway"));
    }

    #[test]
    fn test_no_credentials_and_no_local_is_empty_chain() {
        let mut config = OrchestratorConfig::default();
        config.ollama.enabled = false;

        let caps = Capabilities::from_config(&config, &Deployment::Local).unwrap();
        assert!(caps.generation.is_empty());
        assert!(caps.chat.is_none());
    }
}
