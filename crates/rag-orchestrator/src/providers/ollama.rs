//! Ollama provider for local generation and embeddings
//!
//! One shared HTTP client serves both capabilities. Calls are never retried
//! here; the fallback chain moves on to the next tier instead.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::OllamaConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::{GenerationRequest, GenerationResponse, LlmProvider};
use super::transport_error;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Ollama API client
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    generate_model: String,
    embed_model: String,
    dimensions: usize,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    pub fn new(config: &OllamaConfig, dimensions: usize, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: super::http_client(timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            generate_model: config.generate_model.clone(),
            embed_model: config.embed_model.clone(),
            dimensions,
        })
    }

    async fn tags_reachable(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.generate_model,
            prompt: &request.prompt,
            system: request.system_prompt.as_deref(),
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        tracing::debug!("Generating with Ollama model: {}", self.generate_model);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::generation(transport_error("Ollama request failed", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::generation(format!(
                "Ollama generation failed: HTTP {} - {}",
                status, text
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| {
                Error::generation(transport_error("Failed to parse Ollama response", e))
            })?;

        if parsed.response.trim().is_empty() {
            return Err(Error::generation("Ollama returned an empty response"));
        }
        Ok(GenerationResponse { text: parsed.response })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.tags_reachable().await)
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.generate_model
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = EmbedRequest {
            model: &self.embed_model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::retrieval(transport_error("Embedding request failed", e)))?;

        if !response.status().is_success() {
            return Err(Error::retrieval(format!(
                "Embedding failed: HTTP {}",
                response.status()
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| {
                Error::retrieval(transport_error("Failed to parse embedding response", e))
            })?;

        Ok(parsed.embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.tags_reachable().await)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
