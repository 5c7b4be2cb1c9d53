//! Qdrant REST vector store

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::RetrievalConfig;
use crate::error::{Error, Result};
use crate::types::RetrievedPassage;

use super::transport_error;
use super::vector_store::VectorStoreProvider;

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Deserialize)]
struct CollectionInfoResponse {
    result: CollectionInfo,
}

#[derive(Deserialize)]
struct CollectionInfo {
    #[serde(default)]
    points_count: Option<usize>,
}

/// Qdrant collection client
pub struct QdrantStore {
    client: Client,
    base_url: String,
    collection: String,
    content_field: String,
}

impl QdrantStore {
    /// Create a client for the configured collection
    pub fn new(config: &RetrievalConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: super::http_client(timeout)?,
            base_url: config.qdrant_url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            content_field: config.content_field.clone(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    /// Split a point payload into passage text and metadata
    fn to_passage(&self, point: ScoredPoint) -> RetrievedPassage {
        let mut metadata = point.payload.unwrap_or_default();
        let content = match metadata.remove(&self.content_field) {
            Some(serde_json::Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        RetrievedPassage {
            content,
            metadata,
            score: point.score,
        }
    }
}

#[async_trait]
impl VectorStoreProvider for QdrantStore {
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<RetrievedPassage>> {
        let url = format!("{}/points/search", self.collection_url());
        let body = SearchRequest {
            vector: query_embedding,
            limit: top_k,
            with_payload: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::retrieval(transport_error("Qdrant unreachable", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(Error::retrieval(format!(
                    "Collection '{}' not found",
                    self.collection
                )));
            }
            status if !status.is_success() => {
                let text = response.text().await.unwrap_or_default();
                // Qdrant reports vector size errors as 400 with a descriptive body
                return Err(Error::retrieval(format!(
                    "Qdrant search failed: HTTP {} - {}",
                    status, text
                )));
            }
            _ => {}
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::retrieval(transport_error("Failed to parse Qdrant response", e)))?;

        Ok(parsed
            .result
            .into_iter()
            .map(|p| self.to_passage(p))
            .filter(|p| !p.content.is_empty())
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        let response = self
            .client
            .get(self.collection_url())
            .send()
            .await
            .map_err(|e| Error::retrieval(transport_error("Qdrant unreachable", e)))?;

        if !response.status().is_success() {
            return Err(Error::retrieval(format!(
                "Collection '{}' unavailable: HTTP {}",
                self.collection,
                response.status()
            )));
        }

        let info: CollectionInfoResponse = response
            .json()
            .await
            .map_err(|e| Error::retrieval(transport_error("Failed to parse collection info", e)))?;
        Ok(info.result.points_count.unwrap_or(0))
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}
