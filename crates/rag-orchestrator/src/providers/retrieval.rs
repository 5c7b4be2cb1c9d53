//! Retrieval capability: query text in, ranked passages out

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::passage::rank_passages;
use crate::types::RetrievedPassage;

use super::embedding::EmbeddingProvider;
use super::vector_store::VectorStoreProvider;

/// Trait for top-k passage retrieval
///
/// Implementations return at most `k` passages ordered by descending score and
/// normalize backend failures into `Error::RetrievalFailed`.
#[async_trait]
pub trait RetrievalProvider: Send + Sync {
    /// Retrieve passages for a query
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Retrieval over an embedding provider and a vector store
pub struct VectorRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
    expected_dimensions: usize,
    name: String,
}

impl VectorRetriever {
    /// Create a retriever; `expected_dimensions` is the index configuration
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
        expected_dimensions: usize,
    ) -> Self {
        let name = format!("{}+{}", embedder.name(), store.name());
        Self {
            embedder,
            store,
            expected_dimensions,
            name,
        }
    }
}

#[async_trait]
impl RetrievalProvider for VectorRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>> {
        let embedding = self.embedder.embed(query).await.map_err(|e| match e {
            Error::RetrievalFailed(_) | Error::DimensionMismatch { .. } => e,
            other => Error::retrieval(format!("Query embedding failed: {}", other)),
        })?;

        if embedding.len() != self.expected_dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.expected_dimensions,
                actual: embedding.len(),
            });
        }

        let mut passages = self.store.search(&embedding, k).await.map_err(|e| match e {
            Error::RetrievalFailed(_) => e,
            other => Error::retrieval(format!("Vector search failed: {}", other)),
        })?;

        rank_passages(&mut passages, k);
        tracing::debug!("{} returned {} passages", self.name, passages.len());
        Ok(passages)
    }

    /// Healthy when the embedder is configured for the index dimensionality,
    /// answers its own health check, and the store can be reached
    async fn health_check(&self) -> Result<bool> {
        if self.embedder.dimensions() != self.expected_dimensions {
            tracing::warn!(
                "{} produces {}-dimensional embeddings but the index expects {}",
                self.embedder.name(),
                self.embedder.dimensions(),
                self.expected_dimensions
            );
            return Ok(false);
        }
        if !self.embedder.health_check().await? {
            return Ok(false);
        }

        let indexed = self.store.len().await?;
        if indexed == 0 {
            tracing::warn!("{} index is empty; answers will have no sources", self.store.name());
        }
        Ok(true)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::memory::MemoryVectorStore;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.0.clone())
        }

        fn dimensions(&self) -> usize {
            self.0.len()
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn store() -> Arc<MemoryVectorStore> {
        let store = MemoryVectorStore::new(2);
        store.insert(vec![1.0, 0.0], RetrievedPassage::new("east", 0.0)).unwrap();
        store.insert(vec![0.0, 1.0], RetrievedPassage::new("north", 0.0)).unwrap();
        store.insert(vec![0.7, 0.7], RetrievedPassage::new("north-east", 0.0)).unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_retrieves_ranked_passages() {
        let retriever = VectorRetriever::new(Arc::new(FixedEmbedder(vec![1.0, 0.1])), store(), 2);

        let passages = retriever.retrieve("which way", 2).await.unwrap();
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].content, "east");
        assert!(passages[0].score >= passages[1].score);
        assert_eq!(retriever.name(), "fixed+memory");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_hard_error() {
        let retriever =
            VectorRetriever::new(Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])), store(), 2);

        let err = retriever.retrieve("which way", 2).await.unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_health_requires_matching_dimensions() {
        let healthy = VectorRetriever::new(Arc::new(FixedEmbedder(vec![1.0, 0.0])), store(), 2);
        assert!(healthy.health_check().await.unwrap());

        let misconfigured =
            VectorRetriever::new(Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])), store(), 2);
        assert!(!misconfigured.health_check().await.unwrap());
    }
}
