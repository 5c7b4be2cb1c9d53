//! Vector store provider trait for similarity search

use async_trait::async_trait;
use crate::error::Result;
use crate::types::RetrievedPassage;

/// Trait for vector similarity search
///
/// Implementations:
/// - `QdrantStore`: Qdrant REST API
/// - `MemoryVectorStore`: in-process cosine similarity
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Search for the `top_k` passages most similar to the embedding
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedPassage>>;

    /// Get total number of vectors stored; fails when the index is unreachable
    async fn len(&self) -> Result<usize>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
