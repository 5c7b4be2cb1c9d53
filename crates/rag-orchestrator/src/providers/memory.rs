//! In-process vector store using cosine similarity

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::types::passage::rank_passages;
use crate::types::RetrievedPassage;

use super::vector_store::VectorStoreProvider;

struct Entry {
    vector: Vec<f32>,
    passage: RetrievedPassage,
}

/// Brute-force cosine similarity store
pub struct MemoryVectorStore {
    dimensions: usize,
    entries: RwLock<Vec<Entry>>,
}

impl MemoryVectorStore {
    /// Create an empty store for vectors of the given dimensionality
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Insert a passage with its embedding
    pub fn insert(&self, vector: Vec<f32>, passage: RetrievedPassage) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        self.entries.write().push(Entry { vector, passage });
        Ok(())
    }
}

/// Cosine similarity, 0.0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStoreProvider for MemoryVectorStore {
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<RetrievedPassage>> {
        if query_embedding.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: query_embedding.len(),
            });
        }

        let mut results: Vec<RetrievedPassage> = self
            .entries
            .read()
            .iter()
            .map(|entry| {
                let mut passage = entry.passage.clone();
                passage.score = cosine_similarity(query_embedding, &entry.vector);
                passage
            })
            .collect();

        rank_passages(&mut results, top_k);
        Ok(results)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().len())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
