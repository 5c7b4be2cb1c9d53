//! Retrieved passage type

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A passage returned by the retrieval capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// Passage text
    pub content: String,
    /// Opaque backend metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Relevance score, higher is more relevant
    pub score: f32,
}

impl RetrievedPassage {
    /// Create a passage without metadata
    pub fn new(content: impl Into<String>, score: f32) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
            score,
        }
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Human-readable source label, taken from common metadata keys
    pub fn source_label(&self) -> Option<&str> {
        ["source", "filename", "title"]
            .iter()
            .find_map(|key| self.metadata.get(*key).and_then(|v| v.as_str()))
    }
}

/// Sort passages by descending score and keep at most `k`.
///
/// NaN scores sort last.
pub fn rank_passages(passages: &mut Vec<RetrievedPassage>, k: usize) {
    passages.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal),
    });
    passages.truncate(k);
}
