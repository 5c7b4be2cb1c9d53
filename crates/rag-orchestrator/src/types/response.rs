//! Response types for orchestrated queries

use serde::{Deserialize, Serialize};

use super::passage::RetrievedPassage;
use super::trace::TraceEvent;

/// Terminal value of one orchestrator invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// Final answer text
    pub answer: String,
    /// Ordered audit trail
    pub thinking_steps: Vec<TraceEvent>,
    /// Pipeline identifier, possibly a selection chain like "META → Phase 3: Self-Refinement"
    pub pipeline_info: String,
    /// Passages used to produce the answer
    pub sources: Vec<RetrievedPassage>,
}

impl PipelineResult {
    pub fn new(
        answer: String,
        thinking_steps: Vec<TraceEvent>,
        pipeline_info: String,
        sources: Vec<RetrievedPassage>,
    ) -> Self {
        Self {
            answer,
            thinking_steps,
            pipeline_info,
            sources,
        }
    }
}
