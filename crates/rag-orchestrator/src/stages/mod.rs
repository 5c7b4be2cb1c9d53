//! Single-purpose processing stages
//!
//! Each stage takes typed input, returns typed output and records exactly one
//! span (a `processing` event followed by one terminal event) in the request
//! trace. Stages hold no per-request state, so one [`Stages`] bundle serves
//! every request.

pub mod answer;
pub mod critique;
pub mod query;
pub mod refine;
pub mod retrieval;

pub use answer::{AnswerStage, DEGRADED_ANSWER};
pub use critique::CritiqueStage;
pub use query::QueryStage;
pub use refine::{RefineStage, Refinement};
pub use retrieval::RetrievalStage;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::OrchestratorConfig;
use crate::context::Capabilities;
use crate::types::Trace;

/// Per-request state threaded through the stages
#[derive(Debug)]
pub struct StageContext {
    /// Thinking-step trace for this request
    pub trace: Trace,
    cancel: CancellationToken,
}

impl StageContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            trace: Trace::new(),
            cancel,
        }
    }

    /// Token that aborts in-flight provider calls
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn into_trace(self) -> Trace {
        self.trace
    }
}

/// All stages wired to the configured capabilities
pub struct Stages {
    pub query: QueryStage,
    pub retrieval: RetrievalStage,
    pub answer: AnswerStage,
    pub critique: CritiqueStage,
    pub refine: RefineStage,
}

impl Stages {
    /// Build every stage from configuration and provider chains
    pub fn new(config: &OrchestratorConfig, capabilities: &Capabilities) -> Self {
        Self {
            query: QueryStage::new(config.query.retrieval_length_threshold),
            retrieval: RetrievalStage::new(Arc::clone(&capabilities.retrieval)),
            answer: AnswerStage::new(
                Arc::clone(&capabilities.generation),
                config.generation.clone(),
            ),
            critique: CritiqueStage::new(config.critique.clone()),
            refine: RefineStage::new(
                Arc::clone(&capabilities.generation),
                config.generation.clone(),
            ),
        }
    }
}
