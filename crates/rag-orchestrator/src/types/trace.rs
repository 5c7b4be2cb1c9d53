//! Thinking-step trace recorded for every request
//!
//! Events are append-only. A stage opens a [`StageSpan`] with a `processing`
//! event and must hand the span back to [`Trace::complete`] or [`Trace::fail`],
//! which consume it, so each span produces exactly one terminal event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TierFailure;

/// Progress of a traced step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceStatus {
    Processing,
    Completed,
    Error,
}

impl TraceStatus {
    /// Completed or error
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TraceStatus::Processing)
    }
}

/// Structured payload attached to a trace event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceDetail {
    /// Query analysis outcome
    Query {
        normalized: String,
        needs_retrieval: bool,
    },
    /// Retrieval outcome
    Retrieval {
        k: usize,
        returned: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        top_score: Option<f32>,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        failed_tiers: Vec<TierFailure>,
    },
    /// Answer generation outcome
    Generation {
        #[serde(skip_serializing_if = "Option::is_none")]
        served_by: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        failed_tiers: Vec<TierFailure>,
    },
    /// Critique outcome
    Critique { score: u8, rationale: String },
    /// Refinement outcome
    Refinement {
        iteration: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        served_by: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        failed_tiers: Vec<TierFailure>,
        noop: bool,
    },
    /// Pipeline selection outcome
    Selection {
        strategy: String,
        pipeline: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        confidence: Option<u8>,
        rationale: String,
    },
    /// Failure caught at the pipeline level
    Failure {
        error: String,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        failed_tiers: Vec<TierFailure>,
    },
}

/// One audit-log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    /// Component that emitted the event, e.g. "AnswerStage"
    pub component: String,
    /// Step label, e.g. "generate"
    pub step: String,
    pub status: TraceStatus,
    /// Human-readable message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<TraceDetail>,
    pub timestamp: DateTime<Utc>,
}

/// Open step waiting for its terminal event
#[derive(Debug)]
#[must_use = "a stage span must be closed with Trace::complete or Trace::fail"]
pub struct StageSpan {
    component: &'static str,
    step: String,
}

impl StageSpan {
    /// Component that opened the span
    pub fn component(&self) -> &'static str {
        self.component
    }
}

/// Ordered trace of one request
#[derive(Debug, Clone, Default)]
pub struct Trace {
    events: Vec<TraceEvent>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        &mut self,
        component: &str,
        step: &str,
        status: TraceStatus,
        message: String,
        detail: Option<TraceDetail>,
    ) {
        self.events.push(TraceEvent {
            component: component.to_string(),
            step: step.to_string(),
            status,
            message,
            detail,
            timestamp: Utc::now(),
        });
    }

    /// Append a `processing` event and open a span
    pub fn begin(
        &mut self,
        component: &'static str,
        step: impl Into<String>,
        message: impl Into<String>,
    ) -> StageSpan {
        let step = step.into();
        self.push(component, &step, TraceStatus::Processing, message.into(), None);
        StageSpan { component, step }
    }

    /// Close a span with a `completed` event
    pub fn complete(
        &mut self,
        span: StageSpan,
        message: impl Into<String>,
        detail: Option<TraceDetail>,
    ) {
        self.push(
            span.component,
            &span.step,
            TraceStatus::Completed,
            message.into(),
            detail,
        );
    }

    /// Close a span with an `error` event
    pub fn fail(
        &mut self,
        span: StageSpan,
        message: impl Into<String>,
        detail: Option<TraceDetail>,
    ) {
        self.push(
            span.component,
            &span.step,
            TraceStatus::Error,
            message.into(),
            detail,
        );
    }

    /// Events recorded so far
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Most recent event
    pub fn last(&self) -> Option<&TraceEvent> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of spans a component has opened
    pub fn count_invocations(&self, component: &str) -> usize {
        self.events
            .iter()
            .filter(|e| e.component == component && e.status == TraceStatus::Processing)
            .count()
    }

    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}
