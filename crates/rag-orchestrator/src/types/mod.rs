//! Core types for the orchestration engine

pub mod answer;
pub mod passage;
pub mod query;
pub mod response;
pub mod trace;

pub use answer::{Answer, Critique};
pub use passage::RetrievedPassage;
pub use query::{Query, QueryRequest};
pub use response::PipelineResult;
pub use trace::{StageSpan, Trace, TraceDetail, TraceEvent, TraceStatus};
