//! rag-orchestrator: multi-strategy answer orchestration for retrieval-augmented generation
//!
//! A query flows through a selector that picks one of three pipeline variants
//! (single-pass, evaluate-once, iterative-refine). Each pipeline is composed
//! from small stages (query analysis, retrieval, answer, critique, refine) and
//! every external call goes through an ordered fallback chain of providers.
//! Every request returns an answer together with its thinking-step trace, even
//! when all backends are down.

pub mod config;
pub mod context;
pub mod error;
pub mod fallback;
pub mod generation;
pub mod orchestrator;
pub mod pipeline;
pub mod providers;
pub mod selector;
pub mod server;
pub mod stages;
pub mod types;

pub use config::{Deployment, OrchestratorConfig};
pub use context::Capabilities;
pub use error::{Error, Result};
pub use fallback::FallbackChain;
pub use orchestrator::Orchestrator;
pub use pipeline::PipelineKind;
pub use selector::{Mode, PipelineSelector, Selection};
pub use types::{PipelineResult, QueryRequest, TraceEvent, TraceStatus};
