//! Request entry point
//!
//! `Orchestrator::run` parses the mode, selects a pipeline, runs it and
//! assembles the [`PipelineResult`]. Only invalid input and cancellation are
//! returned as errors; provider outages surface as degraded answers with the
//! failures recorded in `thinking_steps`.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::{CritiqueConfig, Deployment, OrchestratorConfig, PipelinesConfig};
use crate::context::Capabilities;
use crate::error::{Error, Result};
use crate::pipeline::{Pipeline, PipelineKind};
use crate::selector::{Mode, PipelineSelector};
use crate::stages::{StageContext, Stages};
use crate::types::{PipelineResult, QueryRequest, TraceDetail};

/// Component name for the final trace event
pub const COMPONENT: &str = "Orchestrator";

pub struct Orchestrator {
    selector: PipelineSelector,
    stages: Stages,
    pipelines: PipelinesConfig,
    critique: CritiqueConfig,
    capabilities: Capabilities,
}

impl Orchestrator {
    /// Build with explicit capability chains
    pub fn new(config: &OrchestratorConfig, capabilities: Capabilities) -> Self {
        Self {
            selector: PipelineSelector::new(config.selector.clone()),
            stages: Stages::new(config, &capabilities),
            pipelines: config.pipelines.clone(),
            critique: config.critique.clone(),
            capabilities,
        }
    }

    /// Build with providers registered from configuration and the detected deployment
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        let deployment = Deployment::detect();
        tracing::info!("Deployment: {:?}", deployment);
        let capabilities = Capabilities::from_config(config, &deployment)?;
        Ok(Self::new(config, capabilities))
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Longest a run can take when every provider call waits out its timeout.
    ///
    /// One retrieval plus the first answer and the largest refinement budget,
    /// each walking the whole generation chain.
    pub fn worst_case_latency(&self) -> Duration {
        let generations = PipelineKind::ALL
            .iter()
            .map(|kind| {
                let budget = self.pipelines.profile(*kind).max_refinements;
                1 + budget.min(kind.refinement_cap())
            })
            .max()
            .unwrap_or(1);

        self.capabilities.retrieval.worst_case()
            + self.capabilities.generation.worst_case() * generations as u32
    }

    /// Answer a query
    pub async fn run(&self, request: QueryRequest) -> Result<PipelineResult> {
        self.run_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Answer a query, aborting in-flight provider calls when `cancel` fires
    pub async fn run_with_cancellation(
        &self,
        request: QueryRequest,
        cancel: CancellationToken,
    ) -> Result<PipelineResult> {
        let mode: Mode = request.mode.parse()?;
        if request.query.trim().is_empty() {
            return Err(Error::invalid_input("Query must not be empty"));
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Request cancelled by caller");
                Err(Error::Cancelled)
            }
            result = self.execute(mode, &request.query, cancel.clone()) => result,
        }
    }

    async fn execute(
        &self,
        mode: Mode,
        text: &str,
        cancel: CancellationToken,
    ) -> Result<PipelineResult> {
        let mut ctx = StageContext::new(cancel);

        let span = ctx.trace.begin(
            PipelineSelector::COMPONENT,
            "select",
            format!("Selecting pipeline (mode: {})", mode),
        );
        let selection = self.selector.select(mode, text);
        ctx.trace.complete(
            span,
            format!("Selected {}", selection.kind.display_name()),
            Some(TraceDetail::Selection {
                strategy: selection.strategy.to_string(),
                pipeline: selection.kind.mode_name().to_string(),
                confidence: selection.confidence,
                rationale: selection.rationale.clone(),
            }),
        );
        tracing::info!("Running {} ({})", selection.pipeline_info, selection.rationale);

        let pipeline = self.pipeline(selection.kind);
        let run = pipeline.run(text, &mut ctx).await?;

        let span = ctx.trace.begin(COMPONENT, "finalize", "Assembling final answer");
        ctx.trace.complete(span, format!("Answer ready: {}", run.termination), None);

        Ok(PipelineResult::new(
            run.answer.text,
            ctx.into_trace().into_events(),
            selection.pipeline_info,
            run.passages,
        ))
    }

    fn pipeline(&self, kind: PipelineKind) -> Pipeline<'_> {
        Pipeline::new(kind, self.pipelines.profile(kind), &self.critique, &self.stages)
    }
}
