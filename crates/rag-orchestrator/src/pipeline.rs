//! Pipeline variants composed from the stages
//!
//! All variants share the same front half:
//!
//! ```text
//! QueryStage -> [RetrievalStage if needed] -> AnswerStage
//! ```
//!
//! and differ only in what happens after the first answer:
//!
//! - single-pass stops
//! - evaluate-once critiques once and refines once if the score is low
//! - iterative-refine alternates critique and refine until the score reaches
//!   the acceptance threshold or the refinement budget runs out

use serde::Serialize;
use std::fmt;

use crate::config::{CritiqueConfig, PipelineProfile};
use crate::error::{Error, Result};
use crate::stages::{StageContext, Stages};
use crate::types::{Answer, Critique, Query, RetrievedPassage, TraceDetail};

/// Fallback answer when the pipeline itself fails
pub const ERROR_ANSWER: &str =
    "I encountered an error while processing your request. Please try again.";

/// Component name for pipeline-level trace events
pub const COMPONENT: &str = "Pipeline";

/// Pipeline variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineKind {
    SinglePass,
    EvaluateOnce,
    IterativeRefine,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 3] = [
        PipelineKind::SinglePass,
        PipelineKind::EvaluateOnce,
        PipelineKind::IterativeRefine,
    ];

    /// Canonical mode name accepted on the wire
    pub fn mode_name(&self) -> &'static str {
        match self {
            PipelineKind::SinglePass => "phase1",
            PipelineKind::EvaluateOnce => "phase2",
            PipelineKind::IterativeRefine => "phase3",
        }
    }

    /// Human-readable name reported as `pipelineInfo`
    pub fn display_name(&self) -> &'static str {
        match self {
            PipelineKind::SinglePass => "Phase 1: Basic A2A",
            PipelineKind::EvaluateOnce => "Phase 2: Smart A2A",
            PipelineKind::IterativeRefine => "Phase 3: Self-Refinement",
        }
    }

    /// One-line description for listings
    pub fn description(&self) -> &'static str {
        match self {
            PipelineKind::SinglePass => "Retrieve, then answer once",
            PipelineKind::EvaluateOnce => {
                "Answer, self-evaluate, and refine once if the score is low"
            }
            PipelineKind::IterativeRefine => {
                "Answer, then critique and refine until the answer is accepted"
            }
        }
    }

    /// Upper bound on refine calls for this variant
    pub fn refinement_cap(&self) -> usize {
        match self {
            PipelineKind::SinglePass => 0,
            PipelineKind::EvaluateOnce => 1,
            PipelineKind::IterativeRefine => 3,
        }
    }

    /// Resolve a fixed mode name or one of its aliases (case-insensitive)
    pub fn from_mode(mode: &str) -> Option<Self> {
        match mode.trim().to_ascii_lowercase().as_str() {
            "phase1" | "single-pass" | "single_pass" | "basic" => Some(PipelineKind::SinglePass),
            "phase2" | "evaluate-once" | "evaluate_once" | "smart" => {
                Some(PipelineKind::EvaluateOnce)
            }
            "phase3" | "iterative-refine" | "iterative_refine" | "refine" => {
                Some(PipelineKind::IterativeRefine)
            }
            _ => None,
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Why a pipeline stopped producing revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Single-pass: no evaluation
    Answered,
    /// Evaluate-once finished; `refined` tells whether the refine step ran
    Evaluated { score: u8, refined: bool },
    /// Critique reached the acceptance threshold
    Accepted { score: u8, refinements: usize },
    /// Refinement budget exhausted before acceptance
    Exhausted { refinements: usize },
    /// The pipeline caught a failure and returned the error answer
    Recovered,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Answered => write!(f, "answered in a single pass"),
            Termination::Evaluated { score, refined: false } => {
                write!(f, "accepted after evaluation ({}/10)", score)
            }
            Termination::Evaluated { score, refined: true } => {
                write!(f, "refined once after scoring {}/10", score)
            }
            Termination::Accepted { score, refinements } => {
                write!(f, "accepted at {}/10 after {} refinement(s)", score, refinements)
            }
            Termination::Exhausted { refinements } => {
                write!(f, "refinement budget exhausted after {} refinement(s)", refinements)
            }
            Termination::Recovered => write!(f, "recovered from an internal failure"),
        }
    }
}

/// Output of one pipeline execution
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub answer: Answer,
    pub passages: Vec<RetrievedPassage>,
    pub termination: Termination,
}

/// One pipeline variant bound to its profile and the shared stages
pub struct Pipeline<'a> {
    kind: PipelineKind,
    profile: PipelineProfile,
    critique: &'a CritiqueConfig,
    stages: &'a Stages,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        kind: PipelineKind,
        profile: PipelineProfile,
        critique: &'a CritiqueConfig,
        stages: &'a Stages,
    ) -> Self {
        let profile = PipelineProfile {
            max_refinements: profile.max_refinements.min(kind.refinement_cap()),
            ..profile
        };
        Self {
            kind,
            profile,
            critique,
            stages,
        }
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    /// Execute the pipeline for raw query text.
    ///
    /// Returns `Err` only for invalid input or cancellation. Any other
    /// failure is recorded in the trace and turned into [`ERROR_ANSWER`].
    pub async fn run(&self, raw: &str, ctx: &mut StageContext) -> Result<PipelineRun> {
        let query = self.stages.query.run(raw, &mut ctx.trace)?;

        match self.execute(&query, ctx).await {
            Ok(run) => Ok(run),
            Err(e @ (Error::InvalidInput(_) | Error::Cancelled)) => Err(e),
            Err(e) => {
                tracing::error!("{} failed: {}", self.kind, e);
                let span = ctx
                    .trace
                    .begin(COMPONENT, "recover", "Recovering from pipeline failure");
                ctx.trace.fail(
                    span,
                    format!("Pipeline failed: {}", e),
                    Some(TraceDetail::Failure {
                        error: e.to_string(),
                        failed_tiers: e.tier_failures().to_vec(),
                    }),
                );
                Ok(PipelineRun {
                    answer: Answer::degraded(ERROR_ANSWER),
                    passages: Vec::new(),
                    termination: Termination::Recovered,
                })
            }
        }
    }

    async fn execute(&self, query: &Query, ctx: &mut StageContext) -> Result<PipelineRun> {
        let passages = self.retrieve(query, ctx).await?;
        let answer = self.stages.answer.run(query, &passages, ctx).await?;

        let (answer, termination) = match self.kind {
            PipelineKind::SinglePass => (answer, Termination::Answered),
            PipelineKind::EvaluateOnce => self.evaluate_once(query, answer, &passages, ctx).await?,
            PipelineKind::IterativeRefine => self.iterate(query, answer, &passages, ctx).await?,
        };

        Ok(PipelineRun {
            answer,
            passages,
            termination,
        })
    }

    /// Retrieval failures degrade to an empty passage list
    async fn retrieve(
        &self,
        query: &Query,
        ctx: &mut StageContext,
    ) -> Result<Vec<RetrievedPassage>> {
        if !query.needs_retrieval() {
            return Ok(Vec::new());
        }

        match self
            .stages
            .retrieval
            .run(query, self.profile.retrieval_k, ctx)
            .await
        {
            Ok(passages) => Ok(passages),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                tracing::warn!("Continuing without passages: {}", e);
                Ok(Vec::new())
            }
        }
    }

    fn critique(
        &self,
        query: &Query,
        answer: &Answer,
        passages: &[RetrievedPassage],
        ctx: &mut StageContext,
    ) -> Critique {
        self.stages.critique.run(query, answer, passages, &mut ctx.trace)
    }

    async fn evaluate_once(
        &self,
        query: &Query,
        answer: Answer,
        passages: &[RetrievedPassage],
        ctx: &mut StageContext,
    ) -> Result<(Answer, Termination)> {
        let critique = self.critique(query, &answer, passages, ctx);
        if critique.score >= self.critique.refine_below || self.profile.max_refinements == 0 {
            return Ok((
                answer,
                Termination::Evaluated {
                    score: critique.score,
                    refined: false,
                },
            ));
        }

        let refinement = self
            .stages
            .refine
            .run(query, &answer, &critique, passages, 1, ctx)
            .await?;
        Ok((
            refinement.answer,
            Termination::Evaluated {
                score: critique.score,
                refined: true,
            },
        ))
    }

    async fn iterate(
        &self,
        query: &Query,
        mut answer: Answer,
        passages: &[RetrievedPassage],
        ctx: &mut StageContext,
    ) -> Result<(Answer, Termination)> {
        let max = self.profile.max_refinements;

        for iteration in 1..=max {
            let critique = self.critique(query, &answer, passages, ctx);
            if critique.score >= self.critique.accept_at {
                return Ok((
                    answer,
                    Termination::Accepted {
                        score: critique.score,
                        refinements: iteration - 1,
                    },
                ));
            }

            // A no-op hands back the previous answer unchanged
            answer = self
                .stages
                .refine
                .run(query, &answer, &critique, passages, iteration, ctx)
                .await?
                .answer;
        }

        Ok((answer, Termination::Exhausted { refinements: max }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenerationConfig, PipelinesConfig};
    use crate::context::Capabilities;
    use crate::stages::testing::{
        generation_chain, passages, retrieval_chain, FixedRetriever, ScriptedLlm,
    };
    use crate::stages::{AnswerStage, CritiqueStage, QueryStage, RefineStage, RetrievalStage};
    use crate::types::TraceStatus;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    const GOOD: &str = "Artificial intelligence is the field of computer science that builds \
                        systems able to perceive, reason, learn and act, from search to deep \
                        learning.";

    const AI_QUERY: &str = "What is artificial intelligence?";

    fn stages(llm: Arc<ScriptedLlm>, retriever: Arc<FixedRetriever>) -> Stages {
        let capabilities =
            Capabilities::new(generation_chain(vec![llm]), retrieval_chain(retriever));
        let generation = &capabilities.generation;
        Stages {
            query: QueryStage::new(50),
            retrieval: RetrievalStage::new(Arc::clone(&capabilities.retrieval)),
            answer: AnswerStage::new(Arc::clone(generation), GenerationConfig::default()),
            critique: CritiqueStage::new(CritiqueConfig::default()),
            refine: RefineStage::new(Arc::clone(generation), GenerationConfig::default()),
        }
    }

    async fn run(kind: PipelineKind, stages: &Stages, text: &str) -> (PipelineRun, StageContext) {
        let critique = CritiqueConfig::default();
        let profile = PipelinesConfig::default().profile(kind);
        let pipeline = Pipeline::new(kind, profile, &critique, stages);
        let mut ctx = StageContext::new(CancellationToken::new());
        let run = pipeline.run(text, &mut ctx).await.unwrap();
        (run, ctx)
    }

    #[test]
    fn test_mode_aliases() {
        assert_eq!(PipelineKind::from_mode("phase1"), Some(PipelineKind::SinglePass));
        assert_eq!(PipelineKind::from_mode("Smart"), Some(PipelineKind::EvaluateOnce));
        assert_eq!(
            PipelineKind::from_mode("iterative-refine"),
            Some(PipelineKind::IterativeRefine)
        );
        assert_eq!(PipelineKind::from_mode("phase9"), None);
        for kind in PipelineKind::ALL {
            assert_eq!(PipelineKind::from_mode(kind.mode_name()), Some(kind));
        }
    }

    #[tokio::test]
    async fn test_single_pass_uses_k3_and_never_critiques() {
        let llm = ScriptedLlm::replying("gateway", vec![GOOD]);
        let retriever = FixedRetriever::with(passages(10));
        let stages = stages(llm.clone(), retriever.clone());

        let (run, ctx) = run(PipelineKind::SinglePass, &stages, "What is AI?").await;

        assert_eq!(run.termination, Termination::Answered);
        assert_eq!(run.passages.len(), 3);
        assert_eq!(*retriever.requested_k.lock(), vec![3]);
        assert_eq!(llm.calls(), 1);
        assert_eq!(ctx.trace.count_invocations(CritiqueStage::COMPONENT), 0);
        assert_eq!(ctx.trace.count_invocations(AnswerStage::COMPONENT), 1);
    }

    #[tokio::test]
    async fn test_plain_query_skips_retrieval() {
        let retriever = FixedRetriever::with(passages(3));
        let stages = stages(ScriptedLlm::replying("gateway", vec![GOOD]), retriever.clone());

        let (run, ctx) = run(PipelineKind::SinglePass, &stages, "hello there").await;

        assert!(run.passages.is_empty());
        assert!(retriever.requested_k.lock().is_empty());
        assert_eq!(ctx.trace.count_invocations(RetrievalStage::COMPONENT), 0);
    }

    #[tokio::test]
    async fn test_evaluate_once_refines_low_score_once() {
        let llm = ScriptedLlm::replying("gateway", vec!["AI.", GOOD]);
        let stages = stages(llm.clone(), FixedRetriever::with(passages(5)));

        let (run, ctx) = run(PipelineKind::EvaluateOnce, &stages, AI_QUERY).await;

        assert!(matches!(run.termination, Termination::Evaluated { refined: true, .. }));
        assert_eq!(run.answer.text, GOOD);
        assert_eq!(ctx.trace.count_invocations(CritiqueStage::COMPONENT), 1);
        assert_eq!(ctx.trace.count_invocations(RefineStage::COMPONENT), 1);
    }

    #[tokio::test]
    async fn test_evaluate_once_keeps_good_answer() {
        let llm = ScriptedLlm::replying("gateway", vec![GOOD]);
        let stages = stages(llm.clone(), FixedRetriever::with(passages(5)));

        let (run, ctx) = run(PipelineKind::EvaluateOnce, &stages, AI_QUERY).await;

        assert!(matches!(run.termination, Termination::Evaluated { refined: false, .. }));
        assert_eq!(ctx.trace.count_invocations(RefineStage::COMPONENT), 0);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_iterative_stops_at_acceptance() {
        let llm = ScriptedLlm::replying("gateway", vec!["AI.", GOOD]);
        let stages = stages(llm.clone(), FixedRetriever::with(passages(8)));

        let (run, ctx) = run(PipelineKind::IterativeRefine, &stages, AI_QUERY).await;

        assert!(matches!(run.termination, Termination::Accepted { refinements: 1, .. }));
        assert_eq!(ctx.trace.count_invocations(RefineStage::COMPONENT), 1);
        assert_eq!(ctx.trace.count_invocations(CritiqueStage::COMPONENT), 2);
        assert_eq!(run.answer.revision, 1);
    }

    #[tokio::test]
    async fn test_iterative_never_exceeds_three_refinements() {
        // Each reply differs but stays short, so the score never reaches 8
        let llm = ScriptedLlm::replying("gateway", vec!["A.", "B.", "C.", "D.", "E.", "F."]);
        let stages = stages(llm.clone(), FixedRetriever::with(passages(8)));

        let (run, ctx) = run(PipelineKind::IterativeRefine, &stages, AI_QUERY).await;

        assert_eq!(run.termination, Termination::Exhausted { refinements: 3 });
        assert_eq!(ctx.trace.count_invocations(RefineStage::COMPONENT), 3);
        assert_eq!(ctx.trace.count_invocations(CritiqueStage::COMPONENT), 3);
        assert_eq!(llm.calls(), 4);
        assert_eq!(run.answer.text, "D.");
    }

    #[tokio::test]
    async fn test_noop_refinements_keep_answer_and_respect_bound() {
        let llm = ScriptedLlm::replying("gateway", vec!["AI."]);
        let stages = stages(llm.clone(), FixedRetriever::with(passages(8)));

        let (run, ctx) = run(PipelineKind::IterativeRefine, &stages, AI_QUERY).await;

        assert_eq!(run.termination, Termination::Exhausted { refinements: 3 });
        assert_eq!(run.answer.text, "AI.");
        assert_eq!(run.answer.revision, 0);
        assert_eq!(ctx.trace.count_invocations(RefineStage::COMPONENT), 3);
    }

    #[tokio::test]
    async fn test_retrieval_outage_still_answers() {
        let stages = stages(ScriptedLlm::replying("gateway", vec![GOOD]), FixedRetriever::down());

        let (run, ctx) = run(PipelineKind::SinglePass, &stages, "What is AI?").await;

        assert!(run.passages.is_empty());
        assert!(!run.answer.text.is_empty());
        assert!(ctx
            .trace
            .events()
            .iter()
            .any(|e| e.component == RetrievalStage::COMPONENT && e.status == TraceStatus::Error));
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let stages = stages(
            ScriptedLlm::replying("gateway", vec![GOOD]),
            FixedRetriever::with(Vec::new()),
        );
        let critique = CritiqueConfig::default();
        let pipeline = Pipeline::new(
            PipelineKind::SinglePass,
            PipelinesConfig::default().single_pass,
            &critique,
            &stages,
        );
        let mut ctx = StageContext::new(CancellationToken::new());

        let err = pipeline.run("   ", &mut ctx).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    fn reply() -> impl proptest::strategy::Strategy<Value = String> {
        use proptest::prelude::*;
        prop_oneof![Just(GOOD.to_string()), Just(String::new()), "[a-z ]{1,160}"]
    }

    proptest::proptest! {
        #[test]
        fn iterative_refine_is_bounded_and_stops_on_acceptance(
            replies in proptest::collection::vec(reply(), 1..7)
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let ctx = runtime.block_on(async {
                let script = replies.iter().map(String::as_str).collect();
                let stages = stages(
                    ScriptedLlm::replying("gateway", script),
                    FixedRetriever::with(passages(8)),
                );
                run(PipelineKind::IterativeRefine, &stages, AI_QUERY).await.1
            });

            proptest::prop_assert!(ctx.trace.count_invocations(RefineStage::COMPONENT) <= 3);

            let accepted_at = ctx.trace.events().iter().position(|e| {
                matches!(e.detail, Some(TraceDetail::Critique { score, .. }) if score >= 8)
            });
            if let Some(index) = accepted_at {
                proptest::prop_assert!(ctx.trace.events()[index..]
                    .iter()
                    .all(|e| e.component != RefineStage::COMPONENT));
            }
        }
    }
}
