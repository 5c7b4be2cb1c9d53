//! Critique-driven answer rewriting

use std::sync::Arc;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::fallback::FallbackChain;
use crate::generation::PromptBuilder;
use crate::providers::{GenerationRequest, LlmProvider};
use crate::types::{Answer, Critique, Query, RetrievedPassage, TraceDetail};

use super::StageContext;

/// Result of one refinement attempt
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    /// The new answer, or the previous one unchanged when `noop` is set
    pub answer: Answer,
    /// No provider produced a different answer
    pub noop: bool,
}

pub struct RefineStage {
    chain: Arc<FallbackChain<dyn LlmProvider>>,
    config: GenerationConfig,
}

impl RefineStage {
    pub const COMPONENT: &'static str = "RefineStage";

    pub fn new(chain: Arc<FallbackChain<dyn LlmProvider>>, config: GenerationConfig) -> Self {
        Self { chain, config }
    }

    /// Rewrite `answer` using the critique as instructions.
    ///
    /// Never destroys the previous answer: if every tier fails, or the model
    /// returns empty or identical text, the refinement is a no-op and the
    /// input answer is handed back.
    pub async fn run(
        &self,
        query: &Query,
        answer: &Answer,
        critique: &Critique,
        passages: &[RetrievedPassage],
        iteration: usize,
        ctx: &mut StageContext,
    ) -> Result<Refinement> {
        let span = ctx.trace.begin(
            Self::COMPONENT,
            format!("refine-{}", iteration),
            format!("Refining answer (iteration {}, score {}/10)", iteration, critique.score),
        );

        let prompt = PromptBuilder::build_refine_prompt(
            query.normalized(),
            &answer.text,
            critique,
            passages,
        );
        let request = GenerationRequest::new(
            prompt,
            self.config.temperature,
            self.config.max_tokens,
        )
        .with_system_prompt(self.config.system_prompt.clone());

        let outcome = self
            .chain
            .execute(ctx.cancel_token(), |provider| {
                let request = request.clone();
                async move { provider.generate(&request).await }
            })
            .await;

        let (refined, served_by, failed_tiers) = match outcome {
            Ok(success) => {
                let text = success.value.text.trim().to_string();
                let refined = (!text.is_empty() && text != answer.text.trim())
                    .then(|| answer.refined(text, success.provider.as_str()));
                (refined, Some(success.provider), success.failures)
            }
            Err(Error::CapabilityUnavailable { failures, .. }) => {
                tracing::warn!(
                    "Refinement iteration {} could not reach any generation tier",
                    iteration
                );
                (None, None, failures)
            }
            Err(e) => {
                ctx.trace.fail(
                    span,
                    format!("Refinement aborted: {}", e),
                    Some(TraceDetail::Failure {
                        error: e.to_string(),
                        failed_tiers: Vec::new(),
                    }),
                );
                return Err(e);
            }
        };

        let noop = refined.is_none();
        let message = if noop {
            "Refinement made no change; keeping previous answer".to_string()
        } else {
            format!("Answer refined to revision {}", answer.revision + 1)
        };
        ctx.trace.complete(
            span,
            message,
            Some(TraceDetail::Refinement {
                iteration,
                served_by,
                failed_tiers,
                noop,
            }),
        );

        Ok(Refinement {
            answer: refined.unwrap_or_else(|| answer.clone()),
            noop,
        })
    }
}
