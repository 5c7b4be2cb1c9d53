//! First-answer generation through the generation fallback chain

use std::sync::Arc;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};
use crate::fallback::FallbackChain;
use crate::generation::PromptBuilder;
use crate::providers::{GenerationRequest, LlmProvider};
use crate::types::{Answer, Query, RetrievedPassage, TraceDetail};

use super::StageContext;

/// Returned when no generation tier could produce an answer
pub const DEGRADED_ANSWER: &str = "I'm sorry, I'm unable to generate an answer right now because \
no language model backend is reachable. Please try again in a few minutes.";

pub struct AnswerStage {
    chain: Arc<FallbackChain<dyn LlmProvider>>,
    config: GenerationConfig,
}

impl AnswerStage {
    pub const COMPONENT: &'static str = "AnswerStage";

    pub fn new(chain: Arc<FallbackChain<dyn LlmProvider>>, config: GenerationConfig) -> Self {
        Self { chain, config }
    }

    /// Produce the first answer.
    ///
    /// Provider failures never escape: when every tier fails the stage
    /// returns [`DEGRADED_ANSWER`]. Only cancellation and fatal errors are
    /// returned as `Err`.
    pub async fn run(
        &self,
        query: &Query,
        passages: &[RetrievedPassage],
        ctx: &mut StageContext,
    ) -> Result<Answer> {
        let span = ctx.trace.begin(
            Self::COMPONENT,
            "generate",
            format!("Generating answer from {} passages", passages.len()),
        );

        let request = GenerationRequest::new(
            PromptBuilder::build_answer_prompt(query.normalized(), passages),
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

        match outcome {
            Ok(success) => {
                let answer =
                    Answer::generated(success.value.text.trim(), success.provider.as_str());
                ctx.trace.complete(
                    span,
                    format!("Answer generated by {} tier", success.tier),
                    Some(TraceDetail::Generation {
                        served_by: Some(success.provider),
                        failed_tiers: success.failures,
                    }),
                );
                Ok(answer)
            }
            Err(Error::CapabilityUnavailable { failures, .. }) => {
                tracing::error!("All generation tiers failed; returning degraded answer");
                ctx.trace.fail(
                    span,
                    "All generation tiers failed; returning degraded answer",
                    Some(TraceDetail::Generation {
                        served_by: None,
                        failed_tiers: failures,
                    }),
                );
                Ok(Answer::degraded(DEGRADED_ANSWER))
            }
            Err(e) => {
                ctx.trace.fail(
                    span,
                    format!("Generation aborted: {}", e),
                    Some(TraceDetail::Failure {
                        error: e.to_string(),
                        failed_tiers: Vec::new(),
                    }),
                );
                Err(e)
            }
        }
    }
}
