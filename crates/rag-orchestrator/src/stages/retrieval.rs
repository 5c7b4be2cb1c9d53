//! Top-k passage retrieval through the retrieval fallback chain

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::fallback::FallbackChain;
use crate::providers::RetrievalProvider;
use crate::types::{passage::rank_passages, Query, RetrievedPassage, TraceDetail};

use super::StageContext;

pub struct RetrievalStage {
    chain: Arc<FallbackChain<dyn RetrievalProvider>>,
}

impl RetrievalStage {
    pub const COMPONENT: &'static str = "RetrievalStage";

    pub fn new(chain: Arc<FallbackChain<dyn RetrievalProvider>>) -> Self {
        Self { chain }
    }

    /// Fetch at most `k` passages ordered by descending score.
    ///
    /// When every tier fails this returns [`Error::RetrievalUnavailable`];
    /// callers treat that as "no passages" rather than a request failure.
    pub async fn run(
        &self,
        query: &Query,
        k: usize,
        ctx: &mut StageContext,
    ) -> Result<Vec<RetrievedPassage>> {
        if k == 0 {
            return Err(Error::invalid_input("retrieval k must be positive"));
        }

        let span = ctx.trace.begin(
            Self::COMPONENT,
            "retrieve",
            format!("Retrieving up to {} passages", k),
        );

        let text = query.normalized().to_string();
        let outcome = self
            .chain
            .execute(ctx.cancel_token(), |provider| {
                let text = text.clone();
                async move { provider.retrieve(&text, k).await }
            })
            .await;

        match outcome {
            Ok(success) => {
                let mut passages = success.value;
                rank_passages(&mut passages, k);
                let top_score = passages.first().map(|p| p.score);

                tracing::debug!(
                    "Retrieved {} passages via {} ({})",
                    passages.len(),
                    success.tier,
                    success.provider
                );

                let message = if passages.is_empty() {
                    "No matching passages found".to_string()
                } else {
                    format!("Retrieved {} passages", passages.len())
                };
                ctx.trace.complete(
                    span,
                    message,
                    Some(TraceDetail::Retrieval {
                        k,
                        returned: passages.len(),
                        top_score,
                        failed_tiers: success.failures,
                    }),
                );
                Ok(passages)
            }
            Err(e) => {
                let failed_tiers = e.tier_failures().to_vec();
                ctx.trace.fail(
                    span,
                    format!("Retrieval failed: {}", e),
                    Some(TraceDetail::Retrieval {
                        k,
                        returned: 0,
                        top_score: None,
                        failed_tiers,
                    }),
                );
                match e {
                    Error::CapabilityUnavailable { .. } => {
                        Err(Error::RetrievalUnavailable(e.to_string()))
                    }
                    other => Err(other),
                }
            }
        }
    }
}
