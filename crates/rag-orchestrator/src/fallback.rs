//! Ordered provider fallback for one capability
//!
//! Tiers are tried strictly in order. A tier that fails or exceeds the
//! per-provider timeout is skipped in favor of the next one without retrying,
//! so the worst case is the sum of the per-provider timeouts. When every tier
//! fails the chain returns a single `CapabilityUnavailable` naming all tiers.

use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Capability, Error, Result, TierFailure};
use crate::providers::{LlmProvider, RetrievalProvider};

/// Provider that can sit in a fallback chain
#[async_trait]
pub trait ChainMember: Send + Sync {
    fn member_name(&self) -> &str;

    /// Whether the backend currently looks usable; errors count as unhealthy
    async fn healthy(&self) -> bool;
}

#[async_trait]
impl ChainMember for dyn LlmProvider {
    fn member_name(&self) -> &str {
        self.name()
    }

    async fn healthy(&self) -> bool {
        self.health_check().await.unwrap_or(false)
    }
}

#[async_trait]
impl ChainMember for dyn RetrievalProvider {
    fn member_name(&self) -> &str {
        self.name()
    }

    async fn healthy(&self) -> bool {
        self.health_check().await.unwrap_or(false)
    }
}

struct Tier<P: ?Sized> {
    label: String,
    provider: Arc<P>,
}

/// Successful chain execution
#[derive(Debug, Clone)]
pub struct ChainSuccess<T> {
    pub value: T,
    /// Tier label that produced the value
    pub tier: String,
    /// Provider name that produced the value
    pub provider: String,
    /// Tiers that failed before the successful one
    pub failures: Vec<TierFailure>,
}

/// Health of one registered tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierHealth {
    pub tier: String,
    pub provider: String,
    pub healthy: bool,
}

/// Ordered list of providers for one capability
pub struct FallbackChain<P: ?Sized> {
    capability: Capability,
    tiers: Vec<Tier<P>>,
    timeout: Duration,
}

impl<P: ChainMember + ?Sized> FallbackChain<P> {
    /// Create an empty chain with a per-provider timeout
    pub fn new(capability: Capability, timeout: Duration) -> Self {
        Self {
            capability,
            tiers: Vec::new(),
            timeout,
        }
    }

    /// Append a tier
    pub fn with_tier(mut self, label: impl Into<String>, provider: Arc<P>) -> Self {
        self.push_tier(label, provider);
        self
    }

    /// Append a tier
    pub fn push_tier(&mut self, label: impl Into<String>, provider: Arc<P>) {
        self.tiers.push(Tier {
            label: label.into(),
            provider,
        });
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// "label (provider)" for every tier, in order
    pub fn describe(&self) -> Vec<String> {
        self.tiers
            .iter()
            .map(|t| format!("{} ({})", t.label, t.provider.member_name()))
            .collect()
    }

    /// Upper bound on one `execute` call: every tier running into its timeout
    pub fn worst_case(&self) -> Duration {
        self.timeout * self.len() as u32
    }

    /// Health-check every tier in order, each bounded by the chain timeout
    pub async fn check_health(&self) -> Vec<TierHealth> {
        let mut report = Vec::with_capacity(self.tiers.len());
        for tier in &self.tiers {
            let healthy = tokio::time::timeout(self.timeout, tier.provider.healthy())
                .await
                .unwrap_or(false);
            if !healthy {
                tracing::warn!(
                    "{} tier {} ({}) failed its health check",
                    self.capability,
                    tier.label,
                    tier.provider.member_name()
                );
            }
            report.push(TierHealth {
                tier: tier.label.clone(),
                provider: tier.provider.member_name().to_string(),
                healthy,
            });
        }
        report
    }

    /// Run `op` against each tier until one succeeds.
    ///
    /// Fatal errors (see [`Error::is_fatal`]) stop the chain and are returned
    /// as-is. Cancellation is checked before each tier and raced against the
    /// in-flight call, which is dropped when the token fires.
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<ChainSuccess<T>>
    where
        F: Fn(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut failures = Vec::new();

        for tier in &self.tiers {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let provider = tier.provider.member_name().to_string();
            let call = tokio::time::timeout(self.timeout, op(Arc::clone(&tier.provider)));

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                outcome = call => outcome,
            };

            let error = match outcome {
                Ok(Ok(value)) => {
                    if !failures.is_empty() {
                        tracing::info!(
                            "{} served by {} tier ({}) after {} failure(s)",
                            self.capability,
                            tier.label,
                            provider,
                            failures.len()
                        );
                    }
                    return Ok(ChainSuccess {
                        value,
                        tier: tier.label.clone(),
                        provider,
                        failures,
                    });
                }
                Ok(Err(e)) if e.is_fatal() => {
                    tracing::error!(
                        "{} tier {} ({}) failed fatally: {}",
                        self.capability,
                        tier.label,
                        provider,
                        e
                    );
                    return Err(e);
                }
                Ok(Err(e)) => e,
                Err(_) => Error::Timeout {
                    provider: provider.clone(),
                    after: self.timeout,
                },
            };

            tracing::warn!(
                "{} tier {} ({}) failed, trying next tier: {}",
                self.capability,
                tier.label,
                provider,
                error
            );
            failures.push(TierFailure {
                tier: tier.label.clone(),
                provider,
                message: error.to_string(),
            });
        }

        Err(Error::CapabilityUnavailable {
            capability: self.capability,
            failures,
        })
    }
}
