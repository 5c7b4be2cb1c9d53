//! Application state for the HTTP server

use serde::Serialize;
use std::sync::Arc;

use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::fallback::TierHealth;
use crate::orchestrator::Orchestrator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: OrchestratorConfig,
    orchestrator: Orchestrator,
}

impl AppState {
    /// Create state with providers registered from configuration
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        tracing::info!("Initializing orchestrator state...");
        let orchestrator = Orchestrator::from_config(&config)?;
        tracing::info!(
            "Generation tiers: [{}]",
            orchestrator.capabilities().generation.describe().join(", ")
        );
        tracing::info!(
            "Retrieval tiers: [{}]",
            orchestrator.capabilities().retrieval.describe().join(", ")
        );
        Ok(Self::with_orchestrator(config, orchestrator))
    }

    /// Create state around an existing orchestrator
    pub fn with_orchestrator(config: OrchestratorConfig, orchestrator: Orchestrator) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                orchestrator,
            }),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.inner.orchestrator
    }

    /// Check every registered tier of both chains
    pub async fn readiness(&self) -> Readiness {
        let capabilities = self.inner.orchestrator.capabilities();
        let (generation, retrieval) = tokio::join!(
            capabilities.generation.check_health(),
            capabilities.retrieval.check_health()
        );

        Readiness {
            ready: generation.iter().any(|t| t.healthy),
            generation,
            retrieval,
        }
    }
}

/// Readiness report; ready once any generation tier is healthy
#[derive(Debug, Serialize)]
pub struct Readiness {
    pub ready: bool,
    pub generation: Vec<TierHealth>,
    pub retrieval: Vec<TierHealth>,
}
