//! Pipeline and provider listings

use axum::{extract::State, Json};
use serde::Serialize;

use crate::pipeline::PipelineKind;
use crate::providers::gateway::GATEWAY_MODELS;
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineInfo {
    pub mode: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub retrieval_k: usize,
    pub max_refinements: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelinesResponse {
    pub pipelines: Vec<PipelineInfo>,
    /// Modes that pick a pipeline per query
    pub selection_modes: Vec<&'static str>,
    pub default_mode: &'static str,
}

/// GET /api/pipelines - List pipeline variants and selection modes
pub async fn list_pipelines(State(state): State<AppState>) -> Json<PipelinesResponse> {
    let pipelines = PipelineKind::ALL
        .iter()
        .map(|kind| {
            let profile = state.config().pipelines.profile(*kind);
            PipelineInfo {
                mode: kind.mode_name(),
                name: kind.display_name(),
                description: kind.description(),
                retrieval_k: profile.retrieval_k,
                max_refinements: profile.max_refinements.min(kind.refinement_cap()),
            }
        })
        .collect();

    Json(PipelinesResponse {
        pipelines,
        selection_modes: vec!["auto", "meta"],
        default_mode: "auto",
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsResponse {
    /// Registered generation tiers in fallback order
    pub generation_tiers: Vec<String>,
    /// Registered retrieval tiers in fallback order
    pub retrieval_tiers: Vec<String>,
    /// Models reachable through the gateway
    pub gateway_models: Vec<&'static str>,
}

/// GET /api/models - List registered providers
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let capabilities = state.orchestrator().capabilities();
    Json(ModelsResponse {
        generation_tiers: capabilities.generation.describe(),
        retrieval_tiers: capabilities.retrieval.describe(),
        gateway_models: GATEWAY_MODELS.to_vec(),
    })
}
