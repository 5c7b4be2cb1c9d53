//! API routes for the orchestration server

pub mod openai;
pub mod pipelines;
pub mod query;

use axum::{
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/query", post(query::query))
        .route("/pipelines", get(pipelines::list_pipelines))
        .route("/models", get(pipelines::list_models))
        .route("/info", get(info))
}

/// OpenAI-compatible routes, mounted at the root
pub fn openai_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/chat/completions", post(openai::chat_completions))
        .route("/chat/completions", post(openai::chat_completions))
        .route("/v1/models", get(openai::list_models))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "rag-orchestrator",
        "version": env!("CARGO_PKG_VERSION"),
        "description": concat!(
            "RAG answer orchestration with pipeline selection, ",
            "self-refinement and provider fallback"
        ),
        "endpoints": {
            "POST /api/query": "Answer a query ({ query, mode })",
            "GET /api/pipelines": "List pipeline variants and selection modes",
            "GET /api/models": "List registered generation and retrieval tiers",
            "POST /v1/chat/completions": "OpenAI-compatible chat through the gateway",
            "GET /v1/models": "OpenAI-compatible model listing",
            "GET /health": "Liveness check",
            "GET /ready": "Per-tier health; ready when a generation tier is healthy"
        },
        "modes": {
            "phase1": "Single pass: retrieve and answer",
            "phase2": "Evaluate once: answer, critique, refine once if needed",
            "phase3": "Iterative refinement: critique and refine up to 3 times",
            "auto": "Pick a pipeline from query complexity",
            "meta": "Pick a pipeline from query complexity and report confidence"
        }
    }))
}
