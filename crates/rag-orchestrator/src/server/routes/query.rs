//! Query endpoint

use axum::{extract::State, Json};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{PipelineResult, QueryRequest};

/// POST /api/query - Answer a query with the selected pipeline
///
/// If the client disconnects, axum drops this future; the drop guard then
/// cancels the token and in-flight provider calls are abandoned.
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<PipelineResult>> {
    let start = Instant::now();
    let request_id = Uuid::new_v4();

    tracing::info!(%request_id, mode = %request.mode, "Query: \"{}\"", request.query);

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let result = state
        .orchestrator()
        .run_with_cancellation(request, cancel)
        .await
        .inspect_err(|e| tracing::warn!(%request_id, "Query rejected: {}", e))?;

    tracing::info!(
        %request_id,
        "Answered via {} in {}ms ({} steps, {} sources)",
        result.pipeline_info,
        start.elapsed().as_millis(),
        result.thinking_steps.len(),
        result.sources.len()
    );

    Ok(Json(result))
}
