//! HTTP server for the orchestration engine

pub mod routes;
pub mod state;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use state::{AppState, Readiness};

/// Headroom over the slowest possible pipeline run
const TIMEOUT_HEADROOM: Duration = Duration::from_secs(10);

/// Orchestration HTTP server
pub struct OrchestratorServer {
    config: OrchestratorConfig,
    state: AppState,
}

impl OrchestratorServer {
    /// Create a new server with providers registered from configuration
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        let state = AppState::new(config.clone())?;
        Ok(Self { config, state })
    }

    /// Create a server around prepared state
    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    /// Request timeout, raised above the configured value when a run that
    /// waits out every provider timeout could not finish within it
    pub fn request_timeout(&self) -> Duration {
        let configured = Duration::from_secs(self.config.server.request_timeout_secs);
        let needed = self.state.orchestrator().worst_case_latency() + TIMEOUT_HEADROOM;
        if configured >= needed {
            return configured;
        }

        tracing::warn!(
            "request_timeout_secs = {} is below the worst-case run time; using {}s",
            configured.as_secs(),
            needed.as_secs()
        );
        needed
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness))
            .nest("/api", routes::api_routes())
            .merge(routes::openai_routes())
            .with_state(self.state.clone())
            // Middleware layers (applied bottom to top)
            .layer(TimeoutLayer::new(self.request_timeout()))
            .layer(TraceLayer::new_for_http());

        if self.config.server.enable_cors {
            router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            router
        }
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.build_router();

        tracing::info!("Starting orchestration server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    service: &'static str,
    version: &'static str,
}

/// Liveness check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
        service: "rag-orchestrator",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check endpoint; 503 until a generation tier passes its health check
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let report = state.readiness().await;
    let status = if report.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Capabilities;
    use crate::orchestrator::Orchestrator;
    use crate::error::Capability;
    use crate::fallback::FallbackChain;
    use crate::providers::{GenerationRequest, GenerationResponse, LlmProvider};
    use crate::stages::testing::{
        generation_chain, passages, retrieval_chain, FixedRetriever, ScriptedLlm,
    };
    use crate::stages::DEGRADED_ANSWER;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Generation provider that never answers
    struct Hanging(&'static str);

    #[async_trait::async_trait]
    impl LlmProvider for Hanging {
        async fn generate(&self, _request: &GenerationRequest) -> Result<GenerationResponse> {
            std::future::pending().await
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            self.0
        }

        fn model(&self) -> &str {
            "hanging"
        }
    }

    /// Three hanging tiers at the production per-call timeout
    fn hanging_server() -> OrchestratorServer {
        let config = OrchestratorConfig::default();
        let timeout = Duration::from_secs(config.generation.provider_timeout_secs);
        let mut generation = FallbackChain::new(Capability::Generation, timeout);
        let tiers = [("primary", "gateway"), ("secondary", "gemini"), ("local", "ollama")];
        for (label, name) in tiers {
            generation.push_tier(label, Arc::new(Hanging(name)) as Arc<dyn LlmProvider>);
        }
        let capabilities = Capabilities::new(
            Arc::new(generation),
            retrieval_chain(FixedRetriever::with(passages(5))),
        );
        let orchestrator = Orchestrator::new(&config, capabilities);
        OrchestratorServer::with_state(AppState::with_orchestrator(config, orchestrator))
    }

    fn server(llms: Vec<Arc<ScriptedLlm>>) -> OrchestratorServer {
        let config = OrchestratorConfig::default();
        let capabilities = Capabilities::new(
            generation_chain(llms),
            retrieval_chain(FixedRetriever::with(passages(5))),
        );
        let orchestrator = Orchestrator::new(&config, capabilities);
        OrchestratorServer::with_state(AppState::with_orchestrator(config, orchestrator))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_query(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/query")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_query_returns_wire_shape() {
        let router = server(vec![ScriptedLlm::replying("gateway", vec!["AI is a field of study."])])
            .build_router();

        let response = router
            .oneshot(post_query(r#"{"query": "What is AI?", "mode": "phase1"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["answer"], "AI is a field of study.");
        assert_eq!(body["pipelineInfo"], "Phase 1: Basic A2A");
        assert!(body["thinkingSteps"].as_array().unwrap().len() >= 4);
        assert_eq!(body["sources"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_mode_is_bad_request() {
        let router = server(vec![ScriptedLlm::replying("gateway", vec!["ok"])]).build_router();

        let response = router
            .oneshot(post_query(r#"{"query": "What is AI?", "mode": "turbo"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "invalid_input");
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_readiness_requires_healthy_generation_tier() {
        let ready = server(vec![ScriptedLlm::replying("gateway", vec!["ok"])]).build_router();
        let response = ready.oneshot(get("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ready"], true);
        assert_eq!(body["generation"][0]["provider"], "gateway");
        assert_eq!(body["retrieval"][0]["healthy"], true);

        let not_ready = server(Vec::new()).build_router();
        let response = not_ready.oneshot(get("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_readiness_reports_unhealthy_tiers() {
        let router = server(vec![
            ScriptedLlm::failing("gateway"),
            ScriptedLlm::failing("gemini"),
        ])
        .build_router();

        let response = router.oneshot(get("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_json(response).await;
        assert_eq!(body["ready"], false);
        let tiers = body["generation"].as_array().unwrap();
        assert_eq!(tiers.len(), 2);
        assert!(tiers.iter().all(|t| t["healthy"] == false));
        assert_eq!(tiers[1]["tier"], "secondary");
    }

    #[tokio::test]
    async fn test_health_reports_service() {
        let router = server(vec![ScriptedLlm::replying("gateway", vec!["ok"])]).build_router();
        let response = router.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "rag-orchestrator");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_request_timeout_covers_worst_case() {
        let slow = hanging_server();
        let worst = slow.state.orchestrator().worst_case_latency();
        assert!(worst > Duration::from_secs(slow.config.server.request_timeout_secs));
        assert_eq!(slow.request_timeout(), worst + TIMEOUT_HEADROOM);

        let fast = server(vec![ScriptedLlm::replying("gateway", vec!["ok"])]);
        assert_eq!(
            fast.request_timeout(),
            Duration::from_secs(fast.config.server.request_timeout_secs)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_providers_still_get_degraded_answer() {
        let router = hanging_server().build_router();

        let response = router
            .oneshot(post_query(r#"{"query": "What is AI?", "mode": "phase3"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["answer"], DEGRADED_ANSWER);
        assert_eq!(body["pipelineInfo"], "Phase 3: Self-Refinement");
    }

    #[tokio::test]
    async fn test_pipelines_listing() {
        let router = server(vec![ScriptedLlm::replying("gateway", vec!["ok"])]).build_router();
        let response = router
            .oneshot(get("/api/pipelines"))
            .await
            .unwrap();

        let body = body_json(response).await;
        let pipelines = body["pipelines"].as_array().unwrap();
        assert_eq!(pipelines.len(), 3);
        assert_eq!(pipelines[2]["name"], "Phase 3: Self-Refinement");
        assert_eq!(pipelines[2]["maxRefinements"], 3);
        assert_eq!(body["defaultMode"], "auto");
    }
}
