//! OpenAI-compatible chat surface proxied straight to the gateway tier
//!
//! These routes bypass retrieval and the pipelines. Gateway failures are
//! answered in-band so chat clients always receive a completion.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::providers::gateway::{DEFAULT_GATEWAY_MODEL, GATEWAY_MODELS};
use crate::providers::{flatten_messages, ChatMessage, GenerationRequest};
use crate::server::state::AppState;

/// Model advertised when no gateway key is configured
const KEYLESS_MODEL: &str = "gpt-4o-mini";

fn default_model() -> String {
    DEFAULT_GATEWAY_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.7
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default = "default_model")]
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Accepted for compatibility; completions are always returned whole
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

#[derive(Debug, Serialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: &'static str,
}

/// Whitespace word counts, not tokenizer tokens
#[derive(Debug, Serialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

fn words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// POST /v1/chat/completions - Chat completion through the gateway
pub async fn chat_completions(
    State(state): State<AppState>,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Json<ChatCompletionResponse>> {
    let Some(provider) = state.orchestrator().capabilities().chat.clone() else {
        return Err(Error::Config("Gateway API key not configured".to_string()));
    };
    if request.messages.is_empty() {
        return Err(Error::invalid_input("messages must not be empty"));
    }
    if request.stream {
        tracing::debug!("Streaming requested; returning a single completion");
    }

    let max_tokens = request
        .max_tokens
        .unwrap_or(state.config().generation.max_tokens);
    let prompt_tokens = words(&flatten_messages(&request.messages));
    let generation =
        GenerationRequest::from_messages(request.messages, request.temperature, max_tokens)
            .with_model(Some(request.model.clone()));

    let content = match provider.generate(&generation).await {
        Ok(response) => response.text,
        Err(e) => {
            tracing::warn!("Gateway chat completion failed: {}", e);
            format!(
                "The gateway is currently unavailable (Error: {}). \
                 Please check the API configuration.",
                e
            )
        }
    };

    let created = chrono::Utc::now().timestamp();
    let completion_tokens = words(&content);
    Ok(Json(ChatCompletionResponse {
        id: format!("chatcmpl-{}", created),
        object: "chat.completion",
        created,
        model: request.model,
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage::new("assistant", content),
            finish_reason: "stop",
        }],
        usage: Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        },
    }))
}

#[derive(Debug, Serialize)]
pub struct ModelCard {
    pub id: &'static str,
    pub object: &'static str,
    pub created: i64,
    pub owned_by: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<ModelCard>,
}

/// GET /v1/models - Models reachable through the chat surface
pub async fn list_models(State(state): State<AppState>) -> Json<ModelList> {
    let models: &[&'static str] = if state.orchestrator().capabilities().chat.is_some() {
        GATEWAY_MODELS
    } else {
        &[KEYLESS_MODEL]
    };

    let created = chrono::Utc::now().timestamp();
    Json(ModelList {
        object: "list",
        data: models
            .iter()
            .copied()
            .map(|id| ModelCard {
                id,
                object: "model",
                created,
                owned_by: "1minai",
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::context::Capabilities;
    use crate::orchestrator::Orchestrator;
    use crate::server::OrchestratorServer;
    use crate::stages::testing::{
        generation_chain, passages, retrieval_chain, FixedRetriever, ScriptedLlm,
    };
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router(chat: Option<Arc<ScriptedLlm>>) -> axum::Router {
        let config = OrchestratorConfig::default();
        let mut capabilities = Capabilities::new(
            generation_chain(vec![ScriptedLlm::replying("gemini", vec!["pipeline answer"])]),
            retrieval_chain(FixedRetriever::with(passages(3))),
        );
        if let Some(chat) = chat {
            capabilities = capabilities.with_chat(chat);
        }
        let orchestrator = Orchestrator::new(&config, capabilities);
        OrchestratorServer::with_state(AppState::with_orchestrator(config, orchestrator))
            .build_router()
    }

    fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_chat_completion_shape() {
        let gateway =
            ScriptedLlm::replying("1minai-gateway", vec!["Retrieval augmented generation."]);
        let response = router(Some(gateway.clone()))
            .oneshot(post(
                "/v1/chat/completions",
                serde_json::json!({
                    "model": "gpt-4o",
                    "messages": [
                        {"role": "system", "content": "Be brief."},
                        {"role": "user", "content": "What is RAG?"}
                    ]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["object"], "chat.completion");
        assert_eq!(body["model"], "gpt-4o");
        assert!(body["id"].as_str().unwrap().starts_with("chatcmpl-"));
        assert_eq!(body["choices"][0]["message"]["role"], "assistant");
        assert_eq!(body["choices"][0]["message"]["content"], "Retrieval augmented generation.");
        assert_eq!(body["choices"][0]["finish_reason"], "stop");
        assert_eq!(body["usage"]["completion_tokens"], 3);
        assert_eq!(body["usage"]["prompt_tokens"], 7);
        assert_eq!(body["usage"]["total_tokens"], 10);
        assert_eq!(gateway.prompts.lock()[0], "User: What is RAG?");
    }

    #[tokio::test]
    async fn test_chat_alias_route() {
        let gateway = ScriptedLlm::replying("1minai-gateway", vec!["Hello."]);
        let response = router(Some(gateway))
            .oneshot(post(
                "/chat/completions",
                serde_json::json!({"messages": [{"role": "user", "content": "Hi"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["model"], DEFAULT_GATEWAY_MODEL);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_answered_in_band() {
        let response = router(Some(ScriptedLlm::failing("1minai-gateway")))
            .oneshot(post(
                "/v1/chat/completions",
                serde_json::json!({"messages": [{"role": "user", "content": "Hi"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        let content = body["choices"][0]["message"]["content"].as_str().unwrap();
        assert!(content.contains("currently unavailable"));
        assert!(content.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_chat_without_gateway_key() {
        let response = router(None)
            .oneshot(post(
                "/v1/chat/completions",
                serde_json::json!({"messages": [{"role": "user", "content": "Hi"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_model_listing() {
        let get = || Request::builder().uri("/v1/models").body(Body::empty()).unwrap();

        let body = json(
            router(Some(ScriptedLlm::replying("1minai-gateway", vec!["ok"])))
                .oneshot(get())
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body["object"], "list");
        assert_eq!(body["data"].as_array().unwrap().len(), GATEWAY_MODELS.len());
        assert_eq!(body["data"][0]["owned_by"], "1minai");

        let body = json(router(None).oneshot(get()).await.unwrap()).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["id"], KEYLESS_MODEL);
    }
}
