//! Multi-model gateway client (primary generation tier)
//!
//! The gateway exposes many vendor models behind one `features` endpoint.
//! Requests carry a flattened, role-prefixed prompt and answers come back in
//! `aiRecord.aiRecordDetail.resultObject`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::error::{Error, Result};

use super::llm::{
    flatten_messages, ChatMessage, GenerationRequest, GenerationResponse, LlmProvider,
};
use super::transport_error;

/// Gateway model used when a requested name is unknown
pub const DEFAULT_GATEWAY_MODEL: &str = "gemini-2.0-flash-lite";

/// Models served through the gateway
pub const GATEWAY_MODELS: &[&str] = &[
    "gemini-2.0-flash-lite",
    "gemini-2.0-flash",
    "gemini-1.5-flash",
    "gemini-1.5-pro",
    "gpt-4o-mini",
    "gpt-4o",
    "claude-3-5-sonnet",
    "claude-3-haiku",
];

/// Map a requested model name (with or without the `1minai-` prefix) to a gateway model
pub fn map_model(requested: &str) -> &'static str {
    let bare = requested.strip_prefix("1minai-").unwrap_or(requested);
    GATEWAY_MODELS
        .iter()
        .find(|m| **m == bare)
        .copied()
        .unwrap_or(DEFAULT_GATEWAY_MODEL)
}

/// Gateway prompt for a request: the caller's chat turns when present,
/// otherwise the system prompt followed by the user prompt.
fn gateway_prompt(request: &GenerationRequest) -> String {
    if !request.messages.is_empty() {
        return flatten_messages(&request.messages);
    }

    let mut messages = Vec::with_capacity(2);
    if let Some(system) = request.system_prompt.as_deref() {
        messages.push(ChatMessage::new("system", system));
    }
    messages.push(ChatMessage::new("user", request.prompt.as_str()));
    flatten_messages(&messages)
}

#[derive(Serialize)]
struct FeatureRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    model: &'a str,
    #[serde(rename = "promptObject")]
    prompt_object: PromptObject,
}

#[derive(Serialize)]
struct PromptObject {
    prompt: String,
    #[serde(rename = "isMixed")]
    is_mixed: bool,
    #[serde(rename = "webSearch")]
    web_search: bool,
}

#[derive(Deserialize, Default)]
struct FeatureResponse {
    #[serde(rename = "aiRecord", default)]
    ai_record: AiRecord,
}

#[derive(Deserialize, Default)]
struct AiRecord {
    #[serde(rename = "aiRecordDetail", default)]
    detail: AiRecordDetail,
}

#[derive(Deserialize, Default)]
struct AiRecordDetail {
    #[serde(rename = "resultObject", default)]
    result_object: serde_json::Value,
}

impl FeatureResponse {
    fn into_text(self) -> Option<String> {
        let first = match self.ai_record.detail.result_object {
            serde_json::Value::Array(items) => items.into_iter().next()?,
            _ => return None,
        };
        let text = match first {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => return None,
            other => other.to_string(),
        };
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Gateway client
pub struct GatewayClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: &'static str,
}

impl GatewayClient {
    /// Create a gateway client; the tier is unusable without an API key
    pub fn new(config: &GatewayConfig, api_key: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: super::http_client(timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: map_model(&config.model),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/features", self.base_url)
    }

    fn masked_key(&self) -> String {
        let prefix: String = self.api_key.chars().take(6).collect();
        format!("{}...", prefix)
    }
}

#[async_trait]
impl LlmProvider for GatewayClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let model = request.model.as_deref().map(map_model).unwrap_or(self.model);
        let body = FeatureRequest {
            kind: "CHAT_WITH_AI",
            model,
            prompt_object: PromptObject {
                prompt: gateway_prompt(request),
                is_mixed: false,
                web_search: false,
            },
        };

        tracing::debug!(
            "Gateway request: model={}, key={}, prompt_chars={}",
            model,
            self.masked_key(),
            body.prompt_object.prompt.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::generation(transport_error("Gateway request failed", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::generation(format!(
                "Gateway returned HTTP {}: {}",
                status, text
            )));
        }

        let parsed: FeatureResponse = response
            .json()
            .await
            .map_err(|e| {
                Error::generation(transport_error("Failed to parse gateway response", e))
            })?;

        parsed
            .into_text()
            .map(|text| GenerationResponse { text })
            .ok_or_else(|| Error::generation("Gateway response contained no result"))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.api_key.is_empty())
    }

    fn name(&self) -> &str {
        "1minai-gateway"
    }

    fn model(&self) -> &str {
        self.model
    }
}
