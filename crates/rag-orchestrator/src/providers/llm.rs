//! LLM provider trait for text generation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One chat turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == "system"
    }
}

/// Flatten chat turns into one role-prefixed prompt, turns separated by a blank line.
///
/// Unknown roles are treated as the user.
pub fn flatten_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| match m.role.as_str() {
            "system" => format!("System: {}", m.content),
            "assistant" => format!("Assistant: {}", m.content),
            _ => format!("User: {}", m.content),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Generation capability request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// User prompt
    pub prompt: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Optional system / persona prompt
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Original turns when the caller sent a conversation; empty for plain prompts
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Model requested by the caller, for providers serving several models
    #[serde(default)]
    pub model: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            max_tokens,
            system_prompt: None,
            messages: Vec::new(),
            model: None,
        }
    }

    /// Request from chat turns.
    ///
    /// System turns become the system prompt and the remaining turns are
    /// flattened into the prompt, so single-prompt providers still see the
    /// whole conversation.
    pub fn from_messages(messages: Vec<ChatMessage>, temperature: f32, max_tokens: u32) -> Self {
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.is_system())
            .map(|m| m.content.as_str())
            .collect();
        let system_prompt = (!system.is_empty()).then(|| system.join("\n\n"));
        let turns: Vec<ChatMessage> = messages.iter().filter(|m| !m.is_system()).cloned().collect();

        Self {
            prompt: flatten_messages(&turns),
            temperature,
            max_tokens,
            system_prompt,
            messages,
            model: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// Generation capability response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,
}

/// Trait for prompt-to-text generation backends
///
/// Implementations:
/// - `GatewayClient`: multi-model gateway (primary tier)
/// - `GeminiClient`: Gemini API (secondary tier)
/// - `OllamaProvider`: local Ollama server (local tier)
///
/// Implementations normalize every transport, status and payload failure
/// into `Error::GenerationFailed` and never retry internally.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate text for a prompt
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
