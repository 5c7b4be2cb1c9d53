//! Configuration for the orchestration engine

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::pipeline::PipelineKind;

/// Main orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrchestratorConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Query analysis configuration
    #[serde(default)]
    pub query: QueryConfig,
    /// Pipeline selection heuristics
    #[serde(default)]
    pub selector: SelectorConfig,
    /// Critique scoring thresholds
    #[serde(default)]
    pub critique: CritiqueConfig,
    /// Retrieval breadth and refinement bound per pipeline variant
    #[serde(default)]
    pub pipelines: PipelinesConfig,
    /// Shared generation parameters
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Tier 1: multi-model gateway
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Tier 2: Gemini API
    #[serde(default)]
    pub gemini: GeminiConfig,
    /// Tier 3: local Ollama
    #[serde(default)]
    pub ollama: OllamaConfig,
    /// Retrieval backend
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl OrchestratorConfig {
    /// Load configuration from an optional TOML file, then apply environment overrides.
    ///
    /// Without an explicit path, `<config dir>/rag-orchestrator/config.toml` is used
    /// when it exists; otherwise defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(|| {
            Self::default_path().filter(|p| p.exists())
        });

        let mut config = match path {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                let raw = std::fs::read_to_string(&path)?;
                toml::from_str::<Self>(&raw)?
            }
            None => Self::default(),
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Default configuration file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("rag-orchestrator").join("config.toml"))
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ONEMINAI_API_KEY").filter(|v| !v.is_empty()) {
            self.gateway.api_key = Some(key);
        }
        if let Some(url) = lookup("LITELLM_BASE_URL").filter(|v| !v.is_empty()) {
            self.gateway.base_url = url;
        }
        if let Some(key) = lookup("GEMINI_API_KEY").filter(|v| !v.is_empty()) {
            self.gemini.api_key = Some(key);
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL").filter(|v| !v.is_empty()) {
            self.ollama.base_url = url;
        }
        if let Some(url) = lookup("QDRANT_URL").filter(|v| !v.is_empty()) {
            self.retrieval.qdrant_url = url;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Reject configurations that cannot produce a working pipeline
    pub fn validate(&self) -> Result<()> {
        for kind in PipelineKind::ALL {
            if self.pipelines.profile(kind).retrieval_k == 0 {
                return Err(Error::Config(format!(
                    "retrieval_k for {} must be positive",
                    kind.mode_name()
                )));
            }
        }
        for kind in PipelineKind::ALL {
            let max = self.pipelines.profile(kind).max_refinements;
            if max > kind.refinement_cap() {
                return Err(Error::Config(format!(
                    "max_refinements for {} must not exceed {}",
                    kind.mode_name(),
                    kind.refinement_cap()
                )));
            }
        }
        if self.retrieval.embedding_dimensions == 0 {
            return Err(Error::Config(
                "retrieval.embedding_dimensions must be positive".to_string(),
            ));
        }
        if self.critique.refine_below > 10 || self.critique.accept_at > 10 {
            return Err(Error::Config(
                "critique thresholds must lie within 0-10".to_string(),
            ));
        }
        if self.critique.min_length > self.critique.good_length {
            return Err(Error::Config(
                "critique.min_length must not exceed critique.good_length".to_string(),
            ));
        }
        if self.selector.simple_max_words >= self.selector.complex_min_words {
            return Err(Error::Config(
                "selector.simple_max_words must be below selector.complex_min_words".to_string(),
            ));
        }
        Ok(())
    }
}

/// Deployment environment, which decides whether local backends are reachable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    /// Developer machine or self-managed host
    Local,
    /// Managed hosting platform (no local model server)
    Hosted { platform: String },
}

impl Deployment {
    /// Detect the deployment environment from platform variables
    pub fn detect() -> Self {
        Self::detect_from(|key| std::env::var(key).ok())
    }

    fn detect_from(lookup: impl Fn(&str) -> Option<String>) -> Self {
        if lookup("RENDER_SERVICE_NAME").is_some() {
            Deployment::Hosted {
                platform: "render".to_string(),
            }
        } else if lookup("RAILWAY_ENVIRONMENT").is_some() {
            Deployment::Hosted {
                platform: "railway".to_string(),
            }
        } else {
            Deployment::Local
        }
    }

    /// Whether local/offline providers may be used
    pub fn allows_local_models(&self) -> bool {
        matches!(self, Deployment::Local)
    }
}

impl std::fmt::Display for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Deployment::Local => f.write_str("local"),
            Deployment::Hosted { platform } => f.write_str(platform),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Upper bound for one query request in seconds
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            request_timeout_secs: 300,
        }
    }
}

/// Query analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Queries longer than this many characters always need retrieval
    pub retrieval_length_threshold: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            retrieval_length_threshold: 50,
        }
    }
}

/// Pipeline selection heuristics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Plain queries with at most this many words go to single-pass
    pub simple_max_words: usize,
    /// Queries with more words than this go to iterative refinement
    pub complex_min_words: usize,
    /// Queries longer than this many characters go to iterative refinement
    pub complex_min_chars: usize,
    /// Comparison and analysis keywords marking a complex query
    #[serde(default = "default_complex_keywords")]
    pub complex_keywords: Vec<String>,
}

fn default_complex_keywords() -> Vec<String> {
    [
        "compare",
        "comparison",
        "contrast",
        "versus",
        "vs",
        "analyze",
        "analyse",
        "analysis",
        "evaluate",
        "advantages",
        "disadvantages",
        "pros and cons",
        "trade-offs",
        "tradeoffs",
        "difference between",
        "differences",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            simple_max_words: 4,
            complex_min_words: 10,
            complex_min_chars: 150,
            complex_keywords: default_complex_keywords(),
        }
    }
}

/// Critique scoring thresholds (0-10 scale)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CritiqueConfig {
    /// Answers shorter than this many characters are penalized
    pub min_length: usize,
    /// Answers at least this long are rewarded
    pub good_length: usize,
    /// Evaluate-once refines when the score is below this
    pub refine_below: u8,
    /// Iterative refinement accepts an answer at or above this
    pub accept_at: u8,
}

impl Default for CritiqueConfig {
    fn default() -> Self {
        Self {
            min_length: 50,
            good_length: 100,
            refine_below: 7,
            accept_at: 8,
        }
    }
}

/// Retrieval breadth and refinement bound for one pipeline variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineProfile {
    /// Number of passages requested from retrieval
    pub retrieval_k: usize,
    /// Maximum number of refine calls
    pub max_refinements: usize,
}

/// Profiles for every pipeline variant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelinesConfig {
    pub single_pass: PipelineProfile,
    pub evaluate_once: PipelineProfile,
    pub iterative_refine: PipelineProfile,
}

impl PipelinesConfig {
    /// Profile for a pipeline variant
    pub fn profile(&self, kind: PipelineKind) -> PipelineProfile {
        match kind {
            PipelineKind::SinglePass => self.single_pass,
            PipelineKind::EvaluateOnce => self.evaluate_once,
            PipelineKind::IterativeRefine => self.iterative_refine,
        }
    }
}

impl Default for PipelinesConfig {
    fn default() -> Self {
        Self {
            single_pass: PipelineProfile {
                retrieval_k: 3,
                max_refinements: 0,
            },
            evaluate_once: PipelineProfile {
                retrieval_k: 5,
                max_refinements: 1,
            },
            iterative_refine: PipelineProfile {
                retrieval_k: 8,
                max_refinements: 3,
            },
        }
    }
}

/// Shared generation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Persona / system prompt sent with every request
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Timeout for a single provider call in seconds
    pub provider_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
            system_prompt: None,
            provider_timeout_secs: 60,
        }
    }
}

/// Multi-model gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway base URL
    #[serde(default = "default_gateway_url")]
    pub base_url: String,
    /// API key (tier is skipped when absent)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Requested model (mapped to a gateway model name)
    #[serde(default = "default_gateway_model")]
    pub model: String,
}

fn default_gateway_url() -> String {
    "https://api.1min.ai".to_string()
}

fn default_gateway_model() -> String {
    "gemini-2.0-flash-lite".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_url(),
            api_key: None,
            model: default_gateway_model(),
        }
    }
}

/// Gemini API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API base URL
    #[serde(default = "default_gemini_url")]
    pub base_url: String,
    /// API key (tier is skipped when absent)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model name
    #[serde(default = "default_gemini_model")]
    pub model: String,
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_url(),
            api_key: None,
            model: default_gemini_model(),
        }
    }
}

/// Ollama configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Register Ollama as the local generation tier
    pub enabled: bool,
    /// Ollama base URL
    pub base_url: String,
    /// Generation model name
    pub generate_model: String,
    /// Embedding model name
    pub embed_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_string(),
            generate_model: "phi3".to_string(),
            embed_model: "nomic-embed-text".to_string(),
        }
    }
}

/// Vector index backend
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalBackend {
    /// Qdrant REST API
    #[default]
    Qdrant,
    /// In-process cosine similarity store
    Memory,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Vector index backend
    #[serde(default)]
    pub backend: RetrievalBackend,
    /// Qdrant base URL
    pub qdrant_url: String,
    /// Collection name
    pub collection: String,
    /// Expected embedding dimensions of the index
    pub embedding_dimensions: usize,
    /// Payload key that holds the passage text
    pub content_field: String,
    /// Timeout for a single retrieval provider call in seconds
    pub provider_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: RetrievalBackend::Qdrant,
            qdrant_url: "http://localhost:6333".to_string(),
            collection: "documents".to_string(),
            embedding_dimensions: 768,
            content_field: "page_content".to_string(),
            provider_timeout_secs: 30,
        }
    }
}
