//! TOML configuration.
//!
//! Loaded once per command by [`load_config`], which parses the file and
//! rejects settings the pipeline cannot run with. See
//! `config/hrag.example.toml` for every option.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use hybrid_rag_core::embedding::{EmbeddingLimits, DEFAULT_BATCH_SIZE, DEFAULT_MAX_INPUT_TOKENS};
use hybrid_rag_core::fusion::{FusionWeights, DEFAULT_KEYWORD_WEIGHT, DEFAULT_VECTOR_WEIGHT};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub stores: StoresConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Required by `ask`; `search` works without it.
    #[serde(default)]
    pub generation: Option<GenerationConfig>,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// One SQLite file per index so each can fail on its own.
#[derive(Debug, Deserialize, Clone)]
pub struct StoresConfig {
    pub vector_path: PathBuf,
    pub keyword_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    400
}
fn default_chunk_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"` (any OpenAI-compatible server, e.g. LiteLLM) or `"ollama"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Base URL; defaults per provider.
    #[serde(default)]
    pub url: Option<String>,
    pub model: String,
    pub dims: usize,
    /// Name of the environment variable holding the API key, if any.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl EmbeddingConfig {
    pub fn base_url(&self) -> &str {
        match (self.url.as_deref(), self.provider.as_str()) {
            (Some(url), _) => url.trim_end_matches('/'),
            (None, "ollama") => "http://localhost:11434",
            (None, _) => "https://api.openai.com/v1",
        }
    }

    pub fn limits(&self) -> EmbeddingLimits {
        EmbeddingLimits::from_token_limit(self.max_input_tokens, self.batch_size)
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_max_input_tokens() -> usize {
    DEFAULT_MAX_INPUT_TOKENS
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_weight_vector")]
    pub weight_vector: f64,
    #[serde(default = "default_weight_keyword")]
    pub weight_keyword: f64,
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    /// Per-source retrieval timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            weight_vector: default_weight_vector(),
            weight_keyword: default_weight_keyword(),
            default_top_k: default_top_k(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl RetrievalConfig {
    pub fn weights(&self) -> Result<FusionWeights> {
        Ok(FusionWeights::new(self.weight_vector, self.weight_keyword)?)
    }
}

fn default_weight_vector() -> f64 {
    DEFAULT_VECTOR_WEIGHT
}
fn default_weight_keyword() -> f64 {
    DEFAULT_KEYWORD_WEIGHT
}
fn default_top_k() -> usize {
    5
}
fn default_timeout_ms() -> u64 {
    10_000
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    pub url: String,
    pub model: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_temperature() -> f32 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_max_file_bytes() -> u64 {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ObservabilityConfig {
    /// Webhook receiving one JSON event per answered query.
    #[serde(default)]
    pub trace_url: Option<String>,
}

/// Read an API key from the environment variable named in config.
///
/// `None` means the endpoint is called without authentication.
pub fn api_key_from_env(var: Option<&str>) -> Result<Option<String>> {
    match var {
        None => Ok(None),
        Some(name) => match std::env::var(name) {
            Ok(key) if !key.is_empty() => Ok(Some(key)),
            _ => bail!("{} environment variable not set", name),
        },
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be openai or ollama.",
            other
        ),
    }
    if config.embedding.dims == 0 {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.model.trim().is_empty() {
        bail!("embedding.model must not be empty");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.max_input_tokens == 0 {
        bail!("embedding.max_input_tokens must be > 0");
    }

    // Validate retrieval
    config
        .retrieval
        .weights()
        .context("retrieval.weight_vector / retrieval.weight_keyword")?;
    if config.retrieval.default_top_k < 1 {
        bail!("retrieval.default_top_k must be >= 1");
    }
    if config.retrieval.timeout_ms == 0 {
        bail!("retrieval.timeout_ms must be > 0");
    }

    if let Some(generation) = &config.generation {
        if !(0.0..=2.0).contains(&generation.temperature) {
            bail!("generation.temperature must be in [0.0, 2.0]");
        }
    }

    if config.ingest.max_file_bytes == 0 {
        bail!("ingest.max_file_bytes must be > 0");
    }

    Ok(config)
}
