//! Remote embedding backends.
//!
//! Implements [`EmbeddingBackend`] for:
//! - **[`OpenAiBackend`]**: `POST {url}/embeddings` on OpenAI or any
//!   compatible server (LiteLLM, vLLM), with optional bearer auth.
//! - **[`OllamaBackend`]**: `POST {url}/api/embed` on a local Ollama.
//!
//! Both retry transient failures through [`http::post_json`]. Truncation
//! and batching happen one layer up, in
//! [`EmbeddingClient`](hybrid_rag_core::embedding::EmbeddingClient).
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use hybrid_rag::config::load_config;
//! # use hybrid_rag::embedding::create_client;
//! let config = load_config(std::path::Path::new("config/hrag.toml")).unwrap();
//! let client = create_client(&config.embedding).unwrap();
//! println!("embedding with {} ({} dims)", client.model_name(), client.dims());
//! ```

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use hybrid_rag_core::embedding::{EmbeddingBackend, EmbeddingClient};

use crate::config::{api_key_from_env, EmbeddingConfig};
use crate::http;

/// Build the configured backend wrapped in an [`EmbeddingClient`].
pub fn create_client(config: &EmbeddingConfig) -> Result<EmbeddingClient> {
    Ok(EmbeddingClient::new(create_backend(config)?, config.limits()))
}

pub fn create_backend(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingBackend>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiBackend::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaBackend::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ OpenAI-compatible ============

pub struct OpenAiBackend {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAiBackend {
    /// # Errors
    ///
    /// Fails if `api_key_env` names a variable that is not set.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: format!("{}/embeddings", config.base_url()),
            api_key: api_key_from_env(config.api_key_env.as_deref())?,
            model: config.model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = http::post_json(
            &self.client,
            &self.url,
            self.api_key.as_deref(),
            &body,
            self.max_retries,
            "Embeddings",
        )
        .await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid embeddings response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| anyhow!("Invalid embeddings response: missing embedding"))?;
        indexed.push((index, parse_vector(embedding)?));
    }

    // Sort by index to ensure order matches input
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Requires Ollama running with the model pulled (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaBackend {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OllamaBackend {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: format!("{}/api/embed", config.base_url()),
            model: config.model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = http::post_json(
            &self.client,
            &self.url,
            None,
            &body,
            self.max_retries,
            "Ollama",
        )
        .await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(parse_vector)
        .collect()
}

fn parse_vector(value: &serde_json::Value) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| anyhow!("Invalid embeddings response: embedding is not an array"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow!("Invalid embeddings response: non-numeric value"))
        })
        .collect()
}
