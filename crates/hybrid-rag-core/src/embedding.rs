//! Embedding backend trait, the batching client, and vector utilities.
//!
//! [`EmbeddingBackend`] is the seam to a remote embedding service; the
//! OpenAI-compatible and Ollama implementations live in the `hybrid-rag`
//! app crate. [`EmbeddingClient`] wraps a backend with the input budget
//! and batching rules every caller shares:
//!
//! - texts longer than the character budget are truncated (and logged),
//! - batches are submitted strictly one after another,
//! - any failed batch fails the whole call with no partial output.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Character-per-token estimate used to turn a token limit into a character budget.
pub const CHARS_PER_TOKEN: usize = 4;
/// Default per-text token limit of the embedding model.
pub const DEFAULT_MAX_INPUT_TOKENS: usize = 200;
/// Default number of texts per backend request.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// A remote (or local) embedding model.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed one batch. Must return one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Input budget and batch size applied by [`EmbeddingClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingLimits {
    pub max_input_chars: usize,
    pub batch_size: usize,
}

impl EmbeddingLimits {
    pub fn from_token_limit(max_input_tokens: usize, batch_size: usize) -> Self {
        Self {
            max_input_chars: max_input_tokens.saturating_mul(CHARS_PER_TOKEN),
            batch_size: batch_size.max(1),
        }
    }
}

impl Default for EmbeddingLimits {
    fn default() -> Self {
        Self::from_token_limit(DEFAULT_MAX_INPUT_TOKENS, DEFAULT_BATCH_SIZE)
    }
}

/// Shared, read-only embedding handle.
#[derive(Clone)]
pub struct EmbeddingClient {
    backend: Arc<dyn EmbeddingBackend>,
    limits: EmbeddingLimits,
}

impl EmbeddingClient {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, limits: EmbeddingLimits) -> Self {
        Self { backend, limits }
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    pub fn dims(&self) -> usize {
        self.backend.dims()
    }

    pub fn limits(&self) -> EmbeddingLimits {
        self.limits
    }

    /// Embed `texts`, returning one vector per text in the same order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let prepared: Vec<String> = texts.iter().map(|t| self.prepare(t)).collect();
        let dims = self.backend.dims();
        let mut vectors = Vec::with_capacity(prepared.len());

        for (batch_index, batch) in prepared.chunks(self.limits.batch_size).enumerate() {
            debug!(batch_index, batch_size = batch.len(), "embedding batch");

            let fail = |message: String| Error::EmbeddingFailed {
                batch_index,
                batch_size: batch.len(),
                lengths: batch.iter().map(|t| t.chars().count()).collect(),
                message,
            };

            let result = self
                .backend
                .embed_batch(batch)
                .await
                .map_err(|e| fail(format!("{:#}", e)))?;

            if result.len() != batch.len() {
                return Err(fail(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    result.len()
                )));
            }
            if let Some(bad) = result.iter().find(|v| v.len() != dims) {
                return Err(fail(format!(
                    "expected {} dimensions, got {}",
                    dims,
                    bad.len()
                )));
            }

            vectors.extend(result);
        }

        Ok(vectors)
    }

    /// Embed a single query string.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let input = vec![text.to_string()];
        self.embed(&input)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingFailed {
                batch_index: 0,
                batch_size: 1,
                lengths: vec![text.chars().count()],
                message: "backend returned no vector".into(),
            })
    }

    fn prepare(&self, text: &str) -> String {
        let max_chars = self.limits.max_input_chars;
        let chars = text.chars().count();
        if chars <= max_chars {
            return text.to_string();
        }
        warn!(
            chars,
            estimated_tokens = chars / CHARS_PER_TOKEN,
            max_chars,
            "truncating embedding input"
        );
        truncate_chars(text, max_chars).to_string()
    }
}

/// The first `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use hybrid_rag_core::embedding::{blob_to_vec, vec_to_blob};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vec_to_blob`]. Trailing partial values are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty, mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
