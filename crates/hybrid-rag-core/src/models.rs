//! Data models that flow through ingestion and retrieval.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Free-form metadata attached to chunks and hits.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata key holding the source file name.
pub const META_SOURCE: &str = "source";
/// Metadata key holding the chunk's position within its source.
pub const META_CHUNK_INDEX: &str = "chunk_index";
/// Metadata key holding the owning user's id.
pub const META_OWNER: &str = "owner_id";
/// Metadata key holding the chunk id.
pub const META_ID: &str = "doc_id";

/// The identity every read and write is scoped to.
///
/// Constructed once per request from the authenticated caller and passed
/// explicitly into every store and retriever call. An empty id is rejected,
/// so holding an `OwnerScope` proves the filter value is usable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerScope(String);

impl OwnerScope {
    pub fn new(owner_id: impl Into<String>) -> Result<Self> {
        let owner_id = owner_id.into();
        if owner_id.trim().is_empty() {
            return Err(Error::EmptyOwner);
        }
        Ok(Self(owner_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `metadata` carries this owner under [`META_OWNER`].
    pub fn owns(&self, metadata: &Metadata) -> bool {
        metadata.get(META_OWNER).and_then(|v| v.as_str()) == Some(self.as_str())
    }
}

impl fmt::Display for OwnerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One text segment produced by a [`DocumentParser`](crate::models::DocumentParser).
#[derive(Debug, Clone, Default)]
pub struct ParsedSegment {
    pub text: String,
    pub metadata: Metadata,
}

/// Turns raw file bytes into plain-text segments with source metadata.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, bytes: &[u8], filename: &str) -> Result<Vec<ParsedSegment>>;
}

/// A bounded piece of a source document, the unit both indexes store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub source_name: String,
    pub chunk_index: usize,
    pub owner_id: String,
    #[serde(default)]
    pub extra_metadata: Metadata,
}

impl Chunk {
    /// Full metadata: the parser's extra fields plus source, index, owner and id.
    pub fn metadata(&self) -> Metadata {
        let mut meta = self.extra_metadata.clone();
        meta.insert(META_SOURCE.into(), self.source_name.clone().into());
        meta.insert(META_CHUNK_INDEX.into(), self.chunk_index.into());
        meta.insert(META_OWNER.into(), self.owner_id.clone().into());
        meta.insert(META_ID.into(), self.id.clone().into());
        meta
    }
}

/// A row in the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    pub id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    /// Flattened metadata; scalar values only.
    pub metadata: Metadata,
}

impl VectorEntry {
    pub fn owner_id(&self) -> Option<&str> {
        self.metadata.get(META_OWNER).and_then(|v| v.as_str())
    }

    pub fn source_name(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE).and_then(|v| v.as_str())
    }

    pub fn chunk_index(&self) -> Option<usize> {
        self.metadata
            .get(META_CHUNK_INDEX)
            .and_then(|v| v.as_u64())
            .map(|i| i as usize)
    }
}

/// A row in the keyword index. Shares its `id` with the vector entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub id: String,
    pub text: String,
    pub source_name: String,
    pub chunk_index: usize,
    pub owner_id: String,
    /// Raw chunk metadata, nested values included.
    #[serde(default)]
    pub metadata: Metadata,
}

impl From<&Chunk> for KeywordEntry {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.clone(),
            text: chunk.text.clone(),
            source_name: chunk.source_name.clone(),
            chunk_index: chunk.chunk_index,
            owner_id: chunk.owner_id.clone(),
            metadata: chunk.metadata(),
        }
    }
}

/// A raw match returned by a store, best-first, before ranks are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    pub id: Option<String>,
    pub text: String,
    pub metadata: Metadata,
    /// Native relevance: cosine similarity or lexical score. Higher is better.
    pub score: f64,
}

/// Which index produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Vector,
    Keyword,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Vector => f.write_str("vector"),
            Origin::Keyword => f.write_str("keyword"),
        }
    }
}

/// A ranked hit from one retriever.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    pub id: Option<String>,
    pub text: String,
    pub metadata: Metadata,
    /// The store's native score; not comparable across origins.
    pub score: f64,
    /// 1-based position in the retriever's result list.
    pub rank: usize,
    pub origin: Origin,
}

/// A merged result produced by [`fuse`](crate::fusion::fuse).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    pub metadata: Metadata,
    pub fused_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_rank: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_rank: Option<usize>,
}
