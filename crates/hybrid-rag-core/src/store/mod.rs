//! Index abstractions.
//!
//! Two independent stores back the pipeline: a [`VectorStore`] ranking by
//! embedding similarity and a [`KeywordStore`] ranking by lexical
//! relevance. Every read takes an [`OwnerScope`] and returns only that
//! owner's entries.
//!
//! Implementations must be `Send + Sync`; the SQLite-backed stores live in
//! the app crate and [`memory`] provides in-process versions.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{KeywordEntry, OwnerScope, StoreHit, VectorEntry};

/// Number of chunks stored for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCount {
    pub name: String,
    pub chunks: u64,
}

/// Embedding-similarity index.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Insert or replace entries by id |
/// | [`query`](VectorStore::query) | Top-k by cosine similarity within an owner |
/// | [`entries_for_source`](VectorStore::entries_for_source) | All entries of one source, by chunk index |
/// | [`count`](VectorStore::count) | Number of entries for an owner |
/// | [`heartbeat`](VectorStore::heartbeat) | Liveness check |
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert(&self, entries: &[VectorEntry]) -> Result<()>;

    /// Best-first hits; `score` is the cosine similarity.
    async fn query(&self, embedding: &[f32], k: usize, owner: &OwnerScope)
        -> Result<Vec<StoreHit>>;

    async fn entries_for_source(
        &self,
        owner: &OwnerScope,
        source_name: &str,
    ) -> Result<Vec<VectorEntry>>;

    async fn count(&self, owner: &OwnerScope) -> Result<u64>;

    async fn heartbeat(&self) -> Result<()>;
}

/// Lexical index.
#[async_trait]
pub trait KeywordStore: Send + Sync {
    /// Apply index settings: `text` searchable, `source_name` and `owner_id`
    /// filterable. Called once at setup; safe to repeat.
    async fn configure(&self) -> Result<()>;

    async fn upsert(&self, entries: &[KeywordEntry]) -> Result<()>;

    /// Best-first hits; higher `score` is more relevant.
    async fn query(&self, text: &str, k: usize, owner: &OwnerScope) -> Result<Vec<StoreHit>>;

    /// Chunk counts per source for an owner, sorted by source name.
    async fn source_counts(&self, owner: &OwnerScope) -> Result<Vec<SourceCount>>;

    async fn heartbeat(&self) -> Result<()>;
}

/// Lowercased alphanumeric terms of `text`, in order, duplicates kept.
///
/// Shared by the keyword stores so that queries and documents agree on
/// what a term is.
pub fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terms() {
        assert_eq!(
            terms("Hybrid-search, (BM25) & vectors!"),
            vec!["hybrid", "search", "bm25", "vectors"]
        );
        assert!(terms("  ?! ").is_empty());
        assert_eq!(terms("Ünïcode Wörds"), vec!["ünïcode", "wörds"]);
    }
}
