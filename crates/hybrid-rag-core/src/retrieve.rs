//! Per-index retrievers.
//!
//! Each retriever queries one store on behalf of one owner and returns a
//! best-first list with 1-based ranks, ready for [`fuse`](crate::fusion::fuse).
//! Hits whose metadata does not carry the caller's owner id are dropped
//! before ranks are assigned.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::EmbeddingClient;
use crate::models::{Origin, OwnerScope, RetrievalHit, StoreHit};
use crate::store::{KeywordStore, VectorStore};

/// One ranked source of hits.
#[async_trait]
pub trait Retriever: Send + Sync {
    fn origin(&self) -> Origin;

    /// At most `k` hits for `owner`, best first.
    async fn search(&self, query: &str, k: usize, owner: &OwnerScope) -> Result<Vec<RetrievalHit>>;
}

/// Semantic retrieval: embeds the query and searches the vector store.
#[derive(Clone)]
pub struct VectorRetriever {
    store: Arc<dyn VectorStore>,
    embedder: EmbeddingClient,
}

impl VectorRetriever {
    pub fn new(store: Arc<dyn VectorStore>, embedder: EmbeddingClient) -> Self {
        Self { store, embedder }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    fn origin(&self) -> Origin {
        Origin::Vector
    }

    async fn search(&self, query: &str, k: usize, owner: &OwnerScope) -> Result<Vec<RetrievalHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed_query(query).await?;
        let hits = self.store.query(&embedding, k, owner).await?;
        Ok(rank_hits(hits, k, owner, Origin::Vector))
    }
}

/// Lexical retrieval over the keyword store.
#[derive(Clone)]
pub struct KeywordRetriever {
    store: Arc<dyn KeywordStore>,
}

impl KeywordRetriever {
    pub fn new(store: Arc<dyn KeywordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    fn origin(&self) -> Origin {
        Origin::Keyword
    }

    async fn search(&self, query: &str, k: usize, owner: &OwnerScope) -> Result<Vec<RetrievalHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let hits = self.store.query(query, k, owner).await?;
        Ok(rank_hits(hits, k, owner, Origin::Keyword))
    }
}

/// Keep `owner`'s hits in store order, truncate to `k`, and number them from 1.
pub fn rank_hits(hits: Vec<StoreHit>, k: usize, owner: &OwnerScope, origin: Origin) -> Vec<RetrievalHit> {
    hits.into_iter()
        .filter(|h| owner.owns(&h.metadata))
        .take(k)
        .enumerate()
        .map(|(i, h)| RetrievalHit {
            id: h.id,
            text: h.text,
            metadata: h.metadata,
            score: h.score,
            rank: i + 1,
            origin,
        })
        .collect()
}
