//! In-memory [`VectorStore`] and [`KeywordStore`] implementations.
//!
//! Entries live in `HashMap`s behind `std::sync::RwLock`. Vector search is
//! brute-force cosine similarity; keyword search scores entries by the
//! number of query-term occurrences in their text.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{KeywordEntry, OwnerScope, StoreHit, VectorEntry};

use super::{terms, KeywordStore, SourceCount, VectorStore};

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

/// Sort best-first with the id as a stable tie-breaker, then keep `k`.
fn top_k(mut hits: Vec<StoreHit>, k: usize) -> Vec<StoreHit> {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    hits.truncate(k);
    hits
}

/// In-memory vector index.
#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<HashMap<String, VectorEntry>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total entries across all owners.
    pub fn len(&self) -> Result<usize> {
        Ok(read(&self.entries)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, entries: &[VectorEntry]) -> Result<()> {
        let mut stored = write(&self.entries)?;
        for entry in entries {
            stored.insert(entry.id.clone(), entry.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        owner: &OwnerScope,
    ) -> Result<Vec<StoreHit>> {
        let stored = read(&self.entries)?;
        let hits = stored
            .values()
            .filter(|e| e.owner_id() == Some(owner.as_str()))
            .map(|e| StoreHit {
                id: Some(e.id.clone()),
                text: e.text.clone(),
                metadata: e.metadata.clone(),
                score: cosine_similarity(embedding, &e.embedding) as f64,
            })
            .collect();
        Ok(top_k(hits, k))
    }

    async fn entries_for_source(
        &self,
        owner: &OwnerScope,
        source_name: &str,
    ) -> Result<Vec<VectorEntry>> {
        let stored = read(&self.entries)?;
        let mut entries: Vec<VectorEntry> = stored
            .values()
            .filter(|e| e.owner_id() == Some(owner.as_str()) && e.source_name() == Some(source_name))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.chunk_index());
        Ok(entries)
    }

    async fn count(&self, owner: &OwnerScope) -> Result<u64> {
        let stored = read(&self.entries)?;
        Ok(stored
            .values()
            .filter(|e| e.owner_id() == Some(owner.as_str()))
            .count() as u64)
    }

    async fn heartbeat(&self) -> Result<()> {
        read(&self.entries).map(|_| ())
    }
}

/// In-memory keyword index.
#[derive(Default)]
pub struct InMemoryKeywordStore {
    entries: RwLock<HashMap<String, KeywordEntry>>,
}

impl InMemoryKeywordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(read(&self.entries)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl KeywordStore for InMemoryKeywordStore {
    async fn configure(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, entries: &[KeywordEntry]) -> Result<()> {
        let mut stored = write(&self.entries)?;
        for entry in entries {
            stored.insert(entry.id.clone(), entry.clone());
        }
        Ok(())
    }

    async fn query(&self, text: &str, k: usize, owner: &OwnerScope) -> Result<Vec<StoreHit>> {
        let query_terms = terms(text);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let stored = read(&self.entries)?;
        let hits = stored
            .values()
            .filter(|e| e.owner_id == owner.as_str())
            .filter_map(|e| {
                let doc_terms = terms(&e.text);
                let score = query_terms
                    .iter()
                    .map(|q| doc_terms.iter().filter(|t| *t == q).count())
                    .sum::<usize>();
                (score > 0).then(|| StoreHit {
                    id: Some(e.id.clone()),
                    text: e.text.clone(),
                    metadata: e.metadata.clone(),
                    score: score as f64,
                })
            })
            .collect();
        Ok(top_k(hits, k))
    }

    async fn source_counts(&self, owner: &OwnerScope) -> Result<Vec<SourceCount>> {
        let stored = read(&self.entries)?;
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for e in stored.values().filter(|e| e.owner_id == owner.as_str()) {
            *counts.entry(e.source_name.as_str()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(name, chunks)| SourceCount {
                name: name.to_string(),
                chunks,
            })
            .collect())
    }

    async fn heartbeat(&self) -> Result<()> {
        read(&self.entries).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metadata, META_CHUNK_INDEX, META_OWNER, META_SOURCE};

    fn vector_entry(id: &str, owner: &str, source: &str, index: usize, v: Vec<f32>) -> VectorEntry {
        let mut metadata = Metadata::new();
        metadata.insert(META_OWNER.into(), owner.into());
        metadata.insert(META_SOURCE.into(), source.into());
        metadata.insert(META_CHUNK_INDEX.into(), index.into());
        VectorEntry {
            id: id.into(),
            embedding: v,
            text: format!("text of {}", id),
            metadata,
        }
    }

    fn keyword_entry(id: &str, owner: &str, source: &str, text: &str) -> KeywordEntry {
        KeywordEntry {
            id: id.into(),
            text: text.into(),
            source_name: source.into(),
            chunk_index: 0,
            owner_id: owner.into(),
            metadata: Metadata::new(),
        }
    }

    #[tokio::test]
    async fn test_vector_query_ranks_by_similarity_within_owner() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[
                vector_entry("a", "u1", "x.pdf", 0, vec![1.0, 0.0]),
                vector_entry("b", "u1", "x.pdf", 1, vec![0.7, 0.7]),
                vector_entry("c", "u2", "x.pdf", 0, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let owner = OwnerScope::new("u1").unwrap();
        let hits = store.query(&[1.0, 0.0], 10, &owner).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(hits[0].score > hits[1].score);

        assert_eq!(store.query(&[1.0, 0.0], 1, &owner).await.unwrap().len(), 1);
        assert_eq!(store.count(&owner).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_vector_upsert_replaces_by_id() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[vector_entry("a", "u1", "x.pdf", 0, vec![1.0])])
            .await
            .unwrap();
        store
            .upsert(&[vector_entry("a", "u1", "x.pdf", 0, vec![2.0])])
            .await
            .unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_entries_for_source_ordered_by_index() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[
                vector_entry("c2", "u1", "x.pdf", 2, vec![1.0]),
                vector_entry("c0", "u1", "x.pdf", 0, vec![1.0]),
                vector_entry("y0", "u1", "y.pdf", 0, vec![1.0]),
                vector_entry("c1", "u2", "x.pdf", 1, vec![1.0]),
            ])
            .await
            .unwrap();
        let owner = OwnerScope::new("u1").unwrap();
        let entries = store.entries_for_source(&owner, "x.pdf").await.unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c0", "c2"]);
    }

    #[tokio::test]
    async fn test_keyword_query_scores_term_occurrences() {
        let store = InMemoryKeywordStore::new();
        store
            .upsert(&[
                keyword_entry("a", "u1", "x.pdf", "rust rust and more rust"),
                keyword_entry("b", "u1", "x.pdf", "a little rust"),
                keyword_entry("c", "u1", "x.pdf", "python only"),
                keyword_entry("d", "u2", "x.pdf", "rust rust rust rust"),
            ])
            .await
            .unwrap();

        let owner = OwnerScope::new("u1").unwrap();
        let hits = store.query("Rust?", 10, &owner).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(store.query("?!", 10, &owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_source_counts() {
        let store = InMemoryKeywordStore::new();
        store
            .upsert(&[
                keyword_entry("1", "u1", "b.pdf", "x"),
                keyword_entry("2", "u1", "a.pdf", "x"),
                keyword_entry("3", "u1", "b.pdf", "x"),
                keyword_entry("4", "u2", "c.pdf", "x"),
            ])
            .await
            .unwrap();
        let owner = OwnerScope::new("u1").unwrap();
        let counts = store.source_counts(&owner).await.unwrap();
        assert_eq!(
            counts,
            vec![
                SourceCount {
                    name: "a.pdf".into(),
                    chunks: 1
                },
                SourceCount {
                    name: "b.pdf".into(),
                    chunks: 2
                },
            ]
        );
    }
}
