//! Two-phase write of one chunk set into both indexes.
//!
//! The vector index is written first. The keyword index is written only if
//! the vector write succeeded, with the same ids. The outcome of each store
//! is reported separately; a keyword failure after a vector success is a
//! [`WriteStatus::Partial`] and must not be mistaken for success.
//!
//! Retrying after a partial write is safe: ids are deterministic, so both
//! stores overwrite instead of duplicating.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::models::{Chunk, KeywordEntry, Metadata, VectorEntry};
use crate::store::{KeywordStore, VectorStore};

/// What happened to one store during a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StoreOutcome {
    Written { count: usize },
    Failed { error: String },
    Skipped,
}

impl StoreOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, StoreOutcome::Written { .. })
    }
}

/// Overall result of a dual write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    /// Both stores hold every chunk.
    Complete,
    /// The vector store holds every chunk, the keyword store does not.
    Partial,
    /// Nothing was committed.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub ids: Vec<String>,
    pub vector: StoreOutcome,
    pub keyword: StoreOutcome,
}

impl WriteReport {
    pub fn status(&self) -> WriteStatus {
        match (self.vector.is_written(), self.keyword.is_written()) {
            (true, true) => WriteStatus::Complete,
            (true, false) => WriteStatus::Partial,
            _ => WriteStatus::Failed,
        }
    }
}

/// Writes chunks and their embeddings to both indexes.
#[derive(Clone)]
pub struct DualIndexWriter {
    vector: Arc<dyn VectorStore>,
    keyword: Arc<dyn KeywordStore>,
}

impl DualIndexWriter {
    pub fn new(vector: Arc<dyn VectorStore>, keyword: Arc<dyn KeywordStore>) -> Self {
        Self { vector, keyword }
    }

    /// Write `chunks` with the embedding at the same position.
    ///
    /// Returns an error only for mismatched input lengths, before any store
    /// is touched. Store failures are reported in the [`WriteReport`].
    pub async fn write(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<WriteReport> {
        if chunks.len() != embeddings.len() {
            return Err(Error::LengthMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }

        let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        let count = chunks.len();

        let vector_entries: Vec<VectorEntry> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorEntry {
                id: chunk.id.clone(),
                embedding: embedding.clone(),
                text: chunk.text.clone(),
                metadata: flatten_metadata(&chunk.metadata()),
            })
            .collect();

        let vector = match self.vector.upsert(&vector_entries).await {
            Ok(()) => StoreOutcome::Written { count },
            Err(e) => {
                error!(error = %format!("{:#}", e), count, "vector index write failed");
                StoreOutcome::Failed {
                    error: format!("{:#}", e),
                }
            }
        };

        let keyword = if vector.is_written() {
            let keyword_entries: Vec<KeywordEntry> = chunks.iter().map(KeywordEntry::from).collect();
            match self.keyword.upsert(&keyword_entries).await {
                Ok(()) => StoreOutcome::Written { count },
                Err(e) => {
                    error!(error = %format!("{:#}", e), count, "keyword index write failed");
                    StoreOutcome::Failed {
                        error: format!("{:#}", e),
                    }
                }
            }
        } else {
            StoreOutcome::Skipped
        };

        let report = WriteReport {
            ids,
            vector,
            keyword,
        };
        match report.status() {
            WriteStatus::Complete => info!(count, "wrote chunks to both indexes"),
            WriteStatus::Partial => warn!(
                count,
                "chunks are in the vector index but missing from the keyword index"
            ),
            WriteStatus::Failed => {}
        }
        Ok(report)
    }
}

/// Flatten nested objects into dotted keys; arrays and nulls are dropped.
///
/// `{"a": {"b": 1}, "tags": ["x"], "n": null}` becomes `{"a.b": 1}`.
pub fn flatten_metadata(metadata: &Metadata) -> Metadata {
    let mut out = Metadata::new();
    flatten_into(&mut out, None, metadata);
    out
}

fn flatten_into(out: &mut Metadata, prefix: Option<&str>, metadata: &Metadata) {
    for (key, value) in metadata {
        let key = match prefix {
            Some(p) => format!("{}.{}", p, key),
            None => key.clone(),
        };
        match value {
            serde_json::Value::Object(inner) => flatten_into(out, Some(&key), inner),
            serde_json::Value::Array(_) | serde_json::Value::Null => {}
            scalar => {
                out.insert(key, scalar.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::chunk_id;
    use crate::models::{OwnerScope, StoreHit};
    use crate::store::memory::{InMemoryKeywordStore, InMemoryVectorStore};
    use crate::store::SourceCount;
    use async_trait::async_trait;
    use serde_json::json;

    struct BrokenVectorStore;

    #[async_trait]
    impl VectorStore for BrokenVectorStore {
        async fn upsert(&self, _entries: &[VectorEntry]) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
        async fn query(
            &self,
            _embedding: &[f32],
            _k: usize,
            _owner: &OwnerScope,
        ) -> anyhow::Result<Vec<StoreHit>> {
            Ok(Vec::new())
        }
        async fn entries_for_source(
            &self,
            _owner: &OwnerScope,
            _source_name: &str,
        ) -> anyhow::Result<Vec<VectorEntry>> {
            Ok(Vec::new())
        }
        async fn count(&self, _owner: &OwnerScope) -> anyhow::Result<u64> {
            Ok(0)
        }
        async fn heartbeat(&self) -> anyhow::Result<()> {
            anyhow::bail!("down")
        }
    }

    struct BrokenKeywordStore;

    #[async_trait]
    impl KeywordStore for BrokenKeywordStore {
        async fn configure(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn upsert(&self, _entries: &[KeywordEntry]) -> anyhow::Result<()> {
            anyhow::bail!("index unreachable")
        }
        async fn query(
            &self,
            _text: &str,
            _k: usize,
            _owner: &OwnerScope,
        ) -> anyhow::Result<Vec<StoreHit>> {
            Ok(Vec::new())
        }
        async fn source_counts(&self, _owner: &OwnerScope) -> anyhow::Result<Vec<SourceCount>> {
            Ok(Vec::new())
        }
        async fn heartbeat(&self) -> anyhow::Result<()> {
            anyhow::bail!("down")
        }
    }

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk {
                id: chunk_id("doc.pdf", i, "u1"),
                text: format!("chunk number {}", i),
                source_name: "doc.pdf".into(),
                chunk_index: i,
                owner_id: "u1".into(),
                extra_metadata: Metadata::new(),
            })
            .collect()
    }

    fn embeddings(n: usize) -> Vec<Vec<f32>> {
        (0..n).map(|i| vec![1.0, i as f32]).collect()
    }

    #[tokio::test]
    async fn test_complete_write() {
        let vector = Arc::new(InMemoryVectorStore::new());
        let keyword = Arc::new(InMemoryKeywordStore::new());
        let writer = DualIndexWriter::new(vector.clone(), keyword.clone());

        let report = writer.write(&chunks(3), &embeddings(3)).await.unwrap();
        assert_eq!(report.status(), WriteStatus::Complete);
        assert_eq!(report.vector, StoreOutcome::Written { count: 3 });
        assert_eq!(report.keyword, StoreOutcome::Written { count: 3 });
        assert_eq!(report.ids, chunks(3).into_iter().map(|c| c.id).collect::<Vec<_>>());
        assert_eq!(vector.len().unwrap(), 3);
        assert_eq!(keyword.len().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_keyword_failure_is_partial_and_vector_content_is_queryable() {
        let vector = Arc::new(InMemoryVectorStore::new());
        let writer = DualIndexWriter::new(vector.clone(), Arc::new(BrokenKeywordStore));

        let report = writer.write(&chunks(2), &embeddings(2)).await.unwrap();
        assert_eq!(report.status(), WriteStatus::Partial);
        assert!(matches!(
            &report.keyword,
            StoreOutcome::Failed { error } if error.contains("index unreachable")
        ));

        let owner = OwnerScope::new("u1").unwrap();
        let hits = vector.query(&[1.0, 0.0], 5, &owner).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_vector_failure_skips_keyword_write() {
        let keyword = Arc::new(InMemoryKeywordStore::new());
        let writer = DualIndexWriter::new(Arc::new(BrokenVectorStore), keyword.clone());

        let report = writer.write(&chunks(2), &embeddings(2)).await.unwrap();
        assert_eq!(report.status(), WriteStatus::Failed);
        assert_eq!(report.keyword, StoreOutcome::Skipped);
        assert!(keyword.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_length_mismatch_writes_nothing() {
        let vector = Arc::new(InMemoryVectorStore::new());
        let keyword = Arc::new(InMemoryKeywordStore::new());
        let writer = DualIndexWriter::new(vector.clone(), keyword.clone());

        let err = writer.write(&chunks(3), &embeddings(2)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::LengthMismatch {
                chunks: 3,
                embeddings: 2
            }
        ));
        assert!(vector.is_empty().unwrap());
        assert!(keyword.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_vector_metadata_flattened_keyword_metadata_raw() {
        let vector = Arc::new(InMemoryVectorStore::new());
        let keyword = Arc::new(InMemoryKeywordStore::new());
        let writer = DualIndexWriter::new(vector.clone(), keyword.clone());

        let mut chunk = chunks(1).remove(0);
        chunk.extra_metadata = json!({"pdf": {"page": 4}, "tags": ["a"]})
            .as_object()
            .cloned()
            .unwrap();
        writer.write(&[chunk], &embeddings(1)).await.unwrap();

        let owner = OwnerScope::new("u1").unwrap();
        let stored = vector.entries_for_source(&owner, "doc.pdf").await.unwrap();
        assert_eq!(stored[0].metadata["pdf.page"], 4);
        assert!(!stored[0].metadata.contains_key("tags"));

        let hits = keyword.query("chunk", 5, &owner).await.unwrap();
        assert_eq!(hits[0].metadata["pdf"]["page"], 4);
        assert_eq!(hits[0].metadata["tags"], json!(["a"]));
    }

    #[test]
    fn test_flatten_metadata() {
        let meta = json!({
            "source": "a.pdf",
            "chunk_index": 2,
            "nested": {"deep": {"x": true}, "y": "z"},
            "list": [1, 2],
            "missing": null
        });
        let flat = flatten_metadata(meta.as_object().unwrap());
        assert_eq!(
            serde_json::Value::Object(flat),
            json!({
                "source": "a.pdf",
                "chunk_index": 2,
                "nested.deep.x": true,
                "nested.y": "z"
            })
        );
    }
}
