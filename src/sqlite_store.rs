//! SQLite-backed [`VectorStore`] and [`KeywordStore`].
//!
//! Each store owns its own database file (see `[stores]` in the config):
//!
//! - `vector_entries` holds the embedding as a little-endian `f32` BLOB
//!   next to the text and flattened metadata. Queries are brute-force
//!   cosine similarity over the caller's rows.
//! - `keyword_entries` plus the `keyword_fts` FTS5 table. Only `text` is
//!   searchable; `owner_id` and `source_name` are filter columns. Queries
//!   are ranked by `bm25`.
//!
//! Batch upserts run in a single transaction.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use hybrid_rag_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use hybrid_rag_core::models::{KeywordEntry, Metadata, OwnerScope, StoreHit, VectorEntry};
use hybrid_rag_core::store::{terms, KeywordStore, SourceCount, VectorStore};

/// Fields the keyword index matches against.
pub const SEARCHABLE_FIELDS: &[&str] = &["text"];
/// Fields the keyword index filters on.
pub const FILTERABLE_FIELDS: &[&str] = &["source_name", "owner_id"];

fn parse_metadata(json: &str) -> Result<Metadata> {
    serde_json::from_str(json).context("Invalid metadata_json in index")
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, entries: &[VectorEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let ts = now_ts();

        for entry in entries {
            let owner = entry
                .owner_id()
                .ok_or_else(|| anyhow!("vector entry {} has no owner_id", entry.id))?;
            let source = entry
                .source_name()
                .ok_or_else(|| anyhow!("vector entry {} has no source", entry.id))?;
            let chunk_index = entry.chunk_index().unwrap_or(0) as i64;

            sqlx::query(
                r#"
                INSERT INTO vector_entries (id, owner_id, source_name, chunk_index, text,
                                            metadata_json, dims, embedding, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    owner_id = excluded.owner_id,
                    source_name = excluded.source_name,
                    chunk_index = excluded.chunk_index,
                    text = excluded.text,
                    metadata_json = excluded.metadata_json,
                    dims = excluded.dims,
                    embedding = excluded.embedding,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&entry.id)
            .bind(owner)
            .bind(source)
            .bind(chunk_index)
            .bind(&entry.text)
            .bind(serde_json::to_string(&entry.metadata)?)
            .bind(entry.embedding.len() as i64)
            .bind(vec_to_blob(&entry.embedding))
            .bind(ts)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        owner: &OwnerScope,
    ) -> Result<Vec<StoreHit>> {
        let rows = sqlx::query(
            "SELECT id, text, metadata_json, embedding FROM vector_entries WHERE owner_id = ?",
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let metadata_json: String = row.get("metadata_json");
            hits.push(StoreHit {
                id: Some(row.get("id")),
                text: row.get("text"),
                metadata: parse_metadata(&metadata_json)?,
                score: cosine_similarity(embedding, &blob_to_vec(&blob)) as f64,
            });
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn entries_for_source(
        &self,
        owner: &OwnerScope,
        source_name: &str,
    ) -> Result<Vec<VectorEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, text, metadata_json, embedding
            FROM vector_entries
            WHERE owner_id = ? AND source_name = ?
            ORDER BY chunk_index
            "#,
        )
        .bind(owner.as_str())
        .bind(source_name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let metadata_json: String = row.get("metadata_json");
                Ok(VectorEntry {
                    id: row.get("id"),
                    embedding: blob_to_vec(&blob),
                    text: row.get("text"),
                    metadata: parse_metadata(&metadata_json)?,
                })
            })
            .collect()
    }

    async fn count(&self, owner: &OwnerScope) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vector_entries WHERE owner_id = ?")
            .bind(owner.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn heartbeat(&self) -> Result<()> {
        sqlx::query("SELECT 1 FROM vector_entries LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .context("vector index not reachable (did you run `hrag init`?)")?;
        Ok(())
    }
}

pub struct SqliteKeywordStore {
    pool: SqlitePool,
}

impl SqliteKeywordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Turn free text into an FTS5 query: each term quoted, joined with `OR`.
///
/// Returns `None` when the text has no searchable terms.
pub fn fts_query(text: &str) -> Option<String> {
    let quoted: Vec<String> = terms(text)
        .into_iter()
        .map(|t| format!("\"{}\"", t))
        .collect();
    if quoted.is_empty() {
        None
    } else {
        Some(quoted.join(" OR "))
    }
}

#[async_trait]
impl KeywordStore for SqliteKeywordStore {
    async fn configure(&self) -> Result<()> {
        let settings = [
            ("searchable_fields", serde_json::to_string(SEARCHABLE_FIELDS)?),
            ("filterable_fields", serde_json::to_string(FILTERABLE_FIELDS)?),
        ];
        for (key, value) in settings {
            sqlx::query(
                "INSERT INTO index_settings (key, value) VALUES (?, ?) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn upsert(&self, entries: &[KeywordEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let ts = now_ts();

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO keyword_entries (id, owner_id, source_name, chunk_index, text,
                                             metadata_json, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    owner_id = excluded.owner_id,
                    source_name = excluded.source_name,
                    chunk_index = excluded.chunk_index,
                    text = excluded.text,
                    metadata_json = excluded.metadata_json,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.owner_id)
            .bind(&entry.source_name)
            .bind(entry.chunk_index as i64)
            .bind(&entry.text)
            .bind(serde_json::to_string(&entry.metadata)?)
            .bind(ts)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM keyword_fts WHERE id = ?")
                .bind(&entry.id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "INSERT INTO keyword_fts (id, owner_id, source_name, text) VALUES (?, ?, ?, ?)",
            )
            .bind(&entry.id)
            .bind(&entry.owner_id)
            .bind(&entry.source_name)
            .bind(&entry.text)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, text: &str, k: usize, owner: &OwnerScope) -> Result<Vec<StoreHit>> {
        let Some(match_expr) = fts_query(text) else {
            return Ok(Vec::new());
        };

        // bm25() is lower-is-better; negate so higher is more relevant.
        let rows = sqlx::query(
            r#"
            SELECT e.id, e.text, e.metadata_json, bm25(keyword_fts) AS bm25_score
            FROM keyword_fts
            JOIN keyword_entries e ON e.id = keyword_fts.id
            WHERE keyword_fts MATCH ? AND keyword_fts.owner_id = ?
            ORDER BY bm25_score, e.id
            LIMIT ?
            "#,
        )
        .bind(&match_expr)
        .bind(owner.as_str())
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let bm25: f64 = row.get("bm25_score");
                let metadata_json: String = row.get("metadata_json");
                Ok(StoreHit {
                    id: Some(row.get("id")),
                    text: row.get("text"),
                    metadata: parse_metadata(&metadata_json)?,
                    score: -bm25,
                })
            })
            .collect()
    }

    async fn source_counts(&self, owner: &OwnerScope) -> Result<Vec<SourceCount>> {
        let rows = sqlx::query(
            r#"
            SELECT source_name, COUNT(*) AS chunks
            FROM keyword_entries
            WHERE owner_id = ?
            GROUP BY source_name
            ORDER BY source_name
            "#,
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SourceCount {
                name: row.get("source_name"),
                chunks: row.get::<i64, _>("chunks") as u64,
            })
            .collect())
    }

    async fn heartbeat(&self) -> Result<()> {
        sqlx::query("SELECT 1 FROM keyword_fts LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .context("keyword index not reachable (did you run `hrag init`?)")?;
        Ok(())
    }
}
