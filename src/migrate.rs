use anyhow::Result;
use sqlx::SqlitePool;

use hybrid_rag_core::store::KeywordStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteKeywordStore;

/// Create both index schemas and apply the keyword index settings.
/// Idempotent.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let vector_pool = db::connect(&config.stores.vector_path).await?;
    migrate_vector(&vector_pool).await?;
    vector_pool.close().await;

    let keyword_pool = db::connect(&config.stores.keyword_path).await?;
    migrate_keyword(&keyword_pool).await?;
    SqliteKeywordStore::new(keyword_pool.clone())
        .configure()
        .await?;
    keyword_pool.close().await;

    Ok(())
}

pub async fn migrate_vector(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vector_entries (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            source_name TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_vector_entries_owner_source ON vector_entries(owner_id, source_name)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn migrate_keyword(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS keyword_entries (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            source_name TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_keyword_entries_owner_source ON keyword_entries(owner_id, source_name)",
    )
    .execute(pool)
    .await?;

    // Searchable / filterable field settings, written by `configure`.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='keyword_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE keyword_fts USING fts5(
                id UNINDEXED,
                owner_id UNINDEXED,
                source_name UNINDEXED,
                text
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    Ok(())
}
