//! Rebuild one source's keyword entries from the vector index.
//!
//! Repairs a partial ingestion: the vector index holds every chunk's text
//! and metadata, so the keyword rows can be regenerated without parsing or
//! embedding the file again. Upserts by id, so running it twice is harmless.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::info;

use hybrid_rag_core::models::{KeywordEntry, OwnerScope, VectorEntry};
use hybrid_rag_core::store::{KeywordStore, VectorStore};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::{SqliteKeywordStore, SqliteVectorStore};

#[derive(Debug, Clone, Serialize)]
pub struct ReindexReport {
    pub source: String,
    pub count: usize,
}

pub async fn reindex_keyword(
    vector: &dyn VectorStore,
    keyword: &dyn KeywordStore,
    owner: &OwnerScope,
    source: &str,
) -> Result<ReindexReport> {
    let entries = vector.entries_for_source(owner, source).await?;
    if entries.is_empty() {
        bail!("No chunks for source '{}' in the vector index", source);
    }

    let keyword_entries = entries
        .iter()
        .map(|entry| keyword_entry(entry, owner))
        .collect::<Result<Vec<_>>>()?;
    keyword.upsert(&keyword_entries).await?;

    info!(source, owner = %owner, count = keyword_entries.len(), "rebuilt keyword entries");
    Ok(ReindexReport {
        source: source.to_string(),
        count: keyword_entries.len(),
    })
}

fn keyword_entry(entry: &VectorEntry, owner: &OwnerScope) -> Result<KeywordEntry> {
    let source_name = entry
        .source_name()
        .with_context(|| format!("vector entry {} has no source", entry.id))?;
    let chunk_index = entry
        .chunk_index()
        .with_context(|| format!("vector entry {} has no chunk index", entry.id))?;
    Ok(KeywordEntry {
        id: entry.id.clone(),
        text: entry.text.clone(),
        source_name: source_name.to_string(),
        chunk_index,
        owner_id: owner.as_str().to_string(),
        metadata: entry.metadata.clone(),
    })
}

/// CLI entry point for `hrag reindex-keyword`.
pub async fn run_reindex(config: &Config, source: &str, owner: &str, json: bool) -> Result<()> {
    let owner = OwnerScope::new(owner)?;
    let vector = SqliteVectorStore::new(db::connect(&config.stores.vector_path).await?);
    let keyword = SqliteKeywordStore::new(db::connect(&config.stores.keyword_path).await?);

    let report = reindex_keyword(&vector, &keyword, &owner, source).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "reindexed {} chunk(s) of {} into the keyword index",
            report.count, report.source
        );
    }
    Ok(())
}
