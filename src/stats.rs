//! Index statistics for one owner.
//!
//! Compares the vector and keyword indexes so that a partial ingestion
//! (vector written, keyword missing) shows up as a count mismatch.

use anyhow::Result;
use serde::Serialize;

use hybrid_rag_core::models::OwnerScope;
use hybrid_rag_core::store::SourceCount;

use crate::config::Config;
use crate::services::Services;

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub owner_id: String,
    /// Chunks in the keyword index.
    pub chunk_count: u64,
    pub vector_chunk_count: u64,
    pub distinct_sources: usize,
    pub sources: Vec<SourceCount>,
}

impl StatsReport {
    /// Both indexes hold the same number of chunks.
    pub fn in_sync(&self) -> bool {
        self.chunk_count == self.vector_chunk_count
    }
}

pub async fn stats(services: &Services, owner: &OwnerScope) -> Result<StatsReport> {
    let sources = services.keyword.source_counts(owner).await?;
    let vector_chunk_count = services.vector.count(owner).await?;

    Ok(StatsReport {
        owner_id: owner.as_str().to_string(),
        chunk_count: sources.iter().map(|s| s.chunks).sum(),
        vector_chunk_count,
        distinct_sources: sources.len(),
        sources,
    })
}

/// CLI entry point for `hrag stats`.
pub async fn run_stats(config: &Config, owner: &str, json: bool) -> Result<()> {
    let owner = OwnerScope::new(owner)?;
    let services = Services::open(config).await?;
    let report = stats(&services, &owner).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let vector_size = file_size(&config.stores.vector_path);
    let keyword_size = file_size(&config.stores.keyword_path);

    println!("Index stats for owner {}", report.owner_id);
    println!("==========================");
    println!();
    println!(
        "  Vector index:  {} ({})",
        config.stores.vector_path.display(),
        format_bytes(vector_size)
    );
    println!(
        "  Keyword index: {} ({})",
        config.stores.keyword_path.display(),
        format_bytes(keyword_size)
    );
    println!();
    println!("  Sources:       {}", report.distinct_sources);
    println!("  Chunks:        {}", report.chunk_count);
    println!("  Vector chunks: {}", report.vector_chunk_count);
    if !report.in_sync() {
        println!("  (indexes differ; `hrag reindex-keyword <source>` rebuilds a source)");
    }

    if !report.sources.is_empty() {
        println!();
        println!("  By source:");
        println!("  {:<40} {:>8}", "SOURCE", "CHUNKS");
        println!("  {}", "-".repeat(49));
        for s in &report.sources {
            println!("  {:<40} {:>8}", s.name, s.chunks);
        }
    }
    println!();

    Ok(())
}

fn file_size(path: &std::path::Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
