//! Hybrid retrieval: both retrievers concurrently, then rank fusion.
//!
//! Each source runs under `retrieval.timeout_ms`. A source that errors or
//! times out contributes an empty list and is reported as
//! [`SourceStatus::Unavailable`], which is distinct from a source that
//! answered with zero hits. The query as a whole only fails on bad input.

use anyhow::{bail, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use hybrid_rag_core::fusion::fuse;
use hybrid_rag_core::models::{FusedResult, META_CHUNK_INDEX, META_SOURCE, OwnerScope, RetrievalHit};
use hybrid_rag_core::retrieve::Retriever;

use crate::config::Config;
use crate::services::Services;

/// Outcome of one retrieval source for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Ok { hits: usize },
    Unavailable { reason: String },
}

impl SourceStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, SourceStatus::Ok { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub results: Vec<FusedResult>,
    pub vector: SourceStatus,
    pub keyword: SourceStatus,
}

/// Retrieve up to `top_k` fused results for `owner`.
pub async fn hybrid_search(
    services: &Services,
    query: &str,
    top_k: usize,
    owner: &OwnerScope,
) -> Result<Retrieval> {
    if top_k == 0 {
        bail!("top_k must be >= 1");
    }
    let weights = services.weights()?;
    let timeout = Duration::from_millis(services.config.retrieval.timeout_ms);

    let vector = services.vector_retriever();
    let keyword = services.keyword_retriever();

    let ((vector_hits, vector_status), (keyword_hits, keyword_status)) = tokio::join!(
        run_source(&vector, query, top_k, owner, timeout),
        run_source(&keyword, query, top_k, owner, timeout),
    );

    let results = fuse(&vector_hits, &keyword_hits, weights, top_k);
    debug!(
        vector_hits = vector_hits.len(),
        keyword_hits = keyword_hits.len(),
        fused = results.len(),
        "hybrid retrieval complete"
    );

    Ok(Retrieval {
        results,
        vector: vector_status,
        keyword: keyword_status,
    })
}

async fn run_source(
    retriever: &dyn Retriever,
    query: &str,
    k: usize,
    owner: &OwnerScope,
    timeout: Duration,
) -> (Vec<RetrievalHit>, SourceStatus) {
    let origin = retriever.origin();
    match tokio::time::timeout(timeout, retriever.search(query, k, owner)).await {
        Ok(Ok(hits)) => {
            debug!(%origin, hits = hits.len(), "retrieval source answered");
            let count = hits.len();
            (hits, SourceStatus::Ok { hits: count })
        }
        Ok(Err(e)) => {
            let reason = format!("{:#}", e);
            warn!(%origin, %reason, "retrieval source unavailable");
            (Vec::new(), SourceStatus::Unavailable { reason })
        }
        Err(_) => {
            let reason = format!("timed out after {} ms", timeout.as_millis());
            warn!(%origin, %reason, "retrieval source unavailable");
            (Vec::new(), SourceStatus::Unavailable { reason })
        }
    }
}

pub(crate) fn describe_status(status: &SourceStatus) -> String {
    match status {
        SourceStatus::Ok { hits } => format!("ok ({} hits)", hits),
        SourceStatus::Unavailable { reason } => format!("unavailable: {}", reason),
    }
}

fn describe_rank(rank: Option<usize>) -> String {
    rank.map_or_else(|| "-".to_string(), |r| r.to_string())
}

/// `source #index` label for a result, from its metadata.
pub(crate) fn result_label(result: &FusedResult) -> String {
    let source = result
        .metadata
        .get(META_SOURCE)
        .and_then(|v| v.as_str())
        .unwrap_or("(unknown)");
    match result.metadata.get(META_CHUNK_INDEX).and_then(|v| v.as_u64()) {
        Some(i) => format!("{} #{}", source, i),
        None => source.to_string(),
    }
}

/// CLI entry point for `hrag search`.
pub async fn run_search(
    config: &Config,
    query: &str,
    owner: &str,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let owner = OwnerScope::new(owner)?;
    let services = Services::open(config).await?;
    let top_k = top_k.unwrap_or(config.retrieval.default_top_k);

    let retrieval = hybrid_search(&services, query, top_k, &owner).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&retrieval)?);
        return Ok(());
    }

    println!("vector: {}", describe_status(&retrieval.vector));
    println!("keyword: {}", describe_status(&retrieval.keyword));
    println!();

    if retrieval.results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in retrieval.results.iter().enumerate() {
        println!(
            "{}. [{:.4}] {}",
            i + 1,
            result.fused_score,
            result_label(result)
        );
        println!(
            "    ranks: vector {} / keyword {}",
            describe_rank(result.vector_rank),
            describe_rank(result.keyword_rank)
        );
        println!(
            "    excerpt: \"{}\"",
            hybrid_rag_core::answer::preview(&result.text)
                .replace('\n', " ")
                .trim()
        );
        if let Some(id) = &result.id {
            println!("    id: {}", id);
        }
        println!();
    }

    Ok(())
}
