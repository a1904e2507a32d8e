//! Question answering over the fused context.

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use hybrid_rag_core::answer::Answer;
use hybrid_rag_core::models::OwnerScope;

use crate::config::Config;
use crate::search::{describe_status, hybrid_search, SourceStatus};
use crate::services::Services;

/// An answer plus how each retrieval source fared.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    #[serde(flatten)]
    pub answer: Answer,
    pub retrieval: RetrievalDiagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalDiagnostics {
    pub vector: SourceStatus,
    pub keyword: SourceStatus,
    pub context_items: usize,
}

/// Retrieve, fuse and answer `question` for `owner`.
pub async fn query(
    services: &Services,
    question: &str,
    top_k: usize,
    owner: &OwnerScope,
) -> Result<QueryResponse> {
    let assembler = services.assembler()?;
    let retrieval = hybrid_search(services, question, top_k, owner).await?;
    let answer = assembler
        .answer(question, owner, &retrieval.results)
        .await?;

    info!(
        owner = %owner,
        context_items = retrieval.results.len(),
        sources = answer.sources.len(),
        "answered question"
    );

    Ok(QueryResponse {
        answer,
        retrieval: RetrievalDiagnostics {
            vector: retrieval.vector,
            keyword: retrieval.keyword,
            context_items: retrieval.results.len(),
        },
    })
}

/// CLI entry point for `hrag ask`.
pub async fn run_ask(
    config: &Config,
    question: &str,
    owner: &str,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let owner = OwnerScope::new(owner)?;
    let services = Services::open(config).await?;
    let top_k = top_k.unwrap_or(config.retrieval.default_top_k);

    let response = query(&services, question, top_k, &owner).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", response.answer.answer);
    println!();
    if response.answer.sources.is_empty() {
        println!("Sources: none");
    } else {
        println!("Sources:");
        for (i, source) in response.answer.sources.iter().enumerate() {
            let name = source
                .metadata
                .get(hybrid_rag_core::models::META_SOURCE)
                .and_then(|v| v.as_str())
                .unwrap_or("(unknown)");
            println!("  {}. {}", i + 1, name);
            println!("     \"{}\"", source.preview.replace('\n', " ").trim());
        }
    }
    println!();
    println!(
        "retrieval: vector {}, keyword {}",
        describe_status(&response.retrieval.vector),
        describe_status(&response.retrieval.keyword)
    );

    Ok(())
}
