//! Ingestion: validate → parse → chunk → embed → dual-index write.
//!
//! Input problems (wrong file type, oversized file, nothing extractable)
//! and embedding failures are errors raised before any store is written.
//! Store failures come back inside the [`IngestReport`] so a partial write
//! is visible to the caller.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{info, warn};

use hybrid_rag_core::chunk::TextSplitter;
use hybrid_rag_core::identity::chunk_id;
use hybrid_rag_core::models::{Chunk, OwnerScope, ParsedSegment};
use hybrid_rag_core::writer::{StoreOutcome, WriteStatus};
use hybrid_rag_core::Error;

use crate::config::Config;
use crate::services::Services;

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub status: WriteStatus,
    pub filename: String,
    /// SHA-256 of the uploaded bytes.
    pub sha256: String,
    pub chunk_count: usize,
    pub ids: Vec<String>,
    pub stores: StoreOutcomes,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreOutcomes {
    pub vector: StoreOutcome,
    pub keyword: StoreOutcome,
}

/// Accept only `.pdf` files (any case) of at most `max_bytes`.
pub fn validate_upload(filename: &str, size: u64, max_bytes: u64) -> hybrid_rag_core::Result<()> {
    let is_pdf = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(Error::UnsupportedFileType(filename.to_string()));
    }
    if size > max_bytes {
        return Err(Error::FileTooLarge {
            size,
            max: max_bytes,
        });
    }
    Ok(())
}

/// Split every segment and number the chunks across the whole document.
///
/// Each chunk inherits its segment's metadata (e.g. the page number).
pub fn build_chunks(
    segments: &[ParsedSegment],
    splitter: &TextSplitter,
    source_name: &str,
    owner: &OwnerScope,
) -> Vec<Chunk> {
    segments
        .iter()
        .flat_map(|segment| {
            splitter
                .split(&segment.text)
                .map(move |piece| (piece.text, &segment.metadata))
        })
        .filter(|(text, _)| !text.trim().is_empty())
        .enumerate()
        .map(|(chunk_index, (text, metadata))| Chunk {
            id: chunk_id(source_name, chunk_index, owner.as_str()),
            text: text.to_string(),
            source_name: source_name.to_string(),
            chunk_index,
            owner_id: owner.as_str().to_string(),
            extra_metadata: metadata.clone(),
        })
        .collect()
}

/// Ingest one uploaded file for `owner`. `filename` becomes the source name.
pub async fn ingest(
    services: &Services,
    bytes: Vec<u8>,
    filename: &str,
    owner: &OwnerScope,
) -> Result<IngestReport> {
    validate_upload(
        filename,
        bytes.len() as u64,
        services.config.ingest.max_file_bytes,
    )?;
    let sha256 = hex::encode(Sha256::digest(&bytes));
    let splitter = services.splitter()?;

    let parser = services.parser.clone();
    let name = filename.to_string();
    let segments = tokio::task::spawn_blocking(move || parser.parse(&bytes, &name))
        .await
        .context("document parser task failed")??;

    let chunks = build_chunks(&segments, &splitter, filename, owner);
    if chunks.is_empty() {
        return Err(Error::NoExtractableText(filename.to_string()).into());
    }
    info!(
        filename,
        owner = %owner,
        segments = segments.len(),
        chunks = chunks.len(),
        "chunked document"
    );

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = services.embedder.embed(&texts).await?;

    let report = services.writer().write(&chunks, &embeddings).await?;
    let status = report.status();
    if status == WriteStatus::Partial {
        warn!(
            filename,
            owner = %owner,
            "keyword index write failed; run `hrag reindex-keyword` for this source"
        );
    }

    Ok(IngestReport {
        status,
        filename: filename.to_string(),
        sha256,
        chunk_count: chunks.len(),
        ids: report.ids,
        stores: StoreOutcomes {
            vector: report.vector,
            keyword: report.keyword,
        },
    })
}

fn describe(outcome: &StoreOutcome) -> String {
    match outcome {
        StoreOutcome::Written { count } => format!("written ({})", count),
        StoreOutcome::Failed { error } => format!("FAILED: {}", error),
        StoreOutcome::Skipped => "skipped".to_string(),
    }
}

/// CLI entry point for `hrag ingest`.
pub async fn run_ingest(config: &Config, path: &Path, owner: &str, json: bool) -> Result<()> {
    let owner = OwnerScope::new(owner)?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file path: {}", path.display()))?;

    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to read {}", path.display()))?
        .len();
    validate_upload(filename, size, config.ingest.max_file_bytes)?;

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let services = Services::open(config).await?;
    let report = ingest(&services, bytes, filename, &owner).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("ingest {}", report.filename);
        println!("  owner: {}", owner);
        println!("  sha256: {}", report.sha256);
        println!("  chunks: {}", report.chunk_count);
        println!("  vector index: {}", describe(&report.stores.vector));
        println!("  keyword index: {}", describe(&report.stores.keyword));
        match report.status {
            WriteStatus::Complete => println!("ok"),
            WriteStatus::Partial => println!(
                "partial: keyword index is missing this file; run `hrag reindex-keyword {} --owner {}`",
                report.filename, owner
            ),
            WriteStatus::Failed => println!("failed"),
        }
    }

    if report.status == WriteStatus::Failed {
        bail!("ingestion of {} failed: nothing was written", report.filename);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_rag_core::models::Metadata;

    #[test]
    fn test_validate_upload() {
        assert!(validate_upload("report.pdf", 10, 100).is_ok());
        assert!(validate_upload("REPORT.PDF", 10, 100).is_ok());
        assert!(matches!(
            validate_upload("notes.txt", 10, 100),
            Err(Error::UnsupportedFileType(_))
        ));
        assert!(matches!(
            validate_upload("pdf", 10, 100),
            Err(Error::UnsupportedFileType(_))
        ));
        assert!(matches!(
            validate_upload("big.pdf", 101, 100),
            Err(Error::FileTooLarge { size: 101, max: 100 })
        ));
        assert!(validate_upload("exact.pdf", 100, 100).is_ok());
    }

    #[test]
    fn test_build_chunks_numbers_across_segments() {
        let mut page2 = Metadata::new();
        page2.insert("page".into(), 2.into());
        let segments = vec![
            ParsedSegment {
                text: "alpha beta gamma delta".into(),
                metadata: Metadata::new(),
            },
            ParsedSegment {
                text: "   ".into(),
                metadata: Metadata::new(),
            },
            ParsedSegment {
                text: "epsilon zeta".into(),
                metadata: page2,
            },
        ];
        let splitter = TextSplitter::new(12, 0).unwrap();
        let owner = OwnerScope::new("u1").unwrap();

        let chunks = build_chunks(&segments, &splitter, "doc.pdf", &owner);
        let indexes: Vec<_> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indexes, (0..chunks.len()).collect::<Vec<_>>());
        assert_eq!(chunks[0].text, "alpha beta ");
        assert_eq!(chunks.last().unwrap().extra_metadata["page"], 2);
        assert_eq!(chunks[1].id, chunk_id("doc.pdf", 1, "u1"));
        assert!(chunks.iter().all(|c| c.owner_id == "u1"));
    }
}
