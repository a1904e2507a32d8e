//! PDF text extraction.
//!
//! Wraps `pdf-extract` as a [`DocumentParser`]. When the extracted text
//! carries form feeds between pages, each page becomes its own segment with
//! a 1-based `page` metadata field; otherwise the document is one segment.

use hybrid_rag_core::models::{DocumentParser, Metadata, ParsedSegment};
use hybrid_rag_core::{Error, Result};

pub const MIME_PDF: &str = "application/pdf";

/// Metadata key holding the 1-based page number of a segment.
pub const META_PAGE: &str = "page";

const PAGE_BREAK: char = '\x0c';

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfParser;

impl DocumentParser for PdfParser {
    fn parse(&self, bytes: &[u8], filename: &str) -> Result<Vec<ParsedSegment>> {
        // pdf-extract panics on some malformed inputs.
        let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
            .map_err(|_| Error::Parse(format!("{}: PDF parser panicked", filename)))?
            .map_err(|e| Error::Parse(format!("{}: {}", filename, e)))?;

        Ok(split_pages(&text))
    }
}

/// Split extracted text into per-page segments, dropping blank pages.
pub fn split_pages(text: &str) -> Vec<ParsedSegment> {
    let pages: Vec<&str> = text.split(PAGE_BREAK).collect();
    let paged = pages.len() > 1;

    pages
        .into_iter()
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| {
            let mut metadata = Metadata::new();
            if paged {
                metadata.insert(META_PAGE.into(), (i + 1).into());
            }
            ParsedSegment {
                text: page.to_string(),
                metadata,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pdf_returns_error() {
        let err = PdfParser.parse(b"not a pdf", "broken.pdf").unwrap_err();
        assert!(matches!(err, Error::Parse(m) if m.starts_with("broken.pdf")));
    }

    #[test]
    fn split_pages_numbers_pages_and_drops_blank_ones() {
        let segments = split_pages("first page\x0c  \n\x0cthird page");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "first page");
        assert_eq!(segments[0].metadata[META_PAGE], 1);
        assert_eq!(segments[1].metadata[META_PAGE], 3);
    }

    #[test]
    fn split_pages_without_breaks_is_one_segment() {
        let segments = split_pages("just text");
        assert_eq!(segments.len(), 1);
        assert!(segments[0].metadata.is_empty());
        assert!(split_pages(" \n ").is_empty());
    }
}
