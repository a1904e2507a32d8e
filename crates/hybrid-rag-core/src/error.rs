//! Error taxonomy for the ingestion and query pipeline.
//!
//! Input validation, embedding and generation failures are hard errors.
//! Store write failures are not: they are reported per store inside a
//! [`WriteReport`](crate::writer::WriteReport) so a partial write stays
//! visible to the caller.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported file type: {0} (only PDF files are supported)")]
    UnsupportedFileType(String),

    #[error("file too large: {size} bytes (maximum is {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("no text could be extracted from {0}")]
    NoExtractableText(String),

    #[error("document parsing failed: {0}")]
    Parse(String),

    #[error("owner id must not be empty")]
    EmptyOwner,

    #[error("invalid chunking parameters: overlap {overlap} must be smaller than size {size}")]
    InvalidChunking { size: usize, overlap: usize },

    #[error("invalid fusion weights: {0}")]
    InvalidWeights(String),

    #[error(
        "embedding failed for batch {batch_index} ({batch_size} texts, lengths {lengths:?}): {message}"
    )]
    EmbeddingFailed {
        batch_index: usize,
        batch_size: usize,
        lengths: Vec<usize>,
        message: String,
    },

    #[error("chunk/embedding count mismatch: {chunks} chunks, {embeddings} embeddings")]
    LengthMismatch { chunks: usize, embeddings: usize },

    #[error("generation failed: {0}")]
    GenerationFailed(String),
}
