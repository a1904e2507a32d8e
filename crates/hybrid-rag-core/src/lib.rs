//! # Hybrid RAG Core
//!
//! Runtime-agnostic logic for Hybrid RAG: data models, chunking, chunk
//! identity, the embedding client, the two index traits, the dual-index
//! writer, retrievers, rank fusion and answer assembly.
//!
//! This crate contains no tokio, sqlx, HTTP or filesystem I/O. Concrete
//! stores and remote clients live in the `hybrid-rag` app crate; the
//! in-memory stores in [`store::memory`] back the tests.
//!
//! ```text
//!  parse ──▶ chunk ──▶ embed ──▶ identity ──▶ DualIndexWriter ──┬─▶ VectorStore
//!                                                               └─▶ KeywordStore
//!
//!  question ──┬─▶ VectorRetriever ──┐
//!             └─▶ KeywordRetriever ─┴─▶ fuse ──▶ AnswerAssembler ──▶ Answer
//! ```

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod fusion;
pub mod identity;
pub mod models;
pub mod retrieve;
pub mod store;
pub mod writer;

pub use error::{Error, Result};
pub use models::OwnerScope;
