//! # Hybrid RAG
//!
//! Owner-scoped retrieval-augmented generation over PDF documents.
//!
//! Documents are split into overlapping chunks with deterministic ids,
//! embedded, and written to two independent indexes. Queries run a vector
//! retriever and a keyword retriever concurrently and merge their rankings
//! with weighted reciprocal rank fusion; the fused context feeds a chat
//! completions model.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌──────────────┐   ┌────────────┐   ┌───────────────┐
//! │  PDF   │──▶│ Chunk+Embed  │──▶│ Dual write │──▶│ vector.db     │
//! │ parser │   │              │   │            │──▶│ keyword.db    │
//! └────────┘   └──────────────┘   └────────────┘   └──────┬────────┘
//!                                                        │
//!                       ┌───────────┐   ┌──────────┐     │
//!                       │  Answer   │◀──│ RRF fuse │◀────┘
//!                       └───────────┘   └──────────┘
//! ```
//!
//! The pipeline logic itself lives in `hybrid-rag-core`; this crate wires it
//! to SQLite, HTTP model endpoints and the `hrag` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | SQLite connections |
//! | [`migrate`] | Index schemas |
//! | [`sqlite_store`] | SQLite vector and FTS5 keyword stores |
//! | [`http`] | JSON POST with retry |
//! | [`embedding`] | OpenAI-compatible and Ollama embedding backends |
//! | [`generation`] | Chat completions generator |
//! | [`trace`] | Webhook trace sink |
//! | [`extract`] | PDF text extraction |
//! | [`services`] | Per-command wiring |
//! | [`ingest`] | Upload validation and ingestion |
//! | [`search`] | Concurrent hybrid retrieval |
//! | [`ask`] | Question answering |
//! | [`stats`] | Index statistics |
//! | [`health`] | Store liveness |
//! | [`reindex`] | Keyword index repair |

pub mod ask;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod health;
pub mod http;
pub mod ingest;
pub mod migrate;
pub mod reindex;
pub mod search;
pub mod services;
pub mod sqlite_store;
pub mod stats;
pub mod trace;
