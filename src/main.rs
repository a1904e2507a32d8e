//! # Hybrid RAG CLI (`hrag`)
//!
//! Ingests PDF documents into a vector index and a keyword index, retrieves
//! with both, fuses the rankings, and answers questions grounded in the
//! fused context. Every stored chunk belongs to an owner; every read is
//! scoped to one.
//!
//! ## Usage
//!
//! ```bash
//! hrag --config ./config/hrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `hrag init` | Create both index databases and apply index settings |
//! | `hrag ingest <file> --owner <id>` | Parse, chunk, embed and index a PDF |
//! | `hrag search "<query>" --owner <id>` | Hybrid search with fused ranks |
//! | `hrag ask "<question>" --owner <id>` | Answer a question from retrieved context |
//! | `hrag stats --owner <id>` | Per-source chunk counts for an owner |
//! | `hrag health` | Check both indexes |
//! | `hrag reindex-keyword <source> --owner <id>` | Rebuild a source's keyword entries |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use hybrid_rag::{ask, config, health, ingest, migrate, reindex, search, stats};

/// Hybrid RAG: PDF ingestion with vector + keyword retrieval and
/// rank-fused question answering.
#[derive(Parser)]
#[command(name = "hrag", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/hrag.toml")]
    config: PathBuf,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create both index databases and apply the keyword index settings.
    ///
    /// Idempotent.
    Init,

    /// Ingest one PDF for an owner.
    ///
    /// Re-ingesting the same file name for the same owner replaces its
    /// chunks in place.
    Ingest {
        file: PathBuf,

        #[arg(long)]
        owner: String,
    },

    /// Hybrid search over an owner's documents.
    Search {
        query: String,

        #[arg(long)]
        owner: String,

        /// Number of fused results (default: `retrieval.default_top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Answer a question from an owner's documents.
    Ask {
        question: String,

        #[arg(long)]
        owner: String,

        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Show per-source chunk counts for an owner.
    Stats {
        #[arg(long)]
        owner: String,
    },

    /// Check that both indexes are reachable.
    Health,

    /// Rebuild one source's keyword entries from the vector index.
    ///
    /// Use after an ingestion reported `partial`.
    ReindexKeyword {
        source: String,

        #[arg(long)]
        owner: String,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("HRAG_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let cfg = config::load_config(&cli.config)?;
    let json = cli.json;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Indexes initialized successfully.");
        }
        Commands::Ingest { file, owner } => {
            ingest::run_ingest(&cfg, &file, &owner, json).await?;
        }
        Commands::Search {
            query,
            owner,
            top_k,
        } => {
            search::run_search(&cfg, &query, &owner, top_k, json).await?;
        }
        Commands::Ask {
            question,
            owner,
            top_k,
        } => {
            ask::run_ask(&cfg, &question, &owner, top_k, json).await?;
        }
        Commands::Stats { owner } => {
            stats::run_stats(&cfg, &owner, json).await?;
        }
        Commands::Health => {
            health::run_health(&cfg, json).await?;
        }
        Commands::ReindexKeyword { source, owner } => {
            reindex::run_reindex(&cfg, &source, &owner, json).await?;
        }
    }

    Ok(())
}
