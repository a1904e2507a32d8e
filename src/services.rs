//! Wiring: the stores and collaborator clients one command runs against.
//!
//! [`Services::open`] builds the production set from config (SQLite stores,
//! HTTP clients, the PDF parser). Tests assemble their own with
//! [`Services::new`] and in-memory stores.

use anyhow::{Context, Result};
use std::sync::Arc;

use hybrid_rag_core::answer::{AnswerAssembler, Generator, TraceSink};
use hybrid_rag_core::chunk::TextSplitter;
use hybrid_rag_core::embedding::EmbeddingClient;
use hybrid_rag_core::fusion::FusionWeights;
use hybrid_rag_core::models::DocumentParser;
use hybrid_rag_core::retrieve::{KeywordRetriever, VectorRetriever};
use hybrid_rag_core::store::{KeywordStore, VectorStore};
use hybrid_rag_core::writer::DualIndexWriter;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::extract::PdfParser;
use crate::generation::ChatGenerator;
use crate::sqlite_store::{SqliteKeywordStore, SqliteVectorStore};
use crate::trace::WebhookTracer;

#[derive(Clone)]
pub struct Services {
    pub config: Config,
    pub vector: Arc<dyn VectorStore>,
    pub keyword: Arc<dyn KeywordStore>,
    pub embedder: EmbeddingClient,
    pub parser: Arc<dyn DocumentParser>,
    pub generator: Option<Arc<dyn Generator>>,
    pub tracer: Option<Arc<dyn TraceSink>>,
}

impl Services {
    pub fn new(
        config: Config,
        vector: Arc<dyn VectorStore>,
        keyword: Arc<dyn KeywordStore>,
        embedder: EmbeddingClient,
        parser: Arc<dyn DocumentParser>,
    ) -> Self {
        Self {
            config,
            vector,
            keyword,
            embedder,
            parser,
            generator: None,
            tracer: None,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn TraceSink>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Connect to both SQLite stores and build the remote clients.
    pub async fn open(config: &Config) -> Result<Self> {
        let vector_pool = db::connect(&config.stores.vector_path).await?;
        let keyword_pool = db::connect(&config.stores.keyword_path).await?;
        let embedder =
            embedding::create_client(&config.embedding).context("Failed to set up embeddings")?;

        let mut services = Self::new(
            config.clone(),
            Arc::new(SqliteVectorStore::new(vector_pool)),
            Arc::new(SqliteKeywordStore::new(keyword_pool)),
            embedder,
            Arc::new(PdfParser),
        );

        if let Some(generation) = &config.generation {
            services = services.with_generator(Arc::new(
                ChatGenerator::new(generation).context("Failed to set up generation")?,
            ));
        }
        if let Some(url) = &config.observability.trace_url {
            services = services.with_tracer(Arc::new(WebhookTracer::new(url)?));
        }

        Ok(services)
    }

    pub fn splitter(&self) -> Result<TextSplitter> {
        Ok(TextSplitter::new(
            self.config.chunking.chunk_size,
            self.config.chunking.chunk_overlap,
        )?)
    }

    pub fn writer(&self) -> DualIndexWriter {
        DualIndexWriter::new(self.vector.clone(), self.keyword.clone())
    }

    pub fn vector_retriever(&self) -> VectorRetriever {
        VectorRetriever::new(self.vector.clone(), self.embedder.clone())
    }

    pub fn keyword_retriever(&self) -> KeywordRetriever {
        KeywordRetriever::new(self.keyword.clone())
    }

    pub fn weights(&self) -> Result<FusionWeights> {
        self.config.retrieval.weights()
    }

    /// The answer assembler; fails when no `[generation]` is configured.
    pub fn assembler(&self) -> Result<AnswerAssembler> {
        let generator = self
            .generator
            .clone()
            .context("No [generation] section in config; `ask` needs a chat completions endpoint")?;
        let assembler = AnswerAssembler::new(generator);
        Ok(match &self.tracer {
            Some(tracer) => assembler.with_tracer(tracer.clone()),
            None => assembler,
        })
    }
}
