//! Application state for the knowledge base server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::generation::{QueryOptimizer, RagGenerator};
use crate::ingestion::{DocumentLoader, SmartChunker};
use crate::providers::{EmbeddingProvider, GeminiEmbedder, LlmProvider, OpenRouterClient};
use crate::retrieval::HybridRetriever;
use crate::storage::DocumentDb;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    db: DocumentDb,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    loader: DocumentLoader,
    chunker: SmartChunker,
    retriever: HybridRetriever,
    optimizer: QueryOptimizer,
    generator: RagGenerator,
}

impl AppState {
    /// Open the configured database and build the Gemini / OpenRouter providers
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Opening document database at {}", config.database.path.display());
        let db = DocumentDb::open(&config.database.path)?;

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(GeminiEmbedder::new(&config.embeddings)?);
        let llm: Arc<dyn LlmProvider> = Arc::new(OpenRouterClient::new(&config.llm)?);

        if config.embeddings.api_key.is_empty() {
            tracing::warn!("GEMINI_API_KEY not set; uploads and queries will fail until it is configured");
        }
        if config.llm.api_key.is_empty() {
            tracing::warn!("OPENROUTER_API_KEY not set; answers will report a generation error");
        }

        Ok(Self::with_providers(config, db, embedder, llm))
    }

    /// Assemble state from explicit parts
    pub fn with_providers(
        config: RagConfig,
        db: DocumentDb,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        let chunker = SmartChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap);
        let retriever = HybridRetriever::new(db.clone(), Arc::clone(&embedder), &config.retrieval);
        let optimizer = QueryOptimizer::new(Arc::clone(&llm));
        let generator = RagGenerator::new(Arc::clone(&llm), config.llm.temperature, config.llm.max_tokens);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                embedder,
                llm,
                loader: DocumentLoader::new(),
                chunker,
                retriever,
                optimizer,
                generator,
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get the document database
    pub fn db(&self) -> &DocumentDb {
        &self.inner.db
    }

    /// Get the embedding provider
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedder
    }

    /// Get the chat provider
    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm
    }

    /// Get the document loader
    pub fn loader(&self) -> &DocumentLoader {
        &self.inner.loader
    }

    /// Get the chunker
    pub fn chunker(&self) -> &SmartChunker {
        &self.inner.chunker
    }

    /// Get the hybrid retriever
    pub fn retriever(&self) -> &HybridRetriever {
        &self.inner.retriever
    }

    /// Get the query optimizer
    pub fn optimizer(&self) -> &QueryOptimizer {
        &self.inner.optimizer
    }

    /// Get the answer generator
    pub fn generator(&self) -> &RagGenerator {
        &self.inner.generator
    }
}
