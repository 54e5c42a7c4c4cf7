//! Knowledge base server binary
//!
//! Run with: cargo run -p knowledge-rag --bin knowledge-rag-server
//! Optional config file: RAG_CONFIG=/path/to/knowledge-rag.toml

use knowledge_rag::{config::RagConfig, logging::init_tracing, server::RagServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RagConfig::load(None)?;
    init_tracing(&config.logging);

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                   Knowledge Base (RAG)                    ║
║        Hybrid Retrieval with Cited LLM Answers            ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    tracing::info!("Configuration loaded");
    tracing::info!("  - Database: {}", config.database.path.display());
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - Embedding dimensions: {}", config.embeddings.dimensions);
    tracing::info!("  - LLM model: {}", config.llm.model);
    tracing::info!(
        "  - Chunk size: {} (overlap {})",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );

    let server = RagServer::new(config)?;

    let state = server.state();
    match state.embedder().health_check().await {
        Ok(true) => tracing::info!("Embedding provider reachable"),
        Ok(false) => tracing::warn!("Embedding model {} not available", state.embedder().model()),
        Err(e) => tracing::warn!("Embedding provider check failed: {}", e),
    }
    match state.llm().health_check().await {
        Ok(true) => tracing::info!("Chat provider reachable"),
        Ok(false) => tracing::warn!("Chat provider at {} not available", state.config().llm.base_url),
        Err(e) => tracing::warn!("Chat provider check failed: {}", e),
    }

    let prefix = state.config().rag_prefix();
    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST {}/upload - Upload documents", prefix);
    println!("  POST {}/query  - Ask questions", prefix);
    println!("  GET  {}/stats  - Corpus statistics", prefix);
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
