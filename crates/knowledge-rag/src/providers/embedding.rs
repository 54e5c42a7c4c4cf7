//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;

use crate::error::Result;

/// Trait for generating text embeddings
///
/// Documents and queries are embedded separately because retrieval models
/// encode them with different task types.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed corpus passages, one vector per input in order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Vector dimensions (768 for text-embedding-004)
    fn dimensions(&self) -> usize;

    /// Check if the provider is reachable and configured
    async fn health_check(&self) -> Result<bool>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model reported in stats
    fn model(&self) -> &str;
}
