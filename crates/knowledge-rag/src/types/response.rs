//! Response types shared by the server routes and the client

use serde::{Deserialize, Serialize};

use super::document::RetrievedChunk;

/// A cited passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Origin label (filename)
    pub source: String,
    /// Passage snippet
    pub content: String,
    /// Relevance score in [0, 1]
    #[serde(default)]
    pub score: Option<f32>,
    /// Chunk index within its page
    #[serde(default)]
    pub chunk_id: Option<u64>,
}

impl SourceDocument {
    /// Build a citation from a retrieved chunk, truncating content to
    /// `snippet_chars` characters followed by "..."
    pub fn from_retrieved(chunk: &RetrievedChunk, snippet_chars: usize) -> Self {
        let snippet: String = chunk.content.chars().take(snippet_chars).collect();
        Self {
            source: chunk.source_label().to_string(),
            content: format!("{}...", snippet),
            score: Some(chunk.score),
            chunk_id: chunk.chunk_id(),
        }
    }

    /// Score as a whole percentage for display
    pub fn match_percent(&self) -> u32 {
        (self.score.unwrap_or(0.0).clamp(0.0, 1.0) * 100.0).round() as u32
    }
}

/// Answer to a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Query as submitted
    #[serde(default)]
    pub query: String,
    /// Rewritten query, present only when the optimizer changed it
    #[serde(default)]
    pub optimized_query: Option<String>,
    /// Generated answer
    pub answer: String,
    /// Cited passages, most relevant first
    #[serde(default)]
    pub sources: Vec<SourceDocument>,
    /// Tokens consumed by generation
    #[serde(default)]
    pub tokens_used: u64,
}

/// Corpus statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsResponse {
    /// Stored chunk rows
    pub total_documents: u64,
    /// Embedding model name
    pub embedding_model: String,
    /// Chat model name
    #[serde(default)]
    pub llm_model: Option<String>,
}

/// Upload summary; every field is optional so older and "no content" bodies parse
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_processed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks_created: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl UploadResponse {
    /// Body returned when nothing was chunked
    pub fn no_content() -> Self {
        Self {
            status: Some("success".to_string()),
            message: Some("No content processed".to_string()),
            ..Default::default()
        }
    }

    /// Body returned after chunks were stored
    pub fn processed(documents: usize, chunks: usize, files: Vec<String>) -> Self {
        Self {
            status: Some("success".to_string()),
            message: None,
            documents_processed: Some(documents as u64),
            chunks_created: Some(chunks as u64),
            files,
        }
    }
}
