//! Document pages, chunks, and retrieved chunks

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form metadata carried from loader to chunk to stored row
pub type Metadata = serde_json::Map<String, Value>;

/// Supported upload file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document, loaded page by page
    Pdf,
    /// Plain UTF-8 text
    Txt,
}

impl FileType {
    /// Detect the file type from a filename's extension (case-insensitive)
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())?
            .to_lowercase();

        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }
}

/// A loaded unit of text: one PDF page or one whole text file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPage {
    /// Extracted text
    pub content: String,
    /// `source` plus `page` for PDFs
    pub metadata: Metadata,
}

impl DocumentPage {
    /// Create a page with a `source` metadata entry
    pub fn new(content: impl Into<String>, source: &str) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), Value::String(source.to_string()));
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// Add the 0-based page index
    pub fn with_page(mut self, page: usize) -> Self {
        self.metadata.insert("page".to_string(), Value::from(page));
        self
    }

    /// Origin label from metadata
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }
}

/// A chunk of a page, ready to embed and store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text
    pub content: String,
    /// Page metadata plus `chunk_id` and `total_chunks`
    pub metadata: Metadata,
}

impl Chunk {
    /// Origin label from metadata
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }
}

/// A stored chunk returned by retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Row id in the documents table
    pub id: i64,
    /// Chunk text
    pub content: String,
    /// Stored chunk metadata
    pub metadata: Metadata,
    /// Stored source column
    pub source: Option<String>,
    /// Relevance score reported to clients (semantic when available)
    pub score: f32,
    /// Weighted hybrid score used for ranking
    pub final_score: f32,
}

impl RetrievedChunk {
    /// Origin label: stored column, else metadata, else "unknown"
    pub fn source_label(&self) -> &str {
        self.source
            .as_deref()
            .or_else(|| self.metadata.get("source").and_then(Value::as_str))
            .unwrap_or("unknown")
    }

    /// Chunk index within its page, if recorded
    pub fn chunk_id(&self) -> Option<u64> {
        self.metadata.get("chunk_id").and_then(Value::as_u64)
    }
}
