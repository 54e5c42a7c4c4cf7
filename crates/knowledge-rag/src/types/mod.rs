//! Core types for the knowledge base

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, DocumentPage, FileType, Metadata, RetrievedChunk};
pub use query::QueryRequest;
pub use response::{QueryResponse, SourceDocument, StatsResponse, UploadResponse};
