//! knowledge-rag: document knowledge base with hybrid retrieval and cited answers
//!
//! The crate contains both halves of the system:
//! - the backend service (upload, chunking, embeddings, hybrid retrieval,
//!   answer generation, corpus stats) served over axum, and
//! - the client side: a typed HTTP client for the three `/api/v1/rag` routes
//!   and the query/upload panel state that drives it.

pub mod client;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod generation;
pub mod ingestion;
pub mod logging;
pub mod panel;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod storage;
pub mod types;

pub use client::{RagApi, RagClient, UploadFile};
pub use config::RagConfig;
pub use error::{Error, Result};
pub use panel::{Key, RagPanel};
pub use types::{
    query::QueryRequest,
    response::{QueryResponse, SourceDocument, StatsResponse, UploadResponse},
};
