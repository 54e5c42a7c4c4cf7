//! Hybrid semantic + keyword retrieval

mod search;

pub use search::{hybrid_rerank, HybridRetriever};
