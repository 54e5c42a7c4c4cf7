//! Query request types

use serde::{Deserialize, Serialize};

/// Query request for `POST /rag/query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    pub query: String,
    /// Number of passages to retrieve
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Rewrite the query with the LLM before retrieval
    #[serde(default = "default_optimize_query")]
    pub optimize_query: bool,
}

fn default_top_k() -> usize {
    5
}

fn default_optimize_query() -> bool {
    true
}

impl QueryRequest {
    /// Create a request with default options
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: default_top_k(),
            optimize_query: default_optimize_query(),
        }
    }

    /// Set top_k
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Enable or disable query optimization
    pub fn with_optimize_query(mut self, optimize: bool) -> Self {
        self.optimize_query = optimize;
        self
    }
}
