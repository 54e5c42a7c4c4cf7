//! Rewrites user questions into keyword-focused search queries

use std::sync::Arc;

use crate::generation::prompt::OPTIMIZER_SYSTEM_PROMPT;
use crate::providers::{ChatMessage, ChatRequest, LlmProvider};

/// Query optimizer; never fails, falls back to the input
pub struct QueryOptimizer {
    llm: Arc<dyn LlmProvider>,
}

impl QueryOptimizer {
    /// Create a new optimizer
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Rewrite `query`; returns it unchanged on any failure or empty output
    pub async fn optimize(&self, query: &str) -> String {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(OPTIMIZER_SYSTEM_PROMPT),
                ChatMessage::user(query),
            ],
            temperature: 0.0,
            max_tokens: 100,
        };

        match self.llm.chat(request).await {
            Ok(completion) => {
                let optimized = completion.content.trim();
                if optimized.is_empty() {
                    query.to_string()
                } else {
                    optimized.to_string()
                }
            }
            Err(e) => {
                tracing::warn!("Query optimization failed: {}", e);
                query.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::generation::testing::ScriptedLlm;

    #[tokio::test]
    async fn test_optimize_trims_reply() {
        let llm = Arc::new(ScriptedLlm::replying(vec![ScriptedLlm::text("  antigravity launch date \n", 7)]));
        let optimizer = QueryOptimizer::new(llm.clone());

        assert_eq!(optimizer.optimize("when does antigravity launch??").await, "antigravity launch date");

        let requests = llm.requests.lock();
        assert_eq!(requests[0].temperature, 0.0);
        assert_eq!(requests[0].max_tokens, 100);
        assert_eq!(requests[0].messages[1].content, "when does antigravity launch??");
    }

    #[tokio::test]
    async fn test_falls_back_on_error() {
        let llm = Arc::new(ScriptedLlm::replying(vec![Err(Error::llm("timeout"))]));
        let optimizer = QueryOptimizer::new(llm);
        assert_eq!(optimizer.optimize("original").await, "original");
    }

    #[tokio::test]
    async fn test_falls_back_on_blank_reply() {
        let llm = Arc::new(ScriptedLlm::replying(vec![ScriptedLlm::text("   ", 1)]));
        let optimizer = QueryOptimizer::new(llm);
        assert_eq!(optimizer.optimize("original").await, "original");
    }
}
