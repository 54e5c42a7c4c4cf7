//! Grounded answer generation with `[Doc X]` citations

use std::sync::Arc;

use crate::generation::prompt::{PromptBuilder, ANSWER_SYSTEM_PROMPT};
use crate::providers::{ChatMessage, ChatRequest, LlmProvider};
use crate::types::RetrievedChunk;

/// Result of answer generation
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub answer: String,
    /// Passages the answer was grounded on; empty when generation failed
    pub sources: Vec<RetrievedChunk>,
    pub tokens_used: u64,
}

/// Answer generator
pub struct RagGenerator {
    llm: Arc<dyn LlmProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl RagGenerator {
    /// Create a generator with explicit sampling settings
    pub fn new(llm: Arc<dyn LlmProvider>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            llm,
            temperature,
            max_tokens,
        }
    }

    /// Answer `query` from `docs`. Failures are reported in the answer text
    /// rather than as an error.
    pub async fn generate_answer(&self, query: &str, docs: Vec<RetrievedChunk>) -> GeneratedAnswer {
        let context = PromptBuilder::build_context(&docs);

        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(ANSWER_SYSTEM_PROMPT),
                ChatMessage::user(PromptBuilder::build_user_prompt(query, &context)),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        match self.llm.chat(request).await {
            Ok(completion) => GeneratedAnswer {
                answer: completion.content,
                sources: docs,
                tokens_used: completion.total_tokens,
            },
            Err(e) => {
                tracing::error!("Generation failed: {}", e);
                GeneratedAnswer {
                    answer: format!("Error generating answer: {}", e),
                    sources: Vec::new(),
                    tokens_used: 0,
                }
            }
        }
    }
}
