//! Provider abstractions for embeddings and chat completion
//!
//! The server only talks to `dyn EmbeddingProvider` / `dyn LlmProvider`, so
//! tests and alternative backends can be swapped in without touching routes.

pub mod embedding;
pub mod gemini;
pub mod llm;
pub mod openrouter;

pub use embedding::EmbeddingProvider;
pub use gemini::GeminiEmbedder;
pub use llm::{ChatCompletion, ChatMessage, ChatRequest, LlmProvider};
pub use openrouter::OpenRouterClient;

#[cfg(test)]
pub(crate) mod testing;
