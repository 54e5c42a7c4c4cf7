//! Query optimization and answer generation with the chat model

pub mod generator;
pub mod optimizer;
pub mod prompt;

pub use generator::{GeneratedAnswer, RagGenerator};
pub use optimizer::QueryOptimizer;
pub use prompt::PromptBuilder;
