//! Prompt templates for query rewriting and grounded answers

use crate::types::RetrievedChunk;

/// System prompt for answer generation
pub const ANSWER_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Answer questions \
based ONLY on the provided context. If the context doesn't contain the answer, say \
\"I don't have enough information to answer that.\"\n\n\
Always cite your sources by referencing [Doc X] where X is the document number.";

/// System prompt for query rewriting
pub const OPTIMIZER_SYSTEM_PROMPT: &str = "You are a helpful assistant that improves search queries. \
Take the user's input/question and rephrase it to be a better semantic search query. \
Remove filler words, fix typos, and focus on keywords. \
Output ONLY the optimized query. Do not explain.";

/// Prompt builder for grounded answers
pub struct PromptBuilder;

impl PromptBuilder {
    /// Number the passages as `[Doc i]` blocks, 1-based
    pub fn build_context(docs: &[RetrievedChunk]) -> String {
        docs.iter()
            .enumerate()
            .map(|(i, doc)| format!("[Doc {}]\n{}\n", i + 1, doc.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// User turn carrying the context and the question
    pub fn build_user_prompt(question: &str, context: &str) -> String {
        format!("Context:\n{}\n\nQuestion: {}\n\nAnswer:", context, question)
    }

    /// LLM-as-judge prompt comparing a generated answer to a reference
    pub fn build_judge_prompt(query: &str, reference: &str, generated: &str) -> String {
        format!(
            r#"You are an expert judge evaluating the quality of a RAG system's answer.

Query: {query}

Reference Answer (Ground Truth):
{reference}

Generated Answer:
{generated}

Rate the quality of the Generated Answer compared to the Reference Answer on a scale of 1 to 5.
1 = Completely wrong or irrelevant
3 = Partially correct but missing key identifying details
5 = Perfect match or better quality than reference

Return ONLY the integer score (e.g. 5). Do not output any text.
Score:"#
        )
    }
}
