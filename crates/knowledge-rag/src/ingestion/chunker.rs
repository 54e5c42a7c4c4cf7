//! Token-aware recursive text chunking

use serde_json::Value;
use unicode_segmentation::UnicodeSegmentation;

use crate::types::{Chunk, DocumentPage};

/// Separators tried in order, coarsest first
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Approximate BPE token counter.
///
/// Each word-bound segment that is not whitespace costs one token per five
/// characters, rounded up. This tracks cl100k-style tokenizers closely enough
/// for sizing chunks without shipping a vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter;

impl TokenCounter {
    /// Estimated token count of `text`
    pub fn count(&self, text: &str) -> usize {
        text.split_word_bounds()
            .filter(|segment| !segment.trim().is_empty())
            .map(|segment| segment.chars().count().div_ceil(5).max(1))
            .sum()
    }
}

/// Recursive splitter with size and overlap measured in tokens
pub struct SmartChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    counter: TokenCounter,
}

impl Default for SmartChunker {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

impl SmartChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size),
            counter: TokenCounter,
        }
    }

    /// Chunk every page; each chunk copies its page metadata and adds
    /// `chunk_id` and `total_chunks` (both relative to that page)
    pub fn chunk_documents(&self, pages: &[DocumentPage]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in pages {
            let splits = self.split_text(&page.content);
            let total = splits.len();

            for (index, content) in splits.into_iter().enumerate() {
                let mut metadata = page.metadata.clone();
                metadata.insert("chunk_id".to_string(), Value::from(index));
                metadata.insert("total_chunks".to_string(), Value::from(total));
                chunks.push(Chunk { content, metadata });
            }
        }

        chunks
    }

    /// Split text into trimmed, non-empty chunks
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // First separator present in the text; "" always matches
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let mut chunks = Vec::new();
        let mut good: Vec<String> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if self.counter.count(&piece) < self.chunk_size {
                good.push(piece);
                continue;
            }

            if !good.is_empty() {
                chunks.extend(self.merge(&good));
                good.clear();
            }

            if remaining.is_empty() {
                if let Some(piece) = trimmed(&piece) {
                    chunks.push(piece);
                }
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !good.is_empty() {
            chunks.extend(self.merge(&good));
        }

        chunks
    }

    /// Greedily merge pieces up to `chunk_size`, carrying up to
    /// `chunk_overlap` tokens of trailing pieces into the next chunk
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: std::collections::VecDeque<(&str, usize)> = Default::default();
        let mut total = 0usize;

        for piece in pieces {
            let len = self.counter.count(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                if total > self.chunk_size {
                    tracing::debug!("Created a chunk of {} tokens, above {}", total, self.chunk_size);
                }

                if let Some(chunk) = join(window.iter().map(|(p, _)| *p)) {
                    chunks.push(chunk);
                }

                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, first)) => total -= first,
                        None => break,
                    }
                }
            }

            window.push_back((piece.as_str(), len));
            total += len;
        }

        if let Some(chunk) = join(window.iter().map(|(p, _)| *p)) {
            chunks.push(chunk);
        }

        chunks
    }
}

/// Split on `separator`, attaching it to the start of the following piece.
/// An empty separator splits into grapheme clusters. Empty pieces are dropped.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.graphemes(true).map(str::to_string).collect();
    }

    let mut pieces = Vec::new();
    for (i, part) in text.split(separator).enumerate() {
        let piece = if i == 0 {
            part.to_string()
        } else {
            format!("{}{}", separator, part)
        };
        if !piece.is_empty() {
            pieces.push(piece);
        }
    }
    pieces
}

fn join<'a>(pieces: impl Iterator<Item = &'a str>) -> Option<String> {
    let joined: String = pieces.collect();
    trimmed(&joined)
}

fn trimmed(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
