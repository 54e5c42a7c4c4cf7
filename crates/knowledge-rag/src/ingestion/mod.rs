//! Document ingestion: loading uploads into pages and splitting pages into chunks

mod chunker;
mod loader;

pub use chunker::{SmartChunker, TokenCounter};
pub use loader::DocumentLoader;

#[cfg(test)]
pub(crate) use loader::testing;
