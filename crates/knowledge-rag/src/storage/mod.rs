//! Persistent document storage

mod database;

pub use database::{build_fts_query, DocumentDb};
