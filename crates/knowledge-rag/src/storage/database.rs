//! SQLite document store with embeddings and full-text search
//!
//! Chunks live in `documents` with their embedding as a little-endian f32
//! BLOB. An external-content FTS5 table (porter stemming) mirrors `content`
//! through triggers.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{Chunk, Metadata, RetrievedChunk};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        doc_metadata TEXT NOT NULL DEFAULT '{}',
        source TEXT,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_documents_source ON documents(source);

    CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
        content,
        content='documents',
        content_rowid='id',
        tokenize='porter unicode61'
    );

    CREATE TRIGGER IF NOT EXISTS documents_ai AFTER INSERT ON documents BEGIN
        INSERT INTO documents_fts(rowid, content) VALUES (NEW.id, NEW.content);
    END;

    CREATE TRIGGER IF NOT EXISTS documents_ad AFTER DELETE ON documents BEGIN
        INSERT INTO documents_fts(documents_fts, rowid, content) VALUES ('delete', OLD.id, OLD.content);
    END;

    CREATE TRIGGER IF NOT EXISTS documents_au AFTER UPDATE ON documents BEGIN
        INSERT INTO documents_fts(documents_fts, rowid, content) VALUES ('delete', OLD.id, OLD.content);
        INSERT INTO documents_fts(rowid, content) VALUES (NEW.id, NEW.content);
    END;
"#;

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "me",
    "more", "most", "my", "myself", "no", "nor", "not", "of", "off", "on", "once", "only", "or",
    "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she", "should", "so",
    "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "would", "you", "your", "yours", "yourself", "yourselves",
];

/// Build an FTS5 MATCH expression from free text: alphanumeric terms,
/// lowercased, stopwords removed, each quoted, implicitly AND-ed.
/// Returns `None` when no searchable term remains.
pub fn build_fts_query(query: &str) -> Option<String> {
    let mut terms: Vec<String> = Vec::new();

    for term in query.split(|c: char| !c.is_alphanumeric()) {
        let term = term.to_lowercase();
        if term.is_empty() || STOPWORDS.contains(&term.as_str()) || terms.contains(&term) {
            continue;
        }
        terms.push(term);
    }

    if terms.is_empty() {
        return None;
    }

    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// Map a bm25 rank (more negative is better) into [0.5, 1)
fn keyword_score(rank: f64) -> f32 {
    let r = (-rank).max(0.0);
    (0.5 + (r / (1.0 + r)) / 2.0) as f32
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity, 0 when either vector has zero norm
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn parse_metadata(raw: &str) -> Metadata {
    serde_json::from_str(raw).unwrap_or_default()
}

fn row_to_chunk(row: &Row<'_>, score: f32) -> rusqlite::Result<RetrievedChunk> {
    let raw: String = row.get(2)?;
    Ok(RetrievedChunk {
        id: row.get(0)?,
        content: row.get(1)?,
        metadata: parse_metadata(&raw),
        source: row.get(3)?,
        score,
        final_score: score,
    })
}

/// SQLite-backed document store
#[derive(Clone)]
pub struct DocumentDb {
    conn: Arc<Mutex<Connection>>,
}

impl DocumentDb {
    /// Create or open the database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::Database(format!("Failed to open {}: {}", path.display(), e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
        "#,
        )
        .map_err(|e| Error::Database(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::Database(format!("Failed to create schema: {}", e)))?;

        Ok(())
    }

    /// Store chunks with their embeddings in one transaction
    pub fn insert_documents(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<usize> {
        if chunks.len() != embeddings.len() {
            return Err(Error::internal(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let now = Utc::now();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO documents (content, embedding, doc_metadata, source, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for (chunk, embedding) in chunks.iter().zip(embeddings) {
                let metadata = serde_json::to_string(&chunk.metadata)?;
                stmt.execute(params![
                    chunk.content,
                    encode_embedding(embedding),
                    metadata,
                    chunk.source(),
                    now,
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!("Stored {} chunks", chunks.len());
        Ok(chunks.len())
    }

    /// Number of stored chunk rows
    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Top `limit` rows by cosine similarity; rows of another dimension are skipped
    pub fn semantic_search(&self, query: &[f32], limit: usize) -> Result<Vec<RetrievedChunk>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, content, doc_metadata, source, embedding FROM documents")?;

        let mut rows = stmt.query([])?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let blob: Vec<u8> = row.get(4)?;
            let embedding = decode_embedding(&blob);
            if embedding.len() != query.len() {
                continue;
            }
            let score = cosine_similarity(query, &embedding);
            results.push(row_to_chunk(row, score)?);
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(limit);
        Ok(results)
    }

    /// Top `limit` rows by bm25 over the FTS index
    pub fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<RetrievedChunk>> {
        let Some(fts_query) = build_fts_query(query) else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT d.id, d.content, d.doc_metadata, d.source, bm25(documents_fts) AS rank
             FROM documents_fts
             JOIN documents d ON d.id = documents_fts.rowid
             WHERE documents_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;

        let results = stmt
            .query_map(params![fts_query, i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                let rank: f64 = row.get(4)?;
                row_to_chunk(row, keyword_score(rank))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(results)
    }

    /// Drop every table and re-create the empty schema
    pub fn reset(&self) -> Result<()> {
        {
            let conn = self.conn.lock();
            conn.execute_batch(
                r#"
                DROP TRIGGER IF EXISTS documents_ai;
                DROP TRIGGER IF EXISTS documents_ad;
                DROP TRIGGER IF EXISTS documents_au;
                DROP TABLE IF EXISTS documents_fts;
                DROP TABLE IF EXISTS documents;
            "#,
            )?;
        }

        self.migrate()?;
        tracing::info!("Document database reset");
        Ok(())
    }
}
