//! Configuration for the knowledge base
//!
//! Settings come from built-in defaults, optionally overlaid by a TOML file,
//! and finally by environment variables (API keys never need to live in the
//! file).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "RAG_CONFIG";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Project name reported in logs
    pub project_name: String,
    /// Prefix for versioned API routes
    pub api_prefix: String,
    /// Server configuration
    pub server: ServerConfig,
    /// Document database configuration
    pub database: DatabaseConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chat completion (OpenRouter) configuration
    pub llm: LlmConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            project_name: "RAG System".to_string(),
            api_prefix: "/api/v1".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            embeddings: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RagConfig {
    /// Load configuration: explicit file, else `RAG_CONFIG`, else defaults,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse TOML text; missing sections and keys keep their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GEMINI_API_KEY") {
            self.embeddings.api_key = key;
        }
        if let Some(key) = non_empty("OPENROUTER_API_KEY") {
            self.llm.api_key = key;
        }
        if let Some(model) = non_empty("EMBEDDING_MODEL") {
            self.embeddings.model = model;
        }
        if let Some(model) = non_empty("MODEL_NAME") {
            self.llm.model = model;
        }
        if let Some(host) = non_empty("RAG_HOST") {
            self.server.host = host;
        }
        if let Some(port) = non_empty("RAG_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid RAG_PORT value: {}", port),
            }
        }
        if let Some(path) = non_empty("RAG_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(format) = non_empty("RAG_LOG_FORMAT") {
            match format.to_lowercase().as_str() {
                "json" => self.logging.format = LogFormat::Json,
                "pretty" | "text" => self.logging.format = LogFormat::Pretty,
                other => tracing::warn!("Ignoring unknown RAG_LOG_FORMAT value: {}", other),
            }
        }
    }

    /// Full prefix of the RAG router, e.g. `/api/v1/rag`
    pub fn rag_prefix(&self) -> String {
        format!("{}/rag", self.api_prefix.trim_end_matches('/'))
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable permissive CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// Document database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("knowledge-rag")
            .join("documents.db");

        Self { path }
    }
}

/// Embedding (Gemini) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Generative Language API base URL
    pub base_url: String,
    /// API key (usually from GEMINI_API_KEY)
    pub api_key: String,
    /// Embedding model resource name
    pub model: String,
    /// Embedding dimensions
    pub dimensions: usize,
    /// Texts per batch request
    pub batch_size: usize,
    /// Maximum cached embeddings before the cache is flushed
    pub cache_capacity: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: String::new(),
            model: "models/text-embedding-004".to_string(),
            dimensions: 768,
            batch_size: 20,
            cache_capacity: 10_000,
            timeout_secs: 60,
        }
    }
}

/// Chat completion (OpenRouter) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible API base URL
    pub base_url: String,
    /// API key (usually from OPENROUTER_API_KEY)
    pub api_key: String,
    /// Model used for optimization, generation and judging
    pub model: String,
    /// Temperature for answer generation
    pub temperature: f32,
    /// Maximum answer tokens
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Value of the HTTP-Referer attribution header
    pub referer: String,
    /// Value of the X-Title attribution header
    pub title: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: String::new(),
            model: "google/gemini-3-flash-preview".to_string(),
            temperature: 0.1,
            max_tokens: 500,
            timeout_secs: 120,
            referer: "https://github.com/knowledge-rag/knowledge-rag".to_string(),
            title: "RAG System".to_string(),
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in tokens
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in tokens
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Hybrid retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Weight of the semantic score (keyword gets 1 - weight)
    pub semantic_weight: f32,
    /// Candidates fetched per side, as a multiple of top_k
    pub candidate_multiplier: usize,
    /// Characters of chunk content returned as a source snippet
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.7,
            candidate_multiplier: 2,
            snippet_chars: 200,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable lines
    Pretty,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Filter used when RUST_LOG is unset
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            default_filter: "knowledge_rag=info,tower_http=info".to_string(),
        }
    }
}
