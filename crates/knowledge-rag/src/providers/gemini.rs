//! Gemini embedding provider (Google Generative Language API)
//!
//! Documents go through `batchEmbedContents` with the `RETRIEVAL_DOCUMENT`
//! task, queries through `embedContent` with `RETRIEVAL_QUERY`. Vectors are
//! cached per (task, text).

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::providers::embedding::EmbeddingProvider;

const DOCUMENT_TITLE: &str = "RAG Document";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

impl TaskType {
    fn as_str(self) -> &'static str {
        match self {
            TaskType::RetrievalDocument => "RETRIEVAL_DOCUMENT",
            TaskType::RetrievalQuery => "RETRIEVAL_QUERY",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini embedding provider
pub struct GeminiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    /// Model name as configured, reported to callers
    model: String,
    /// `models/`-prefixed resource name used in requests
    resource: String,
    dimensions: usize,
    batch_size: usize,
    cache_capacity: usize,
    cache: DashMap<String, Vec<f32>>,
}

impl GeminiEmbedder {
    /// Create a new embedder; a missing key only fails when a call is made
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let resource = if config.model.starts_with("models/") {
            config.model.clone()
        } else {
            format!("models/{}", config.model)
        };

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            resource,
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
            cache_capacity: config.cache_capacity,
            cache: DashMap::new(),
        })
    }

    /// Number of cached vectors
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn api_key(&self) -> Result<&str> {
        if self.api_key.is_empty() {
            return Err(Error::Config("GEMINI_API_KEY is not set".to_string()));
        }
        Ok(&self.api_key)
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}:{}", self.base_url, self.resource, method)
    }

    fn cache_key(task: TaskType, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(task.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn cache_get(&self, task: TaskType, text: &str) -> Option<Vec<f32>> {
        self.cache
            .get(&Self::cache_key(task, text))
            .map(|v| v.value().clone())
    }

    fn cache_put(&self, task: TaskType, text: &str, embedding: Vec<f32>) {
        if self.cache_capacity == 0 {
            return;
        }
        if self.cache.len() >= self.cache_capacity {
            tracing::debug!("Embedding cache full ({} entries), clearing", self.cache.len());
            self.cache.clear();
        }
        self.cache.insert(Self::cache_key(task, text), embedding);
    }

    fn check_dimensions(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimensions {
            return Err(Error::embedding(format!(
                "Expected {} dimensions, got {}",
                self.dimensions,
                embedding.len()
            )));
        }
        Ok(())
    }

    async fn post<B: Serialize + ?Sized>(&self, method: &str, body: &B) -> Result<reqwest::Response> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .post(self.endpoint(method))
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::embedding(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::embedding(format!(
                "Gemini {} failed ({}): {}",
                method, status, body
            )));
        }

        Ok(response)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|&text| EmbedContentRequest {
                    model: &self.resource,
                    content: Content {
                        parts: vec![Part { text }],
                    },
                    task_type: TaskType::RetrievalDocument,
                    title: Some(DOCUMENT_TITLE),
                })
                .collect(),
        };

        let response: BatchEmbedResponse = self
            .post("batchEmbedContents", &request)
            .await?
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse Gemini batch response: {}", e)))?;

        if response.embeddings.len() != texts.len() {
            return Err(Error::embedding(format!(
                "Requested {} embeddings, received {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        response
            .embeddings
            .into_iter()
            .map(|e| {
                self.check_dimensions(&e.values)?;
                Ok(e.values)
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let mut slots: Vec<Option<Vec<f32>>> = batch
                .iter()
                .map(|text| self.cache_get(TaskType::RetrievalDocument, text))
                .collect();

            let mut uncached: Vec<&str> = Vec::new();
            for (text, slot) in batch.iter().zip(&slots) {
                if slot.is_none() && !uncached.contains(&text.as_str()) {
                    uncached.push(text);
                }
            }

            if !uncached.is_empty() {
                tracing::debug!("Embedding {} uncached texts", uncached.len());
                let vectors = self.embed_batch(&uncached).await?;

                for (text, vector) in uncached.iter().zip(vectors) {
                    for (candidate, slot) in batch.iter().zip(slots.iter_mut()) {
                        if slot.is_none() && candidate == text {
                            *slot = Some(vector.clone());
                        }
                    }
                    self.cache_put(TaskType::RetrievalDocument, text, vector);
                }
            }

            for slot in slots {
                let vector = slot.ok_or_else(|| Error::embedding("Missing embedding for batch entry"))?;
                embeddings.push(vector);
            }
        }

        Ok(embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.cache_get(TaskType::RetrievalQuery, text) {
            return Ok(cached);
        }

        let request = EmbedContentRequest {
            model: &self.resource,
            content: Content {
                parts: vec![Part { text }],
            },
            task_type: TaskType::RetrievalQuery,
            title: None,
        };

        let response: EmbedContentResponse = self
            .post("embedContent", &request)
            .await?
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse Gemini response: {}", e)))?;

        let embedding = response.embedding.values;
        self.check_dimensions(&embedding)?;
        self.cache_put(TaskType::RetrievalQuery, text, embedding.clone());
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .get(format!("{}/{}", self.base_url, self.resource))
            .header("x-goog-api-key", api_key)
            .send()
            .await?;

        Ok(response.status().is_success())
    }

    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
