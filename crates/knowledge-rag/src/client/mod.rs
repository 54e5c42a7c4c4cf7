//! Typed HTTP client for the knowledge base API
//!
//! [`RagApi`] is the seam the panel talks through; [`RagClient`] implements
//! it over reqwest against a running server.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{QueryRequest, QueryResponse, StatsResponse, UploadResponse};

/// Default server address
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// A file queued for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Create from in-memory content
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, keeping only its file name
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self { filename, bytes })
    }

    /// MIME type guessed from the extension
    pub fn mime(&self) -> String {
        mime_guess::from_path(&self.filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

/// The three knowledge base calls
#[async_trait]
pub trait RagApi: Send + Sync {
    /// POST `/rag/query`
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse>;

    /// POST `/rag/upload` with every file under the `files` field
    async fn upload(&self, files: &[UploadFile]) -> Result<UploadResponse>;

    /// GET `/rag/stats`
    async fn stats(&self) -> Result<StatsResponse>;
}

/// reqwest-backed API client
#[derive(Debug, Clone)]
pub struct RagClient {
    http: reqwest::Client,
    base_url: String,
    api_prefix: String,
}

impl Default for RagClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl RagClient {
    /// Create a client for `base_url` with the `/api/v1` prefix
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_prefix: "/api/v1".to_string(),
        }
    }

    /// Override the API prefix
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    /// Server address
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}/rag/{}", self.base_url, self.api_prefix, route)
    }

    /// Turn a non-success response into `Error::Api`, reading `detail` when it is a string
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("detail").and_then(|d| d.as_str()).map(str::to_string));

        Err(Error::Api {
            status: status.as_u16(),
            detail,
        })
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let response = Self::check(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl RagApi for RagClient {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let response = self.http.post(self.url("query")).json(request).send().await?;
        Self::parse(response).await
    }

    async fn upload(&self, files: &[UploadFile]) -> Result<UploadResponse> {
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.filename.clone())
                .mime_str(&file.mime())?;
            form = form.part("files", part);
        }

        let response = self.http.post(self.url("upload")).multipart(form).send().await?;
        let response = Self::check(response).await?;

        // The summary is informational; an unexpected body is not a failure
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body).unwrap_or_default())
    }

    async fn stats(&self) -> Result<StatsResponse> {
        let response = self.http.get(self.url("stats")).send().await?;
        Self::parse(response).await
    }
}
