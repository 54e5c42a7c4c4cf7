//! Query/upload panel
//!
//! Holds the interactive state of the knowledge base front end and drives
//! the three API calls through a [`RagApi`].
//!
//! Queries and uploads come in two halves. `begin_*` flips the in-flight flag
//! and hands back the request to send; `finish_*` applies the outcome. A
//! front end that renders between the two shows the busy state, and
//! `submit_query`/`upload_files` run both halves back to back.

use std::fmt::Write as _;

use crate::client::{RagApi, UploadFile};
use crate::error::Result;
use crate::types::{QueryRequest, QueryResponse, StatsResponse, UploadResponse};

/// Fallback message when a failed query carries no `detail`
pub const QUERY_FAILED: &str = "Something went wrong";

/// Fallback message when a failed upload carries no `detail`
pub const UPLOAD_FAILED: &str = "Upload failed";

/// Results requested per query
pub const TOP_K: usize = 5;

/// Key presses the query input reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
}

/// Panel state bound to an API implementation
pub struct RagPanel<A: RagApi> {
    api: A,
    query: String,
    response: Option<QueryResponse>,
    loading: bool,
    error: Option<String>,
    dragging: bool,
    uploading: bool,
    stats: Option<StatsResponse>,
}

impl<A: RagApi> RagPanel<A> {
    /// Create an empty panel; call [`RagPanel::mount`] to load stats
    pub fn new(api: A) -> Self {
        Self {
            api,
            query: String::new(),
            response: None,
            loading: false,
            error: None,
            dragging: false,
            uploading: false,
            stats: None,
        }
    }

    /// Initial stats fetch
    pub async fn mount(&mut self) {
        self.refresh_stats().await;
    }

    /// The API the panel talks to
    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn response(&self) -> Option<&QueryResponse> {
        self.response.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn stats(&self) -> Option<&StatsResponse> {
        self.stats.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    /// Replace the query text
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Whether the send control is enabled
    pub fn can_submit(&self) -> bool {
        !self.loading && !self.query.trim().is_empty()
    }

    /// Send the current query; blank input is ignored
    pub async fn submit_query(&mut self) {
        if let Some(request) = self.begin_query() {
            let result = self.api.query(&request).await;
            self.finish_query(result);
        }
    }

    /// Enter the loading state and build the request for the current query.
    ///
    /// Returns `None` without touching state when the query is blank or a
    /// query is already in flight.
    pub fn begin_query(&mut self) -> Option<QueryRequest> {
        if !self.can_submit() {
            return None;
        }

        self.loading = true;
        self.error = None;
        self.response = None;

        Some(
            QueryRequest::new(self.query.clone())
                .with_top_k(TOP_K)
                .with_optimize_query(true),
        )
    }

    /// Apply the outcome of a query started with [`RagPanel::begin_query`]
    pub fn finish_query(&mut self, result: Result<QueryResponse>) {
        match result {
            Ok(response) => self.response = Some(response),
            Err(e) => {
                tracing::error!(error = %e, "Query failed");
                self.error = Some(e.detail().unwrap_or(QUERY_FAILED).to_string());
            }
        }

        self.loading = false;
    }

    /// Upload a batch of files as one request
    pub async fn upload_files(&mut self, files: Vec<UploadFile>) {
        if let Some(files) = self.begin_upload(files) {
            let result = self.api.upload(&files).await;
            self.finish_upload(result).await;
        }
    }

    /// Enter the uploading state; hands the files back to send.
    ///
    /// Returns `None` for an empty batch or while another upload is running.
    pub fn begin_upload(&mut self, files: Vec<UploadFile>) -> Option<Vec<UploadFile>> {
        if files.is_empty() || self.uploading {
            return None;
        }

        self.uploading = true;
        self.error = None;
        Some(files)
    }

    /// Apply the outcome of an upload started with [`RagPanel::begin_upload`].
    /// Success refreshes stats and clears the query.
    pub async fn finish_upload(&mut self, result: Result<UploadResponse>) {
        match result {
            Ok(summary) => {
                tracing::debug!(?summary, "Upload accepted");
                self.refresh_stats().await;
                self.query.clear();
            }
            Err(e) => {
                tracing::error!(error = %e, "Upload failed");
                self.error = Some(e.detail().unwrap_or(UPLOAD_FAILED).to_string());
            }
        }

        self.uploading = false;
    }

    /// Files chosen through the picker
    pub async fn select_files(&mut self, files: Vec<UploadFile>) {
        self.upload_files(files).await;
    }

    /// Files dropped onto the upload zone
    pub async fn drop_files(&mut self, files: Vec<UploadFile>) {
        self.dragging = false;
        self.upload_files(files).await;
    }

    pub fn drag_over(&mut self) {
        self.dragging = true;
    }

    pub fn drag_leave(&mut self) {
        self.dragging = false;
    }

    /// Re-fetch corpus stats; failures are only logged
    pub async fn refresh_stats(&mut self) {
        match self.api.stats().await {
            Ok(stats) => self.stats = Some(stats),
            Err(e) => tracing::warn!(error = %e, "Failed to fetch stats"),
        }
    }

    /// Enter submits the query
    pub async fn key_press(&mut self, key: Key) {
        match key {
            Key::Enter => self.submit_query().await,
        }
    }

    /// Plain-text rendering of the panel
    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "AI Knowledge Base");
        let _ = writeln!(out, "Supercharged RAG System");
        if let Some(stats) = &self.stats {
            let _ = writeln!(
                out,
                "📚 {} Documents  ⚡ {}",
                stats.total_documents, stats.embedding_model
            );
        }
        out.push('\n');

        if self.uploading {
            let _ = writeln!(out, "[ Uploading... ]");
        } else if self.dragging {
            let _ = writeln!(out, "[ Drop Files Here ]");
        } else {
            let _ = writeln!(out, "[ Drag & Drop or Click to Upload ]");
            let _ = writeln!(out, "  PDF, TXT supported");
        }

        let button = if self.loading { "..." } else { "Send" };
        if self.query.is_empty() {
            let _ = writeln!(out, "> Ask anything...  [{}]", button);
        } else {
            let _ = writeln!(out, "> {}  [{}]", self.query, button);
        }

        if let Some(error) = &self.error {
            let _ = writeln!(out, "\n! {}", error);
        }

        if let Some(response) = &self.response {
            let _ = writeln!(out, "\nAI Answer");
            let _ = writeln!(out, "{}", response.answer);
            let _ = writeln!(out, "Tokens: {}", response.tokens_used);

            if !response.sources.is_empty() {
                let _ = writeln!(out, "\nSources");
                for source in &response.sources {
                    let _ = writeln!(out, "- {} ({}% Match)", source.source, source.match_percent());
                    let _ = writeln!(out, "  {}", source.content);
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::SourceDocument;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Query(QueryRequest),
        Upload(Vec<String>),
        Stats,
    }

    #[derive(Default)]
    struct MockApi {
        calls: Mutex<Vec<Call>>,
        queries: Mutex<VecDeque<Result<QueryResponse>>>,
        uploads: Mutex<VecDeque<Result<UploadResponse>>>,
        stats: Mutex<VecDeque<Result<StatsResponse>>>,
    }

    impl MockApi {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        fn on_query(self, result: Result<QueryResponse>) -> Self {
            self.queries.lock().push_back(result);
            self
        }

        fn on_upload(self, result: Result<UploadResponse>) -> Self {
            self.uploads.lock().push_back(result);
            self
        }

        fn on_stats(self, result: Result<StatsResponse>) -> Self {
            self.stats.lock().push_back(result);
            self
        }
    }

    #[async_trait]
    impl RagApi for MockApi {
        async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
            self.calls.lock().push(Call::Query(request.clone()));
            self.queries
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(Error::internal("unexpected query")))
        }

        async fn upload(&self, files: &[UploadFile]) -> Result<UploadResponse> {
            self.calls
                .lock()
                .push(Call::Upload(files.iter().map(|f| f.filename.clone()).collect()));
            self.uploads
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(Error::internal("unexpected upload")))
        }

        async fn stats(&self) -> Result<StatsResponse> {
            self.calls.lock().push(Call::Stats);
            self.stats
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(Error::internal("unexpected stats")))
        }
    }

    fn stats(total: u64) -> StatsResponse {
        StatsResponse {
            total_documents: total,
            embedding_model: "text-embedding-004".to_string(),
            llm_model: None,
        }
    }

    fn answer(sources: Vec<SourceDocument>) -> QueryResponse {
        QueryResponse {
            query: "What is X?".to_string(),
            optimized_query: None,
            answer: "X is Y [Doc 1]".to_string(),
            sources,
            tokens_used: 120,
        }
    }

    fn api_error(status: u16, detail: Option<&str>) -> Error {
        Error::Api {
            status,
            detail: detail.map(str::to_string),
        }
    }

    fn files() -> Vec<UploadFile> {
        vec![UploadFile::new("a.pdf", "%PDF"), UploadFile::new("b.txt", "hello")]
    }

    #[tokio::test]
    async fn test_mount_loads_stats() {
        let mut panel = RagPanel::new(MockApi::default().on_stats(Ok(stats(42))));
        panel.mount().await;

        assert_eq!(panel.stats().map(|s| s.total_documents), Some(42));
        let view = panel.render();
        assert!(view.contains("📚 42 Documents"));
        assert!(view.contains("⚡ text-embedding-004"));
    }

    #[tokio::test]
    async fn test_stats_failure_is_silent() {
        let mut panel = RagPanel::new(MockApi::default().on_stats(Err(api_error(500, Some("down")))));
        panel.mount().await;

        assert!(panel.stats().is_none());
        assert!(panel.error().is_none());
        assert!(!panel.render().contains("Documents"));
    }

    #[tokio::test]
    async fn test_blank_query_is_ignored() {
        let mut panel = RagPanel::new(MockApi::default());
        panel.set_query("   ");

        assert!(!panel.can_submit());
        panel.submit_query().await;
        panel.key_press(Key::Enter).await;

        assert!(panel.api().calls().is_empty());
        assert!(panel.response().is_none());
        assert!(panel.error().is_none());
        assert!(!panel.is_loading());
    }

    #[tokio::test]
    async fn test_submit_sends_raw_query() {
        let source = SourceDocument {
            source: "x.txt".to_string(),
            content: "X is Y...".to_string(),
            score: Some(0.92),
            chunk_id: Some(0),
        };
        let mut panel = RagPanel::new(MockApi::default().on_query(Ok(answer(vec![source.clone()]))));
        panel.set_query("  What is X? ");
        assert!(panel.can_submit());

        panel.submit_query().await;

        assert_eq!(
            panel.api().calls(),
            vec![Call::Query(QueryRequest::new("  What is X? ").with_top_k(5).with_optimize_query(true))]
        );
        let response = panel.response().unwrap();
        assert_eq!(response.answer, "X is Y [Doc 1]");
        assert_eq!(response.sources, vec![source]);
        assert!(!panel.is_loading());

        let view = panel.render();
        assert!(view.contains("X is Y [Doc 1]"));
        assert!(view.contains("Tokens: 120"));
        assert!(view.contains("x.txt (92% Match)"));
        assert!(view.contains("X is Y..."));
    }

    #[tokio::test]
    async fn test_empty_sources_hide_section() {
        let mut panel = RagPanel::new(MockApi::default().on_query(Ok(answer(Vec::new()))));
        panel.set_query("q");
        panel.submit_query().await;

        let view = panel.render();
        assert!(view.contains("Tokens: 120"));
        assert!(!view.contains("Sources"));
    }

    #[tokio::test]
    async fn test_query_error_uses_detail() {
        let mut panel = RagPanel::new(
            MockApi::default().on_query(Err(api_error(400, Some("Query cannot be empty")))),
        );
        panel.set_query("q");
        panel.submit_query().await;

        assert_eq!(panel.error(), Some("Query cannot be empty"));
        assert!(panel.response().is_none());
        assert!(!panel.is_loading());
        assert!(panel.render().contains("! Query cannot be empty"));
    }

    #[tokio::test]
    async fn test_query_error_fallback() {
        let mut panel = RagPanel::new(MockApi::default().on_query(Err(api_error(502, None))));
        panel.set_query("q");
        panel.submit_query().await;

        assert_eq!(panel.error(), Some(QUERY_FAILED));
    }

    #[tokio::test]
    async fn test_new_query_clears_previous_state() {
        let api = MockApi::default()
            .on_query(Err(api_error(500, None)))
            .on_query(Ok(answer(Vec::new())));
        let mut panel = RagPanel::new(api);
        panel.set_query("q");

        panel.submit_query().await;
        assert!(panel.error().is_some());

        panel.key_press(Key::Enter).await;
        assert!(panel.error().is_none());
        assert!(panel.response().is_some());
    }

    #[tokio::test]
    async fn test_query_in_flight_state() {
        let mut panel = RagPanel::new(MockApi::default().on_query(Err(api_error(500, None))));
        panel.set_query("q");
        panel.submit_query().await;
        assert_eq!(panel.error(), Some(QUERY_FAILED));

        let request = panel.begin_query().unwrap();
        assert_eq!(request, QueryRequest::new("q").with_top_k(TOP_K).with_optimize_query(true));
        assert!(panel.is_loading());
        assert!(!panel.can_submit());
        assert!(panel.error().is_none());
        assert!(panel.response().is_none());
        let view = panel.render();
        assert!(view.contains("> q  [...]"));
        assert!(!view.contains("[Send]"));

        // Enter while loading sends nothing
        assert!(panel.begin_query().is_none());
        panel.key_press(Key::Enter).await;
        assert_eq!(panel.api().calls().len(), 1);

        panel.finish_query(Ok(answer(Vec::new())));
        assert!(!panel.is_loading());
        assert!(panel.can_submit());
        assert!(panel.render().contains("> q  [Send]"));
        assert_eq!(panel.response().map(|r| r.tokens_used), Some(120));
    }

    #[tokio::test]
    async fn test_upload_in_flight_state() {
        let api = MockApi::default()
            .on_upload(Err(api_error(413, None)))
            .on_stats(Ok(stats(3)));
        let mut panel = RagPanel::new(api);
        panel.set_query("draft");
        panel.select_files(files()).await;
        assert_eq!(panel.error(), Some(UPLOAD_FAILED));

        panel.drag_over();
        let sent = panel.begin_upload(files()).unwrap();
        assert_eq!(sent.len(), 2);
        assert!(panel.is_uploading());
        assert!(panel.error().is_none());
        let view = panel.render();
        assert!(view.contains("[ Uploading... ]"));
        assert!(!view.contains("Drop Files Here"));

        assert!(panel.begin_upload(files()).is_none());

        panel.finish_upload(Ok(UploadResponse::default())).await;
        assert!(!panel.is_uploading());
        assert_eq!(panel.query(), "");
        assert_eq!(panel.stats().map(|s| s.total_documents), Some(3));
        assert!(!panel.render().contains("Uploading..."));
    }

    #[tokio::test]
    async fn test_upload_refreshes_stats_and_clears_query() {
        let api = MockApi::default()
            .on_upload(Ok(UploadResponse::processed(2, 7, vec!["a.pdf".into(), "b.txt".into()])))
            .on_stats(Ok(stats(49)));
        let mut panel = RagPanel::new(api);
        panel.set_query("draft");

        panel.select_files(files()).await;

        assert_eq!(
            panel.api().calls(),
            vec![Call::Upload(vec!["a.pdf".into(), "b.txt".into()]), Call::Stats]
        );
        assert_eq!(panel.query(), "");
        assert!(!panel.is_uploading());
        assert!(panel.render().contains("📚 49 Documents"));
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_query() {
        let mut panel = RagPanel::new(MockApi::default().on_upload(Err(api_error(413, None))));
        panel.set_query("draft");

        panel.select_files(files()).await;

        assert_eq!(panel.error(), Some(UPLOAD_FAILED));
        assert_eq!(panel.query(), "draft");
        assert_eq!(panel.api().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_failure_detail() {
        let mut panel = RagPanel::new(
            MockApi::default().on_upload(Err(api_error(400, Some("Unsupported file type: .docx")))),
        );
        panel.upload_files(vec![UploadFile::new("a.docx", "x")]).await;

        assert_eq!(panel.error(), Some("Unsupported file type: .docx"));
    }

    #[tokio::test]
    async fn test_empty_upload_is_ignored() {
        let mut panel = RagPanel::new(MockApi::default());
        panel.upload_files(Vec::new()).await;
        panel.drop_files(Vec::new()).await;

        assert!(panel.api().calls().is_empty());
        assert!(!panel.is_uploading());
    }

    #[tokio::test]
    async fn test_drop_matches_select() {
        let select = MockApi::default()
            .on_upload(Ok(UploadResponse::default()))
            .on_stats(Ok(stats(1)));
        let mut selected = RagPanel::new(select);
        selected.select_files(files()).await;

        let drop = MockApi::default()
            .on_upload(Ok(UploadResponse::default()))
            .on_stats(Ok(stats(1)));
        let mut dropped = RagPanel::new(drop);
        dropped.drag_over();
        dropped.drop_files(files()).await;

        assert_eq!(selected.api().calls(), dropped.api().calls());
        assert!(!dropped.is_dragging());
    }

    #[test]
    fn test_drag_state_render() {
        let mut panel = RagPanel::new(MockApi::default());
        assert!(panel.render().contains("Drag & Drop or Click to Upload"));
        assert!(panel.render().contains("PDF, TXT supported"));

        panel.drag_over();
        assert!(panel.is_dragging());
        assert!(panel.render().contains("Drop Files Here"));

        panel.drag_leave();
        assert!(!panel.is_dragging());
        assert!(!panel.render().contains("Drop Files Here"));
    }
}
