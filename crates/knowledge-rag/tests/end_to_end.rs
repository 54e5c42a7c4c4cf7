//! Runs the real router on a local port with in-process providers and drives
//! it through the HTTP client and the panel.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use knowledge_rag::evaluation::{run_system_evaluation, EvaluationDataset, RagEvaluator};
use knowledge_rag::generation::prompt::OPTIMIZER_SYSTEM_PROMPT;
use knowledge_rag::providers::{ChatCompletion, ChatRequest, EmbeddingProvider, LlmProvider};
use knowledge_rag::server::{state::AppState, RagServer};
use knowledge_rag::storage::DocumentDb;
use knowledge_rag::{Error, Key, QueryRequest, RagApi, RagClient, RagConfig, RagPanel, Result, UploadFile};

/// Letter-frequency vectors: similar wording lands close together
struct LetterEmbedder;

impl LetterEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; 26];
        for c in text.chars().filter(char::is_ascii_alphabetic) {
            v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    fn dimensions(&self) -> usize {
        26
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "letters"
    }

    fn model(&self) -> &str {
        "letter-frequency"
    }
}

/// Echoes queries back from the optimizer and answers with the first line of `[Doc 1]`
struct ExtractiveLlm;

#[async_trait]
impl LlmProvider for ExtractiveLlm {
    async fn chat(&self, request: ChatRequest) -> Result<ChatCompletion> {
        let system = request.messages.first().map(|m| m.content.as_str()).unwrap_or_default();
        let user = request.messages.last().map(|m| m.content.as_str()).unwrap_or_default();

        let content = if system == OPTIMIZER_SYSTEM_PROMPT {
            user.to_string()
        } else {
            match user.split_once("[Doc 1]\n") {
                Some((_, rest)) => format!("{} [Doc 1]", rest.lines().next().unwrap_or_default()),
                None => "I don't have enough information to answer that.".to_string(),
            }
        };

        Ok(ChatCompletion {
            content,
            total_tokens: 33,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "extractive"
    }

    fn model(&self) -> &str {
        "extractive-model"
    }
}

/// Judge that always awards full marks
struct GenerousJudge;

#[async_trait]
impl LlmProvider for GenerousJudge {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatCompletion> {
        Ok(ChatCompletion {
            content: "5".to_string(),
            total_tokens: 1,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "judge"
    }

    fn model(&self) -> &str {
        "judge-model"
    }
}

struct TestServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let state = AppState::with_providers(
            RagConfig::default(),
            DocumentDb::in_memory().unwrap(),
            Arc::new(LetterEmbedder),
            Arc::new(ExtractiveLlm),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(RagServer::with_state(state).serve(listener, async move {
            let _ = rx.await;
        }));

        Self { addr, shutdown, handle }
    }

    fn client(&self) -> RagClient {
        RagClient::new(format!("http://{}", self.addr))
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        self.handle.await.unwrap().unwrap();
    }
}

const ANTIGRAVITY: &str = "The Zero-Point Drive was invented by Dr. Sarah Connor.\n\
The project is headquartered in a submerged facility under the Atlantic Ocean.";

#[tokio::test]
async fn test_panel_against_running_server() {
    let server = TestServer::start().await;
    let mut panel = RagPanel::new(server.client());

    panel.mount().await;
    assert_eq!(panel.stats().unwrap().total_documents, 0);
    assert!(panel.render().contains("📚 0 Documents"));
    assert!(panel.render().contains("⚡ letter-frequency"));

    panel.set_query("left over");
    panel.drag_over();
    panel
        .drop_files(vec![UploadFile::new("antigravity.txt", ANTIGRAVITY)])
        .await;

    assert!(panel.error().is_none(), "{:?}", panel.error());
    assert!(!panel.is_dragging());
    assert_eq!(panel.query(), "");
    assert_eq!(panel.stats().unwrap().total_documents, 1);
    assert!(panel.render().contains("📚 1 Documents"));

    panel.set_query("Who invented the Zero-Point Drive?");
    panel.key_press(Key::Enter).await;

    assert!(panel.error().is_none(), "{:?}", panel.error());
    let response = panel.response().unwrap();
    assert_eq!(response.answer, "The Zero-Point Drive was invented by Dr. Sarah Connor. [Doc 1]");
    assert_eq!(response.optimized_query, None);
    assert_eq!(response.tokens_used, 33);
    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.sources[0].source, "antigravity.txt");
    assert!(response.sources[0].content.ends_with("..."));

    let view = panel.render();
    assert!(view.contains("Tokens: 33"));
    assert!(view.contains("antigravity.txt ("));

    server.stop().await;
}

#[tokio::test]
async fn test_server_errors_reach_the_panel() {
    let server = TestServer::start().await;
    let mut panel = RagPanel::new(server.client());

    panel
        .select_files(vec![UploadFile::new("notes.docx", "binary")])
        .await;
    assert_eq!(panel.error(), Some("Unsupported file type: notes.docx"));

    // Blank input never leaves the panel
    panel.set_query("   ");
    panel.submit_query().await;
    assert!(panel.response().is_none());

    // The client itself does not validate, so the server's rejection comes back verbatim
    let err = server.client().query(&QueryRequest::new("   ")).await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 400, .. }));
    assert_eq!(err.detail(), Some("Query cannot be empty"));

    server.stop().await;
}

#[tokio::test]
async fn test_query_on_empty_corpus() {
    let server = TestServer::start().await;

    let response = server
        .client()
        .query(&QueryRequest::new("anything at all"))
        .await
        .unwrap();

    assert!(response.sources.is_empty());
    assert_eq!(response.answer, "I don't have enough information to answer that.");

    server.stop().await;
}

#[tokio::test]
async fn test_system_evaluation_passes() {
    let server = TestServer::start().await;
    let client = server.client();
    let evaluator = RagEvaluator::new(Arc::new(GenerousJudge));

    let report = run_system_evaluation(&client, &evaluator, &EvaluationDataset::builtin())
        .await
        .unwrap();

    assert_eq!(report.upload.chunks_created, Some(1));
    assert_eq!(report.answers.len(), 3);
    assert!(report.answers.iter().all(|a| a.ends_with("[Doc 1]")));
    assert!(report.passed());

    let stats = client.stats().await.unwrap();
    assert_eq!(stats.total_documents, 1);
    assert_eq!(stats.llm_model.as_deref(), Some("extractive-model"));

    server.stop().await;
}
