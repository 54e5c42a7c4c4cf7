//! Accuracy evaluation
//!
//! Retrieval metrics over id sets, LLM-as-judge scoring of generated answers,
//! and an end-to-end run that uploads a known document through a [`RagApi`],
//! asks questions about it, and judges the answers.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::client::{RagApi, UploadFile};
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::providers::{ChatMessage, ChatRequest, LlmProvider};
use crate::types::{QueryRequest, UploadResponse};

/// Mean score at or above which a run passes
pub const PASS_THRESHOLD: f64 = 4.0;

/// Answer recorded when a query fails during a run
pub const FAILED_ANSWER: &str = "Error";

/// Mean retrieval metrics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    pub mean_precision: f64,
    pub mean_recall: f64,
    /// Harmonic mean of the two means
    pub mean_f1: f64,
}

/// Judge scores, one per answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationScores {
    /// 1..=5, or 0 when the judge failed
    pub scores: Vec<u8>,
    pub mean_score: f64,
}

/// LLM-as-judge evaluator
pub struct RagEvaluator {
    judge: Arc<dyn LlmProvider>,
}

impl RagEvaluator {
    pub fn new(judge: Arc<dyn LlmProvider>) -> Self {
        Self { judge }
    }

    /// Precision and recall per query over id sets, averaged
    pub fn evaluate_retrieval(retrieved: &[Vec<String>], relevant: &[Vec<String>]) -> RetrievalMetrics {
        let mut precisions = Vec::new();
        let mut recalls = Vec::new();

        for (retrieved, relevant) in retrieved.iter().zip(relevant) {
            let retrieved: HashSet<&str> = retrieved.iter().map(String::as_str).collect();
            let relevant: HashSet<&str> = relevant.iter().map(String::as_str).collect();
            let hits = retrieved.intersection(&relevant).count() as f64;

            precisions.push(if retrieved.is_empty() { 0.0 } else { hits / retrieved.len() as f64 });
            recalls.push(if relevant.is_empty() { 0.0 } else { hits / relevant.len() as f64 });
        }

        let mean_precision = mean(&precisions);
        let mean_recall = mean(&recalls);
        let mean_f1 = if mean_precision + mean_recall > 0.0 {
            2.0 * mean_precision * mean_recall / (mean_precision + mean_recall)
        } else {
            0.0
        };

        RetrievalMetrics {
            mean_precision,
            mean_recall,
            mean_f1,
        }
    }

    /// Ask the judge to rate each generated answer against its reference
    pub async fn evaluate_generation(
        &self,
        generated: &[String],
        reference: &[String],
        queries: &[String],
    ) -> GenerationScores {
        let mut scores = Vec::with_capacity(generated.len());

        for ((generated, reference), query) in generated.iter().zip(reference).zip(queries) {
            let score = match self.judge_one(query, reference, generated).await {
                Ok(score) => score,
                Err(e) => {
                    tracing::warn!(error = %e, query = %query, "Error evaluating answer");
                    0
                }
            };
            scores.push(score);
        }

        let mean_score = mean(&scores.iter().map(|&s| f64::from(s)).collect::<Vec<_>>());
        GenerationScores { scores, mean_score }
    }

    async fn judge_one(&self, query: &str, reference: &str, generated: &str) -> Result<u8> {
        let prompt = PromptBuilder::build_judge_prompt(query, reference, generated);
        let completion = self
            .judge
            .chat(ChatRequest {
                messages: vec![ChatMessage::user(prompt)],
                temperature: 0.0,
                max_tokens: 5,
            })
            .await?;

        parse_score(&completion.content)
            .ok_or_else(|| Error::llm(format!("Judge returned no score: {:?}", completion.content)))
    }
}

/// Concatenate every digit in the reply and clamp to 1..=5
fn parse_score(reply: &str) -> Option<u8> {
    let digits: String = reply.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    // Overlong digit runs are still "more than 5"
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    Some(value.clamp(1, 5) as u8)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Question with its reference answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    pub query: String,
    pub expected: String,
}

/// A document plus questions answerable from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDataset {
    #[serde(default = "default_filename")]
    pub filename: String,
    pub content: String,
    pub questions: Vec<QaPair>,
}

fn default_filename() -> String {
    "evaluation_dataset.txt".to_string()
}

impl EvaluationDataset {
    /// Built-in fictional document the models cannot know in advance
    pub fn builtin() -> Self {
        let pair = |query: &str, expected: &str| QaPair {
            query: query.to_string(),
            expected: expected.to_string(),
        };

        Self {
            filename: "antigravity_test.txt".to_string(),
            content: "\nThe \"Project Antigravity\" is a secret initiative started in 2024 to develop \
anti-gravity propulsion using quantum field manipulation.\n\
The core component is the \"Zero-Point Drive\", which was invented by Dr. Sarah Connor.\n\
The project is headquartered in a submerged facility under the Atlantic Ocean.\n"
                .to_string(),
            questions: vec![
                pair(
                    "Who invented the Zero-Point Drive?",
                    "Dr. Sarah Connor invented the Zero-Point Drive.",
                ),
                pair(
                    "Where is Project Antigravity headquartered?",
                    "It is headquartered in a submerged facility under the Atlantic Ocean.",
                ),
                pair("When did the project start?", "The project started in 2024."),
            ],
        }
    }

    /// Load a dataset from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let dataset: Self = serde_json::from_str(&raw)?;
        if dataset.questions.is_empty() {
            return Err(Error::Validation(format!("{} has no questions", path.display())));
        }
        Ok(dataset)
    }
}

/// Outcome of an end-to-end run
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub upload: UploadResponse,
    pub queries: Vec<String>,
    pub expected: Vec<String>,
    pub answers: Vec<String>,
    pub generation: GenerationScores,
}

impl EvaluationReport {
    pub fn passed(&self) -> bool {
        self.generation.mean_score >= PASS_THRESHOLD
    }
}

/// Upload the dataset, ask every question, and judge the answers.
///
/// A failed upload aborts the run. A failed query records [`FAILED_ANSWER`]
/// and the run continues.
pub async fn run_system_evaluation<A: RagApi + ?Sized>(
    api: &A,
    evaluator: &RagEvaluator,
    dataset: &EvaluationDataset,
) -> Result<EvaluationReport> {
    let file = UploadFile::new(dataset.filename.clone(), dataset.content.clone());
    let upload = api.upload(std::slice::from_ref(&file)).await?;
    tracing::info!(?upload, "Evaluation content uploaded");

    let mut queries = Vec::with_capacity(dataset.questions.len());
    let mut expected = Vec::with_capacity(dataset.questions.len());
    let mut answers = Vec::with_capacity(dataset.questions.len());

    for pair in &dataset.questions {
        let answer = match api.query(&QueryRequest::new(pair.query.clone())).await {
            Ok(response) => response.answer,
            Err(e) => {
                tracing::warn!(error = %e, query = %pair.query, "Evaluation query failed");
                FAILED_ANSWER.to_string()
            }
        };
        queries.push(pair.query.clone());
        expected.push(pair.expected.clone());
        answers.push(answer);
    }

    let generation = evaluator.evaluate_generation(&answers, &expected, &queries).await;

    Ok(EvaluationReport {
        upload,
        queries,
        expected,
        answers,
        generation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::testing::ScriptedLlm;
    use crate::types::{QueryResponse, StatsResponse};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        ids(values)
    }

    #[test]
    fn test_retrieval_metrics() {
        let metrics = RagEvaluator::evaluate_retrieval(
            &[ids(&["101"]), ids(&["205"])],
            &[ids(&["101"]), ids(&["300"])],
        );

        assert!((metrics.mean_precision - 0.5).abs() < 1e-9);
        assert!((metrics.mean_recall - 0.5).abs() < 1e-9);
        assert!((metrics.mean_f1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_retrieval_metrics_partial() {
        let metrics = RagEvaluator::evaluate_retrieval(&[ids(&["1", "2", "3", "4"])], &[ids(&["1", "2"])]);

        assert!((metrics.mean_precision - 0.5).abs() < 1e-9);
        assert!((metrics.mean_recall - 1.0).abs() < 1e-9);
        assert!((metrics.mean_f1 - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_retrieval_metrics_empty() {
        let metrics = RagEvaluator::evaluate_retrieval(&[], &[]);
        assert_eq!(metrics.mean_f1, 0.0);

        let metrics = RagEvaluator::evaluate_retrieval(&[Vec::new()], &[Vec::new()]);
        assert_eq!(metrics.mean_precision, 0.0);
        assert_eq!(metrics.mean_recall, 0.0);
        assert_eq!(metrics.mean_f1, 0.0);
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("5"), Some(5));
        assert_eq!(parse_score(" Score: 4\n"), Some(4));
        assert_eq!(parse_score("0"), Some(1));
        assert_eq!(parse_score("4/5"), Some(5));
        assert_eq!(parse_score("99999999999999999999999"), Some(5));
        assert_eq!(parse_score("excellent"), None);
    }

    #[tokio::test]
    async fn test_generation_scores() {
        let judge = Arc::new(ScriptedLlm::replying(vec![
            ScriptedLlm::text("5", 3),
            ScriptedLlm::text("no idea", 3),
            Err(Error::llm("rate limited")),
            ScriptedLlm::text("3", 3),
        ]));
        let evaluator = RagEvaluator::new(judge.clone());

        let result = evaluator
            .evaluate_generation(
                &strings(&["a", "b", "c", "d"]),
                &strings(&["ra", "rb", "rc", "rd"]),
                &strings(&["qa", "qb", "qc", "qd"]),
            )
            .await;

        assert_eq!(result.scores, vec![5, 0, 0, 3]);
        assert!((result.mean_score - 2.0).abs() < 1e-9);

        let requests = judge.requests.lock();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0].temperature, 0.0);
        assert_eq!(requests[0].max_tokens, 5);
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[0].messages[0].role, "user");
        assert!(requests[0].messages[0].content.contains("Query: qa"));
        assert!(requests[0].messages[0].content.contains("Generated Answer:\na"));
    }

    #[tokio::test]
    async fn test_generation_empty() {
        let evaluator = RagEvaluator::new(Arc::new(ScriptedLlm::default()));
        let result = evaluator.evaluate_generation(&[], &[], &[]).await;
        assert!(result.scores.is_empty());
        assert_eq!(result.mean_score, 0.0);
    }

    struct FakeApi {
        uploads: Mutex<Vec<Vec<UploadFile>>>,
        fail_upload: bool,
    }

    #[async_trait]
    impl RagApi for FakeApi {
        async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
            if request.query.starts_with("When") {
                return Err(Error::Api {
                    status: 500,
                    detail: None,
                });
            }
            Ok(QueryResponse {
                query: request.query.clone(),
                optimized_query: None,
                answer: format!("answer to {}", request.query),
                sources: Vec::new(),
                tokens_used: 10,
            })
        }

        async fn upload(&self, files: &[UploadFile]) -> Result<UploadResponse> {
            if self.fail_upload {
                return Err(Error::Api {
                    status: 400,
                    detail: Some("Unsupported file type: .txt".into()),
                });
            }
            self.uploads.lock().push(files.to_vec());
            Ok(UploadResponse::processed(1, 1, vec![files[0].filename.clone()]))
        }

        async fn stats(&self) -> Result<StatsResponse> {
            Err(Error::internal("unused"))
        }
    }

    #[tokio::test]
    async fn test_system_evaluation_run() {
        let api = FakeApi {
            uploads: Mutex::new(Vec::new()),
            fail_upload: false,
        };
        let judge = Arc::new(ScriptedLlm::replying(vec![
            ScriptedLlm::text("5", 1),
            ScriptedLlm::text("4", 1),
            ScriptedLlm::text("1", 1),
        ]));
        let evaluator = RagEvaluator::new(judge.clone());
        let dataset = EvaluationDataset::builtin();

        let report = run_system_evaluation(&api, &evaluator, &dataset).await.unwrap();

        let uploads = api.uploads.lock();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0][0].filename, "antigravity_test.txt");
        assert!(String::from_utf8_lossy(&uploads[0][0].bytes).contains("Zero-Point Drive"));

        assert_eq!(report.answers[0], "answer to Who invented the Zero-Point Drive?");
        assert_eq!(report.answers[2], FAILED_ANSWER);
        assert_eq!(report.generation.scores, vec![5, 4, 1]);
        assert!((report.generation.mean_score - 10.0 / 3.0).abs() < 1e-9);
        assert!(!report.passed());
        assert!(judge.requests.lock()[2].messages[0].content.contains("Generated Answer:\nError"));
    }

    #[tokio::test]
    async fn test_system_evaluation_upload_failure() {
        let api = FakeApi {
            uploads: Mutex::new(Vec::new()),
            fail_upload: true,
        };
        let judge = Arc::new(ScriptedLlm::default());
        let evaluator = RagEvaluator::new(judge.clone());

        let err = run_system_evaluation(&api, &evaluator, &EvaluationDataset::builtin())
            .await
            .unwrap_err();

        assert_eq!(err.detail(), Some("Unsupported file type: .txt"));
        assert!(judge.requests.lock().is_empty());
    }

    #[test]
    fn test_dataset_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("set.json");
        std::fs::write(
            &path,
            r#"{"content": "Paris is the capital of France.", "questions": [{"query": "Capital?", "expected": "Paris"}]}"#,
        )
        .unwrap();

        let dataset = EvaluationDataset::from_file(&path).unwrap();
        assert_eq!(dataset.filename, "evaluation_dataset.txt");
        assert_eq!(dataset.questions[0].expected, "Paris");

        std::fs::write(&path, r#"{"content": "x", "questions": []}"#).unwrap();
        assert!(matches!(EvaluationDataset::from_file(&path), Err(Error::Validation(_))));
    }

    #[test]
    fn test_report_pass_threshold() {
        let report = EvaluationReport {
            upload: UploadResponse::default(),
            queries: Vec::new(),
            expected: Vec::new(),
            answers: Vec::new(),
            generation: GenerationScores {
                scores: vec![4, 4],
                mean_score: 4.0,
            },
        };
        assert!(report.passed());
    }
}
