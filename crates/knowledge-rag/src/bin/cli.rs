//! Knowledge base command line client
//!
//! Talks to a running `knowledge-rag-server` over HTTP. `chat` renders the
//! query/upload panel in the terminal; the other commands are one-shot.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use knowledge_rag::client::DEFAULT_BASE_URL;
use knowledge_rag::evaluation::{run_system_evaluation, EvaluationDataset, RagEvaluator, PASS_THRESHOLD};
use knowledge_rag::logging::init_cli_tracing;
use knowledge_rag::providers::{LlmProvider, OpenRouterClient};
use knowledge_rag::storage::DocumentDb;
use knowledge_rag::{QueryRequest, QueryResponse, RagApi, RagClient, RagConfig, RagPanel, UploadFile};

#[derive(Parser)]
#[command(name = "knowledge-rag")]
#[command(version, about = "Query and feed a knowledge-rag server", long_about = None)]
struct Cli {
    /// Server base URL
    #[arg(short, long, global = true, env = "RAG_SERVER_URL", default_value = DEFAULT_BASE_URL)]
    server: String,

    /// Show debug logs on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question
    Query {
        /// Question text
        query: String,

        /// Passages to retrieve
        #[arg(short = 'k', long, default_value_t = 5)]
        top_k: usize,

        /// Skip LLM query rewriting
        #[arg(long)]
        no_optimize: bool,
    },

    /// Upload PDF or text files
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show corpus statistics
    Stats,

    /// Interactive panel
    Chat,

    /// Upload a known document, ask questions about it, and grade the answers
    Evaluate {
        /// JSON dataset: {"content", "questions": [{"query", "expected"}]}
        #[arg(short, long, value_name = "FILE")]
        dataset: Option<PathBuf>,

        /// Config file for the judge model
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Delete every stored chunk in the local database
    ResetDb {
        /// Config file naming the database
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.verbose);

    let client = RagClient::new(&cli.server);

    match cli.command {
        Commands::Query {
            query,
            top_k,
            no_optimize,
        } => {
            let request = QueryRequest::new(query)
                .with_top_k(top_k)
                .with_optimize_query(!no_optimize);
            let spinner = spinner("Thinking...")?;
            let result = client.query(&request).await;
            spinner.finish_and_clear();
            print_response(&result.context("Query failed")?);
        }
        Commands::Upload { files } => {
            let files = read_files(&files)?;
            let spinner = spinner(&format!("Uploading {} file(s)...", files.len()))?;
            let result = client.upload(&files).await;
            spinner.finish_and_clear();
            let summary = result.context("Upload failed")?;

            println!("{} Upload complete", style("✓").green().bold());
            if let Some(chunks) = summary.chunks_created {
                println!("  Chunks created: {}", chunks);
            }
            if let Some(message) = summary.message {
                println!("  {}", message);
            }
        }
        Commands::Stats => {
            let stats = client.stats().await.context("Failed to fetch stats")?;
            println!("{}", style("Corpus").bold());
            println!("  Documents: {}", stats.total_documents);
            println!("  Embedding model: {}", stats.embedding_model);
            if let Some(llm) = stats.llm_model {
                println!("  LLM model: {}", llm);
            }
        }
        Commands::Chat => chat(client).await?,
        Commands::Evaluate { dataset, config } => {
            evaluate(&client, dataset.as_deref(), config.as_deref()).await?;
        }
        Commands::ResetDb { config, yes } => {
            let config = RagConfig::load(config.as_deref())?;
            if !yes {
                bail!(
                    "refusing to reset {} without --yes",
                    config.database.path.display()
                );
            }
            let db = DocumentDb::open(&config.database.path)?;
            db.reset()?;
            println!(
                "{} Database reset: {}",
                style("✓").green().bold(),
                config.database.path.display()
            );
        }
    }

    Ok(())
}

fn spinner(message: &str) -> anyhow::Result<ProgressBar> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    Ok(bar)
}

fn read_files(paths: &[PathBuf]) -> anyhow::Result<Vec<UploadFile>> {
    paths
        .iter()
        .map(|path| {
            UploadFile::from_path(path).with_context(|| format!("Failed to read {}", path.display()))
        })
        .collect()
}

fn print_response(response: &QueryResponse) {
    if let Some(optimized) = &response.optimized_query {
        println!("{} {}", style("Searched for:").dim(), optimized);
    }
    println!("{}", style("AI Answer").bold().cyan());
    println!("{}", response.answer);
    println!("{}", style(format!("Tokens: {}", response.tokens_used)).dim());

    if !response.sources.is_empty() {
        println!("\n{}", style("Sources").bold().cyan());
        for source in &response.sources {
            println!(
                "  {} {}",
                style(&source.source).bold(),
                style(format!("{}% Match", source.match_percent())).green()
            );
            println!("    {}", source.content);
        }
    }
}

const CHAT_HELP: &str = "Type a question and press Enter. Commands: :upload <files>, :drop <files>, :stats, :quit";

async fn chat(client: RagClient) -> anyhow::Result<()> {
    let mut panel = RagPanel::new(client);
    panel.mount().await;

    println!("{}", panel.render());
    println!("{}", style(CHAT_HELP).dim());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();

        match words.next() {
            Some(":quit") | Some(":q") => break,
            Some(":stats") => panel.refresh_stats().await,
            Some(":upload" | ":drop") => {
                let paths: Vec<PathBuf> = words.map(PathBuf::from).collect();
                let files = match read_files(&paths) {
                    Ok(files) => files,
                    Err(e) => {
                        eprintln!("{} {:#}", style("!").red().bold(), e);
                        continue;
                    }
                };

                let Some(files) = panel.begin_upload(files) else {
                    continue;
                };
                println!("{}", panel.render());

                let spinner = spinner("Uploading...")?;
                let result = panel.api().upload(&files).await;
                spinner.finish_and_clear();
                panel.finish_upload(result).await;
            }
            Some(word) if word.starts_with(':') => {
                println!("{}", style(CHAT_HELP).dim());
                continue;
            }
            _ => {
                panel.set_query(line.as_str());
                let Some(request) = panel.begin_query() else {
                    continue;
                };

                let spinner = spinner("Thinking...")?;
                let result = panel.api().query(&request).await;
                spinner.finish_and_clear();
                panel.finish_query(result);
            }
        }

        println!("{}", panel.render());
    }

    Ok(())
}

async fn evaluate(client: &RagClient, dataset: Option<&Path>, config: Option<&Path>) -> anyhow::Result<()> {
    let dataset = match dataset {
        Some(path) => EvaluationDataset::from_file(path)?,
        None => EvaluationDataset::builtin(),
    };

    let mut config = RagConfig::load(config)?;
    config.llm.title = "RAG Evaluator".to_string();
    let judge: Arc<dyn LlmProvider> = Arc::new(OpenRouterClient::new(&config.llm)?);
    let evaluator = RagEvaluator::new(judge);

    println!("{}", style("=== Starting Full System Evaluation ===").bold());
    println!("Server: {}", client.base_url());
    println!("Questions: {}", dataset.questions.len());

    let spinner = spinner("Uploading content, querying and judging...")?;
    let result = run_system_evaluation(client, &evaluator, &dataset).await;
    spinner.finish_and_clear();
    let report = result.context("Evaluation aborted")?;

    let rule = "=".repeat(40);
    println!("\n{}", rule);
    println!("       📊 SYSTEM ACCURACY REPORT       ");
    println!("{}", rule);
    println!("Mean Accuracy Score: {:.2} / 5.0", report.generation.mean_score);
    println!("{}", "-".repeat(40));
    for (i, score) in report.generation.scores.iter().enumerate() {
        println!("Q: {}", report.queries[i]);
        println!("Expected: {}", report.expected[i]);
        println!("Actual:   {}", report.answers[i]);
        println!("Score:    {}/5", score);
        println!("{}", "-".repeat(40));
    }

    if report.passed() {
        println!("\n{} SYSTEM RESULT: PASS", style("✓").green().bold());
    } else {
        println!(
            "\n{} SYSTEM RESULT: NEEDS IMPROVEMENT (below {:.1})",
            style("!").yellow().bold(),
            PASS_THRESHOLD
        );
    }

    Ok(())
}
