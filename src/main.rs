//! RAG Eval CLI
//!
//! Runs the retrieval-augmented-generation evaluation over a corpus and a
//! benchmark dataset, printing the summary JSON to stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rag_eval::{
    answer::AnswerOptions,
    config::{Config, EmbeddingBackend},
    error::{EvalError, Stage},
    eval::{EvalRunner, FailurePolicy},
    index::embedder_from_config,
    llm::LlmClient,
    metrics::PrecisionMode,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// RAG Eval - retrieval and answer quality metrics for a RAG pipeline
#[derive(Parser)]
#[command(name = "rag-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Corpus directory (one document per file)
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,

    /// Benchmark dataset (JSON array)
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Output CSV path; the summary is written next to it as .json
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Number of chunks to retrieve per question
    #[arg(short = 'k', long = "k", global = true)]
    k: Option<usize>,

    /// Chunk size in characters
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Chunk overlap in characters
    #[arg(long, global = true)]
    chunk_overlap: Option<usize>,

    /// Precision@k divisor
    #[arg(long, global = true, value_enum)]
    precision_mode: Option<PrecisionMode>,

    /// Keep going when a question fails and record the error in its row
    #[arg(long, global = true)]
    best_effort: bool,

    /// Questions evaluated in parallel
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Embedding backend
    #[arg(long, global = true, value_enum)]
    embedding_backend: Option<EmbeddingBackend>,

    /// Language model name
    #[arg(long, global = true)]
    model: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the evaluation (default)
    Run,

    /// Check configuration and backend connectivity
    Check,

    /// Build the index only and print corpus statistics
    Index,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "rag_eval=debug" } else { "rag_eval=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        None | Some(Commands::Run) => cmd_run(config).await,
        Some(Commands::Check) => cmd_check(config).await,
        Some(Commands::Index) => cmd_index(config).await,
    }
}

/// Environment and config file first, then command-line flags.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load().map_err(|e| EvalError::aborted(Stage::LoadConfig, e))?;

    if let Some(path) = &cli.corpus {
        config.eval.corpus_dir = path.clone();
    }
    if let Some(path) = &cli.dataset {
        config.eval.dataset_path = path.clone();
    }
    if let Some(path) = &cli.out {
        config.eval.output_csv = path.clone();
    }
    if let Some(k) = cli.k {
        config.eval.k = k;
    }
    if let Some(size) = cli.chunk_size {
        config.eval.chunk_size = size;
    }
    if let Some(overlap) = cli.chunk_overlap {
        config.eval.chunk_overlap = overlap;
    }
    if let Some(mode) = cli.precision_mode {
        config.eval.precision_mode = mode;
    }
    if cli.best_effort {
        config.eval.failure_policy = FailurePolicy::BestEffort;
    }
    if let Some(n) = cli.concurrency {
        config.eval.concurrency = n;
    }
    if let Some(backend) = cli.embedding_backend {
        config.embedding.backend = backend;
    }
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }

    config
        .validate()
        .map_err(|e| EvalError::aborted(Stage::LoadConfig, e))?;
    Ok(config)
}

fn runner(config: &Config) -> EvalRunner {
    EvalRunner::new(
        config.eval.clone(),
        embedder_from_config(&config.embedding),
        Arc::new(LlmClient::new(config.llm.clone())),
        AnswerOptions::from_config(config),
    )
    .with_batch_size(config.embedding.batch_size)
}

async fn cmd_run(config: Config) -> Result<()> {
    let summary = runner(&config).run().await?;
    println!("{}", summary.to_json_pretty()?);
    Ok(())
}

async fn cmd_index(config: Config) -> Result<()> {
    let start = Instant::now();
    let (index, stats) = runner(&config).build_index().await?;

    println!("Index Built: {}", config.eval.index_name);
    println!("{}", "─".repeat(40));
    println!("  Corpus:      {}", config.eval.corpus_dir.display());
    println!("  Files:       {}", stats.files);
    println!("  Skipped:     {}", stats.skipped);
    println!("  Chunks:      {}", stats.chunks);
    println!("  Embeddings:  {}", index.entries().len());
    println!("  Build time:  {:.2?}", start.elapsed());
    println!();
    for (source, chunks) in &stats.per_source {
        println!("  {:>5}  {}", chunks, source);
    }

    Ok(())
}

async fn cmd_check(config: Config) -> Result<()> {
    println!("Configuration:");
    println!("  LLM API Base:        {}", config.llm.api_base);
    println!("  LLM Model:           {}", config.llm.model);
    println!(
        "  LLM API Key:         {}",
        if config.llm.api_key.is_empty() { "(none)" } else { "(set)" }
    );
    println!("  Embedding Backend:   {:?}", config.embedding.backend);
    println!("  Embedding Model:     {}", config.embedding.model);
    println!("  Corpus:              {}", config.eval.corpus_dir.display());
    println!("  Dataset:             {}", config.eval.dataset_path.display());
    println!();

    println!("Sending test request to LLM...");
    LlmClient::new(config.llm.clone())
        .test_connection()
        .await
        .context("LLM connection failed")?;
    println!("LLM connection successful!");

    println!("Embedding a test sentence...");
    let embedder = embedder_from_config(&config.embedding);
    let vector = embedder
        .embed("hello")
        .await
        .context("Embedding backend failed")?;
    println!("Embedding backend '{}' returned {} dimensions.", embedder.name(), vector.len());

    Ok(())
}
