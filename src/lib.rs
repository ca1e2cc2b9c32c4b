//! RAG Eval - An offline evaluation harness for retrieval-augmented generation.
//!
//! Given a corpus directory and a benchmark of questions with gold answers and
//! gold source files, the harness builds a fresh semantic index, retrieves
//! the top-k chunks for every question, asks a language model to answer from
//! that context only, and scores each answer.
//!
//! # Overview
//!
//! Every question is scored on two axes:
//! 1. Retrieval quality at the document level: Precision@k, Recall@k and MRR
//!    over the source file names of the retrieved chunks
//! 2. Answer quality: Exact Match and token-set F1 against the gold answer
//!
//! Results are written as a row-level CSV plus an aggregate summary JSON.
//!
//! # Quick Start
//!
//! ```no_run
//! use rag_eval::{
//!     answer::AnswerOptions,
//!     config::Config,
//!     eval::EvalRunner,
//!     index::embedder_from_config,
//!     llm::LlmClient,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration
//!     let config = Config::load()?;
//!     config.validate()?;
//!
//!     // Wire up the embedding and generation backends
//!     let embedder = embedder_from_config(&config.embedding);
//!     let generator = Arc::new(LlmClient::new(config.llm.clone()));
//!
//!     // Run the evaluation
//!     let runner = EvalRunner::new(
//!         config.eval.clone(),
//!         embedder,
//!         generator,
//!         AnswerOptions::from_config(&config),
//!     );
//!     let summary = runner.run().await?;
//!
//!     println!("{}", summary.to_json_pretty()?);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **corpus**: Loads corpus files and builds the index
//! - **splitter**: Recursive character splitter with overlap
//! - **index**: Embedder and search-index traits with a cosine vector index
//! - **retriever**: Top-k chunk retrieval
//! - **answer**: Context-bound answer generation
//! - **metrics**: Retrieval and answer metrics
//! - **eval**: Dataset loading, the evaluation driver and reports

pub mod answer;
pub mod config;
pub mod corpus;
pub mod document;
pub mod error;
pub mod eval;
pub mod index;
pub mod llm;
pub mod metrics;
pub mod retriever;
pub mod splitter;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use answer::{AnswerOptions, Answerer, NOT_FOUND, NoContextPolicy};
pub use config::Config;
pub use document::{Chunk, Document};
pub use error::{EvalError, Result, Stage};
pub use eval::{BenchmarkItem, EvalRow, EvalRunner, FailurePolicy, RunSummary};
pub use index::{Embedder, SearchIndex, VectorIndex};
pub use llm::{LlmClient, TextGenerator};
pub use metrics::{PrecisionMode, ScoreCard};
pub use retriever::{RetrievedChunk, retrieve};
