//! Configuration for the evaluation harness.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values, and CLI
//! flags (applied by the binary) take precedence over both.

use crate::answer::NoContextPolicy;
use crate::corpus::DEFAULT_INDEX_NAME;
use crate::error::{EvalError, Result};
use crate::eval::FailurePolicy;
use crate::metrics::PrecisionMode;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// LLM configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API (e.g., a local Ollama server).
    pub api_base: String,

    /// API key for authentication (local servers usually need none).
    pub api_key: String,

    /// Model name (e.g., "llama3.2:latest").
    pub model: String,

    /// Cap on generated tokens; keeps answers short and comparable.
    pub max_tokens: u32,

    /// Sampling temperature. 0 for reproducible runs.
    pub temperature: f32,

    /// Sampling seed. Fixed for reproducible runs.
    pub seed: u64,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,

    /// Extra attempts after a failed generation call.
    pub max_retries: u32,

    /// Base delay between retries in milliseconds (multiplied by the attempt number).
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:11434".to_string(),
            api_key: String::new(),
            model: "llama3.2:latest".to_string(),
            max_tokens: 400,
            temperature: 0.0,
            seed: 42,
            timeout_secs: 120,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

/// Which embedding backend feeds the vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// OpenAI-compatible `/v1/embeddings` endpoint.
    Http,
    /// Offline deterministic feature hashing.
    Hash,
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    /// Vector width of the hash backend.
    pub dimension: usize,
    /// Texts per embedding request.
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Http,
            api_base: "http://localhost:11434".to_string(),
            api_key: String::new(),
            model: "nomic-embed-text".to_string(),
            dimension: 384,
            batch_size: 32,
        }
    }
}

/// Settings of a single evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Directory of reference documents.
    pub corpus_dir: PathBuf,
    /// JSON array of benchmark items.
    pub dataset_path: PathBuf,
    /// Row-level CSV report; the summary goes next to it with a `.json` extension.
    pub output_csv: PathBuf,
    /// Number of chunks retrieved per question.
    pub k: usize,
    /// Target chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    /// Name of the in-memory index.
    pub index_name: String,
    pub precision_mode: PrecisionMode,
    pub failure_policy: FailurePolicy,
    pub no_context_policy: NoContextPolicy,
    /// Questions processed concurrently. Output order never depends on it.
    pub concurrency: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("data/corpus_eval"),
            dataset_path: PathBuf::from("data/eval/evaluation_set.json"),
            output_csv: PathBuf::from("results/eval_run.csv"),
            k: 3,
            chunk_size: 700,
            chunk_overlap: 100,
            index_name: DEFAULT_INDEX_NAME.to_string(),
            precision_mode: PrecisionMode::Distinct,
            failure_policy: FailurePolicy::Abort,
            no_context_policy: NoContextPolicy::Sentinel,
            concurrency: 1,
        }
    }
}

impl EvalConfig {
    /// Path of the summary JSON written next to the CSV.
    pub fn summary_path(&self) -> PathBuf {
        self.output_csv.with_extension("json")
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// LLM settings
    pub llm: LlmConfig,
    /// Embedding settings
    pub embedding: EmbeddingConfig,
    /// Evaluation run settings
    pub eval: EvalConfig,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (LLM_API_BASE, LLM_MODEL, EMBEDDING_MODEL, ...)
    /// 2. Config file (~/.config/rag-eval/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => Self::load_from_file(&path)?,
            _ => Config::default(),
        };

        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
        Self::from_yaml_str(&content)
    }

    /// Parse a YAML document. Missing sections and fields keep their defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| EvalError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rag-eval")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Apply `KEY=value` overrides from `lookup` (the process environment in
    /// [`Config::load`]). Unparsable values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LLM_API_BASE") {
            self.llm.api_base = v;
        }
        if let Some(v) = lookup("LLM_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = lookup("LLM_MODEL") {
            self.llm.model = v;
        }
        // The evaluation-specific model name wins over the generic one.
        if let Some(v) = lookup("EVAL_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = parsed(&lookup, "LLM_MAX_TOKENS") {
            self.llm.max_tokens = v;
        }
        if let Some(v) = parsed(&lookup, "LLM_TEMPERATURE") {
            self.llm.temperature = v;
        }
        if let Some(v) = parsed(&lookup, "LLM_SEED") {
            self.llm.seed = v;
        }
        if let Some(v) = parsed(&lookup, "LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = v;
        }
        if let Some(v) = parsed(&lookup, "LLM_MAX_RETRIES") {
            self.llm.max_retries = v;
        }

        if let Some(v) = lookup("EMBEDDING_BACKEND") {
            match <EmbeddingBackend as ValueEnum>::from_str(&v, true) {
                Ok(backend) => self.embedding.backend = backend,
                Err(_) => warn!(value = %v, "ignoring unknown EMBEDDING_BACKEND"),
            }
        }
        if let Some(v) = lookup("EMBEDDING_API_BASE") {
            self.embedding.api_base = v;
        }
        if let Some(v) = lookup("EMBEDDING_API_KEY") {
            self.embedding.api_key = v;
        }
        if let Some(v) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
    }

    /// Validate that the configuration describes a runnable evaluation.
    pub fn validate(&self) -> Result<()> {
        if self.llm.model.is_empty() {
            return Err(EvalError::Config(
                "LLM model is required. Set LLM_MODEL environment variable or add to config file."
                    .to_string(),
            ));
        }
        if self.llm.api_base.is_empty() {
            return Err(EvalError::Config(
                "LLM API base URL is required. Set LLM_API_BASE environment variable or add to config file.".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(EvalError::Config(format!(
                "LLM temperature must be within [0, 2], got {}",
                self.llm.temperature
            )));
        }
        if self.llm.timeout_secs == 0 {
            return Err(EvalError::Config("LLM timeout must be positive".to_string()));
        }

        match self.embedding.backend {
            EmbeddingBackend::Http => {
                if self.embedding.api_base.is_empty() {
                    return Err(EvalError::Config(
                        "Embedding API base URL is required for the http backend.".to_string(),
                    ));
                }
                if self.embedding.model.is_empty() {
                    return Err(EvalError::Config(
                        "Embedding model is required for the http backend.".to_string(),
                    ));
                }
            }
            EmbeddingBackend::Hash => {
                if self.embedding.dimension == 0 {
                    return Err(EvalError::Config(
                        "Hash embedding dimension must be positive".to_string(),
                    ));
                }
            }
        }
        if self.embedding.batch_size == 0 {
            return Err(EvalError::Config("Embedding batch size must be positive".to_string()));
        }

        let eval = &self.eval;
        if eval.k == 0 {
            return Err(EvalError::Config("k must be a positive integer".to_string()));
        }
        if eval.chunk_size == 0 {
            return Err(EvalError::Config("chunk size must be positive".to_string()));
        }
        if eval.chunk_overlap >= eval.chunk_size {
            return Err(EvalError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                eval.chunk_overlap, eval.chunk_size
            )));
        }
        if eval.concurrency == 0 {
            return Err(EvalError::Config("concurrency must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Create a config from explicit values (useful for testing).
    pub fn with_llm(api_base: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            llm: LlmConfig {
                api_base: api_base.into(),
                model: model.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}
