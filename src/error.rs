//! Error types for the evaluation harness.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Stages of an evaluation run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadConfig,
    BuildIndex,
    LoadDataset,
    Retrieve,
    Generate,
    Score,
    WriteCsv,
    WriteSummary,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LoadConfig => "load-config",
            Stage::BuildIndex => "build-index",
            Stage::LoadDataset => "load-dataset",
            Stage::Retrieve => "retrieve",
            Stage::Generate => "generate",
            Stage::Score => "score",
            Stage::WriteCsv => "write-csv",
            Stage::WriteSummary => "write-summary",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while building an index or running an evaluation.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing the row-level CSV report.
    #[error("CSV error for path '{path}': {reason}")]
    Csv { path: PathBuf, reason: String },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The corpus directory does not exist or is not a directory.
    #[error("Corpus path '{0}' does not exist or is not a directory")]
    InvalidCorpusPath(PathBuf),

    /// No usable documents found in the corpus.
    #[error("No usable documents found in corpus at '{0}'")]
    EmptyCorpus(PathBuf),

    /// The index could not be built from the corpus chunks.
    #[error("Index build failed: {0}")]
    IndexBuild(String),

    /// The dataset file does not exist.
    #[error("Dataset not found at '{0}'")]
    DatasetNotFound(PathBuf),

    /// The dataset file is not a valid JSON array of benchmark items.
    #[error("Malformed dataset '{path}': {reason}")]
    DatasetParse { path: PathBuf, reason: String },

    /// The dataset contains no items.
    #[error("Dataset at '{0}' is empty")]
    EmptyDataset(PathBuf),

    /// Embedding backend error.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The language model returned an unusable response.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// The language model did not answer within the configured timeout.
    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    /// LLM API error.
    #[error("LLM API error: {0}")]
    LlmApi(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// A metric came out non-finite or outside its domain.
    #[error("Metric computation error: {0}")]
    Metric(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A fatal failure that terminated the evaluation run.
    #[error("Evaluation aborted at stage {stage}")]
    Aborted {
        stage: Stage,
        #[source]
        source: Box<EvalError>,
    },
}

impl EvalError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap an error as the cause of an aborted run. Already-aborted errors keep
    /// their original stage.
    pub fn aborted(stage: Stage, source: EvalError) -> Self {
        match source {
            aborted @ EvalError::Aborted { .. } => aborted,
            other => Self::Aborted {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage at which the run aborted, if this is an aborted-run error.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EvalError::Aborted { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether this error belongs to the generation family (model call failed,
    /// timed out, or answered with something unusable).
    pub fn is_generation(&self) -> bool {
        match self {
            EvalError::Generation(_)
            | EvalError::GenerationTimeout(_)
            | EvalError::LlmApi(_)
            | EvalError::Http(_) => true,
            EvalError::Aborted { source, .. } => source.is_generation(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for EvalError {
    fn from(err: reqwest::Error) -> Self {
        EvalError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::Serialization(err.to_string())
    }
}
