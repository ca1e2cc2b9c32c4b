//! Benchmark dataset loading.
//!
//! Expected format, a JSON array of items:
//! ```json
//! [
//!   {
//!     "id": "q1",
//!     "question": "What is the capital of France?",
//!     "expected_answer": "Paris",
//!     "relevant_sources": ["france.txt"]
//!   }
//! ]
//! ```
//! `id` may also be a number. `relevant_sources` may be absent or `null`.

use crate::error::{EvalError, Result};
use crate::metrics::dedup_preserving_order;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;

/// A single question with its gold answer and gold sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkItem {
    /// Unique identifier for this item.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// The question to ask.
    pub question: String,
    /// Ground truth answer.
    pub expected_answer: String,
    /// Corpus file names that contain the answer.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub relevant_sources: Vec<String>,
}

impl BenchmarkItem {
    /// Gold sources with duplicates removed, first occurrence wins.
    pub fn unique_relevant_sources(&self) -> Vec<String> {
        dedup_preserving_order(&self.relevant_sources)
    }
}

/// Load the dataset at `path`, preserving item order.
///
/// Fails if the file is missing, is not a JSON array of items, or is empty.
pub fn load_dataset(path: &Path) -> Result<Vec<BenchmarkItem>> {
    if !path.is_file() {
        return Err(EvalError::DatasetNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
    let items: Vec<BenchmarkItem> =
        serde_json::from_str(&content).map_err(|e| EvalError::DatasetParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if items.is_empty() {
        return Err(EvalError::EmptyDataset(path.to_path_buf()));
    }
    Ok(items)
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Float(n) => n.to_string(),
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
