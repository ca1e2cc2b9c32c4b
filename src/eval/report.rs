//! Row-level CSV report and the aggregate summary JSON.

use crate::error::{EvalError, Result};
use crate::metrics::ScoreCard;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Separator for multi-value CSV fields.
const LIST_SEPARATOR: &str = "|";

/// One scored benchmark question.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalRow {
    pub id: String,
    pub question: String,
    pub gold_answer: String,
    pub generated_answer: String,
    /// Deduplicated gold sources.
    pub relevant_sources: Vec<String>,
    /// One entry per retrieved chunk, duplicates included.
    pub retrieved_sources: Vec<String>,
    pub scores: ScoreCard,
    /// Failure message for rows that could not be completed.
    pub error: Option<String>,
}

impl EvalRow {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate scores over a run. Means are rounded to 4 decimal places.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub k: usize,
    pub n_questions: usize,
    pub mean_precision: f64,
    pub mean_recall: f64,
    pub mean_mrr: f64,
    pub mean_f1: f64,
    pub mean_em: f64,
    pub n_failed: usize,
    pub out_csv: PathBuf,
}

impl RunSummary {
    pub fn from_rows(rows: &[EvalRow], k: usize, out_csv: &Path) -> Self {
        let mean = |f: fn(&ScoreCard) -> f64| {
            if rows.is_empty() {
                0.0
            } else {
                round4(rows.iter().map(|r| f(&r.scores)).sum::<f64>() / rows.len() as f64)
            }
        };

        Self {
            k,
            n_questions: rows.len(),
            mean_precision: mean(|s| s.precision),
            mean_recall: mean(|s| s.recall),
            mean_mrr: mean(|s| s.mrr),
            mean_f1: mean(|s| s.f1),
            mean_em: mean(|s| f64::from(s.exact_match)),
            n_failed: rows.iter().filter(|r| r.is_failed()).count(),
            out_csv: out_csv.to_path_buf(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Serialize for RunSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(9))?;
        map.serialize_entry("k", &self.k)?;
        map.serialize_entry("n_questions", &self.n_questions)?;
        map.serialize_entry(&format!("mean_precision@{}", self.k), &self.mean_precision)?;
        map.serialize_entry(&format!("mean_recall@{}", self.k), &self.mean_recall)?;
        map.serialize_entry("mean_mrr", &self.mean_mrr)?;
        map.serialize_entry("mean_f1", &self.mean_f1)?;
        map.serialize_entry("mean_em", &self.mean_em)?;
        map.serialize_entry("n_failed", &self.n_failed)?;
        map.serialize_entry("out_csv", &self.out_csv.display().to_string())?;
        map.end()
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// CSV header for a run at `k`.
pub fn csv_header(k: usize) -> Vec<String> {
    vec![
        "id".to_string(),
        "question".to_string(),
        "gold_answer".to_string(),
        "generated_answer".to_string(),
        "relevant_sources".to_string(),
        "retrieved_sources".to_string(),
        format!("precision@{}", k),
        format!("recall@{}", k),
        "mrr".to_string(),
        "f1".to_string(),
        "exact_match".to_string(),
        "error".to_string(),
    ]
}

fn csv_record(row: &EvalRow) -> Vec<String> {
    vec![
        row.id.clone(),
        row.question.clone(),
        row.gold_answer.clone(),
        row.generated_answer.clone(),
        row.relevant_sources.join(LIST_SEPARATOR),
        row.retrieved_sources.join(LIST_SEPARATOR),
        format!("{:?}", row.scores.precision),
        format!("{:?}", row.scores.recall),
        format!("{:?}", row.scores.mrr),
        format!("{:?}", row.scores.f1),
        row.scores.exact_match.to_string(),
        row.error.clone().unwrap_or_default(),
    ]
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| EvalError::io(parent, e))
        }
        _ => Ok(()),
    }
}

/// Write all rows to `path` in the given order, header first.
pub fn write_csv(path: &Path, k: usize, rows: &[EvalRow]) -> Result<()> {
    ensure_parent(path)?;
    let csv_error = |e: csv::Error| EvalError::Csv {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    writer.write_record(csv_header(k)).map_err(csv_error)?;
    for row in rows {
        writer.write_record(csv_record(row)).map_err(csv_error)?;
    }
    writer.flush().map_err(|e| EvalError::io(path, e))?;

    info!(path = %path.display(), rows = rows.len(), "wrote results CSV");
    Ok(())
}

/// Write the pretty-printed summary JSON to `path`.
pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<()> {
    ensure_parent(path)?;
    let content = summary.to_json_pretty()?;
    fs::write(path, content).map_err(|e| EvalError::io(path, e))?;

    info!(path = %path.display(), "wrote summary JSON");
    Ok(())
}
