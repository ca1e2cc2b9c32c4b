//! Retrieval and answer-quality metrics.
//!
//! Retrieval metrics work at document level: the unit of relevance is the
//! source file a chunk came from, not the chunk itself.
//! - Precision@K: share of the distinct top-K sources that are relevant
//! - Recall@K: share of the relevant sources found in the distinct top-K
//! - Reciprocal rank: 1/rank of the first relevant chunk in raw retrieval order
//!
//! Answer metrics compare normalized token forms:
//! - Exact Match: identical token sequences
//! - F1: harmonic mean of token-set precision and recall
//!
//! All functions are pure and total.

use crate::error::{EvalError, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

/// Accented Latin letters kept by [`normalize`] besides `a-z` and `0-9`.
const ACCENTED_LETTERS: &str = "àâçéèêëîïôûùüÿñæœ";

/// Denominator used by precision@k.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PrecisionMode {
    /// Divide by the number of distinct sources actually considered (at most k).
    #[default]
    Distinct,
    /// Divide by k regardless of how many distinct sources were retrieved.
    Nominal,
}

/// Remove duplicates, keeping the first occurrence of each item in place.
pub fn dedup_preserving_order<T>(items: &[T]) -> Vec<T>
where
    T: Eq + Hash + Clone,
{
    let mut seen = HashSet::with_capacity(items.len());
    items
        .iter()
        .filter(|item| seen.insert(*item))
        .cloned()
        .collect()
}

/// Up to `k` distinct sources in first-seen order.
pub fn unique_top_k<S: AsRef<str>>(sources: &[S], k: usize) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(k.min(sources.len()));
    for source in sources {
        if unique.len() == k {
            break;
        }
        let source = source.as_ref();
        if seen.insert(source) {
            unique.push(source);
        }
    }
    unique
}

fn relevant_set<S: AsRef<str>>(relevant: &[S]) -> HashSet<&str> {
    relevant.iter().map(|s| s.as_ref()).collect()
}

/// Precision@k over distinct sources (see [`PrecisionMode::Distinct`]).
pub fn precision_at_k<S, T>(retrieved: &[S], relevant: &[T], k: usize) -> f64
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    precision_at_k_with(PrecisionMode::Distinct, retrieved, relevant, k)
}

/// Precision@k with an explicit denominator policy.
pub fn precision_at_k_with<S, T>(
    mode: PrecisionMode,
    retrieved: &[S],
    relevant: &[T],
    k: usize,
) -> f64
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    if k == 0 {
        return 0.0;
    }
    let top_k = unique_top_k(retrieved, k);
    if top_k.is_empty() {
        return 0.0;
    }

    let relevant = relevant_set(relevant);
    let hits = top_k.iter().filter(|s| relevant.contains(*s)).count();

    let denominator = match mode {
        PrecisionMode::Distinct => top_k.len(),
        PrecisionMode::Nominal => k,
    };
    hits as f64 / denominator as f64
}

/// Recall@k over distinct sources. No relevant sources means 0.0.
pub fn recall_at_k<S, T>(retrieved: &[S], relevant: &[T], k: usize) -> f64
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    let relevant = relevant_set(relevant);
    if relevant.is_empty() {
        return 0.0;
    }

    let hits = unique_top_k(retrieved, k)
        .iter()
        .filter(|s| relevant.contains(*s))
        .count();
    hits as f64 / relevant.len() as f64
}

/// Reciprocal rank of the first relevant entry in raw retrieval order.
pub fn mrr<S, T>(retrieved: &[S], relevant: &[T]) -> f64
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    let relevant = relevant_set(relevant);
    retrieved
        .iter()
        .position(|s| relevant.contains(s.as_ref()))
        .map(|i| 1.0 / (i + 1) as f64)
        .unwrap_or(0.0)
}

fn is_kept(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || ACCENTED_LETTERS.contains(c)
}

/// Lowercase, blank out everything but `[a-z0-9]` and accented Latin letters,
/// and split into whitespace-separated tokens.
pub fn normalize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if is_kept(c) || c.is_whitespace() { c } else { ' ' })
        .collect();

    cleaned.split_whitespace().map(str::to_string).collect()
}

/// 1 if both texts normalize to the same token sequence, else 0.
pub fn exact_match(pred: &str, gold: &str) -> u8 {
    u8::from(normalize(pred) == normalize(gold))
}

/// Token-set F1 between normalized prediction and gold answer.
pub fn f1_score(pred: &str, gold: &str) -> f64 {
    let pred_tokens = normalize(pred);
    let gold_tokens = normalize(gold);

    if pred_tokens.is_empty() && gold_tokens.is_empty() {
        return 1.0;
    }
    if pred_tokens.is_empty() || gold_tokens.is_empty() {
        return 0.0;
    }

    let pred_set: HashSet<&str> = pred_tokens.iter().map(String::as_str).collect();
    let gold_set: HashSet<&str> = gold_tokens.iter().map(String::as_str).collect();

    let common = pred_set.intersection(&gold_set).count();
    if common == 0 {
        return 0.0;
    }

    let precision = common as f64 / pred_set.len() as f64;
    let recall = common as f64 / gold_set.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

/// The five per-question scores.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreCard {
    pub precision: f64,
    pub recall: f64,
    pub mrr: f64,
    pub f1: f64,
    pub exact_match: u8,
}

impl ScoreCard {
    /// Score one question. `relevant` must already be deduplicated.
    pub fn compute<S, T>(
        mode: PrecisionMode,
        retrieved: &[S],
        relevant: &[T],
        k: usize,
        generated: &str,
        gold: &str,
    ) -> Self
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            precision: precision_at_k_with(mode, retrieved, relevant, k),
            recall: recall_at_k(retrieved, relevant, k),
            mrr: mrr(retrieved, relevant),
            f1: f1_score(generated, gold),
            exact_match: exact_match(generated, gold),
        }
    }

    /// Scores with the answer metrics forced to zero, for rows whose answer
    /// could not be generated.
    pub fn retrieval_only<S, T>(mode: PrecisionMode, retrieved: &[S], relevant: &[T], k: usize) -> Self
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            precision: precision_at_k_with(mode, retrieved, relevant, k),
            recall: recall_at_k(retrieved, relevant, k),
            mrr: mrr(retrieved, relevant),
            f1: 0.0,
            exact_match: 0,
        }
    }

    /// Reject non-finite or out-of-range values.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("precision", self.precision),
            ("recall", self.recall),
            ("mrr", self.mrr),
            ("f1", self.f1),
        ];
        for (name, value) in checks {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(EvalError::Metric(format!(
                    "{} = {} is outside [0, 1]",
                    name, value
                )));
            }
        }
        if self.exact_match > 1 {
            return Err(EvalError::Metric(format!(
                "exact_match = {} is not 0 or 1",
                self.exact_match
            )));
        }
        Ok(())
    }
}
