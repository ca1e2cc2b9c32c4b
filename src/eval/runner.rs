//! The evaluation driver.
//!
//! A run moves through `load-config → build-index → load-dataset →
//! (retrieve → generate → score)* → write-csv → write-summary` and never goes
//! back. Any failure before the per-question loop aborts the run without
//! writing output. Per-question failures follow the configured
//! [`FailurePolicy`].

use super::dataset::{BenchmarkItem, load_dataset};
use super::report::{EvalRow, RunSummary, write_csv, write_summary_json};
use crate::answer::{AnswerOptions, Answerer};
use crate::config::EvalConfig;
use crate::corpus::{CorpusStats, build_index};
use crate::error::{EvalError, Result, Stage};
use crate::index::{Embedder, SearchIndex, VectorIndex};
use crate::llm::TextGenerator;
use crate::metrics::ScoreCard;
use crate::retriever::{retrieve, sources};
use crate::splitter::ChunkConfig;
use clap::ValueEnum;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How a failed question affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The first failure aborts the run and nothing is written.
    #[default]
    Abort,
    /// A failed question becomes a row with an empty answer and an error
    /// message, and the run continues.
    BestEffort,
}

const DEFAULT_EMBED_BATCH: usize = 32;

/// Runs a full evaluation over a corpus and a benchmark dataset.
pub struct EvalRunner {
    config: EvalConfig,
    embedder: Arc<dyn Embedder>,
    answerer: Answerer,
    batch_size: usize,
}

impl EvalRunner {
    pub fn new(
        config: EvalConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn TextGenerator>,
        options: AnswerOptions,
    ) -> Self {
        Self {
            config,
            embedder,
            answerer: Answerer::new(generator, options),
            batch_size: DEFAULT_EMBED_BATCH,
        }
    }

    /// Number of chunks sent to the embedder per request.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Build a fresh index over the configured corpus.
    pub async fn build_index(&self) -> Result<(VectorIndex, CorpusStats)> {
        let chunk_config = ChunkConfig {
            chunk_size: self.config.chunk_size,
            chunk_overlap: self.config.chunk_overlap,
        };
        build_index(
            &self.config.corpus_dir,
            &chunk_config,
            self.embedder.clone(),
            &self.config.index_name,
            self.batch_size,
        )
        .await
        .map_err(|e| EvalError::aborted(Stage::BuildIndex, e))
    }

    /// Execute the whole run and write the CSV and summary JSON.
    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();

        info!(stage = %Stage::BuildIndex, corpus = %self.config.corpus_dir.display(), "starting");
        let (index, stats) = self.build_index().await?;
        info!(files = stats.files, chunks = stats.chunks, "index ready");

        info!(stage = %Stage::LoadDataset, dataset = %self.config.dataset_path.display(), "starting");
        let items = load_dataset(&self.config.dataset_path)
            .map_err(|e| EvalError::aborted(Stage::LoadDataset, e))?;
        info!(questions = items.len(), k = self.config.k, "dataset loaded");

        let rows = self.evaluate(&index, &items).await?;

        info!(stage = %Stage::WriteCsv, "starting");
        write_csv(&self.config.output_csv, self.config.k, &rows)
            .map_err(|e| EvalError::aborted(Stage::WriteCsv, e))?;

        info!(stage = %Stage::WriteSummary, "starting");
        let summary = RunSummary::from_rows(&rows, self.config.k, &self.config.output_csv);
        write_summary_json(&self.config.summary_path(), &summary)
            .map_err(|e| EvalError::aborted(Stage::WriteSummary, e))?;

        info!(
            questions = summary.n_questions,
            failed = summary.n_failed,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "evaluation finished"
        );
        Ok(summary)
    }

    /// Score every item against `index`. Rows come back in dataset order
    /// whatever the configured concurrency.
    pub async fn evaluate(&self, index: &dyn SearchIndex, items: &[BenchmarkItem]) -> Result<Vec<EvalRow>> {
        let total = items.len();
        stream::iter(items.iter().enumerate())
            .map(|(position, item)| self.evaluate_item(index, item, position + 1, total))
            .buffered(self.config.concurrency.max(1))
            .try_collect()
            .await
    }

    async fn evaluate_item(
        &self,
        index: &dyn SearchIndex,
        item: &BenchmarkItem,
        position: usize,
        total: usize,
    ) -> Result<EvalRow> {
        debug!(id = %item.id, position, total, "evaluating question");
        let relevant = item.unique_relevant_sources();

        let retrieved = match retrieve(index, &item.question, self.config.k).await {
            Ok(chunks) => chunks,
            Err(e) => return self.failed_row(item, relevant, Vec::new(), Stage::Retrieve, e),
        };
        let retrieved_sources = sources(&retrieved);

        let generated = match self.answerer.answer(&item.question, &retrieved).await {
            Ok(answer) => answer,
            Err(e) => return self.failed_row(item, relevant, retrieved_sources, Stage::Generate, e),
        };

        let scores = ScoreCard::compute(
            self.config.precision_mode,
            &retrieved_sources,
            &relevant,
            self.config.k,
            &generated,
            &item.expected_answer,
        );
        scores
            .validate()
            .map_err(|e| EvalError::aborted(Stage::Score, e))?;

        debug!(id = %item.id, f1 = scores.f1, em = scores.exact_match, "scored question");
        Ok(EvalRow {
            id: item.id.clone(),
            question: item.question.clone(),
            gold_answer: item.expected_answer.clone(),
            generated_answer: generated,
            relevant_sources: relevant,
            retrieved_sources,
            scores,
            error: None,
        })
    }

    fn failed_row(
        &self,
        item: &BenchmarkItem,
        relevant: Vec<String>,
        retrieved_sources: Vec<String>,
        stage: Stage,
        error: EvalError,
    ) -> Result<EvalRow> {
        if self.config.failure_policy == FailurePolicy::Abort {
            return Err(EvalError::aborted(stage, error));
        }

        warn!(id = %item.id, stage = %stage, error = %error, "question failed, continuing");
        let scores = ScoreCard::retrieval_only(
            self.config.precision_mode,
            &retrieved_sources,
            &relevant,
            self.config.k,
        );
        Ok(EvalRow {
            id: item.id.clone(),
            question: item.question.clone(),
            gold_answer: item.expected_answer.clone(),
            generated_answer: String::new(),
            relevant_sources: relevant,
            retrieved_sources,
            scores,
            error: Some(error.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::NOT_FOUND;
    use crate::index::HashEmbedder;
    use crate::metrics::PrecisionMode;
    use crate::testing::{FailingIndex, FlakyGenerator, ScriptedGenerator, StaticIndex};
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn item(id: &str, question: &str, answer: &str, relevant: &[&str]) -> BenchmarkItem {
        BenchmarkItem {
            id: id.to_string(),
            question: question.to_string(),
            expected_answer: answer.to_string(),
            relevant_sources: relevant.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn options() -> AnswerOptions {
        AnswerOptions {
            timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn eval_config(root: &Path) -> EvalConfig {
        EvalConfig {
            corpus_dir: root.join("corpus"),
            dataset_path: root.join("evaluation_set.json"),
            output_csv: root.join("results").join("eval_run.csv"),
            k: 3,
            ..Default::default()
        }
    }

    fn runner(config: EvalConfig, generator: Arc<dyn TextGenerator>) -> EvalRunner {
        EvalRunner::new(config, Arc::new(HashEmbedder::new(256)), generator, options())
    }

    fn write_corpus(root: &Path, files: &[(&str, &str)]) {
        let corpus = root.join("corpus");
        fs::create_dir_all(&corpus).unwrap();
        for (name, text) in files {
            fs::write(corpus.join(name), text).unwrap();
        }
    }

    fn write_dataset(root: &Path, json: &str) {
        fs::write(root.join("evaluation_set.json"), json).unwrap();
    }

    #[tokio::test]
    async fn test_relevant_file_ranks_first() {
        let dir = TempDir::new().unwrap();
        write_corpus(
            dir.path(),
            &[
                ("a.txt", "The Eiffel Tower is located in Paris."),
                ("b.txt", "Bananas grow in tropical climates."),
            ],
        );
        write_dataset(
            dir.path(),
            r#"[{"id": "q1", "question": "Where is the Eiffel Tower located?",
                 "expected_answer": "Paris", "relevant_sources": ["a.txt"]}]"#,
        );
        let config = eval_config(dir.path());
        let csv_path = config.output_csv.clone();

        let summary = runner(config, Arc::new(ScriptedGenerator::new("Paris")))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.n_questions, 1);
        assert_eq!(summary.mean_recall, 1.0);
        assert_eq!(summary.mean_mrr, 1.0);
        assert_eq!(summary.mean_em, 1.0);

        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        let record = reader.records().next().unwrap().unwrap();
        let retrieved: Vec<&str> = record[5].split('|').collect();
        assert_eq!(retrieved[0], "a.txt");
        assert_eq!(&record[7], "1.0");
        assert!(csv_path.with_extension("json").exists());
    }

    #[tokio::test]
    async fn test_no_gold_sources_scores_zero() {
        let index = StaticIndex::new(&[("a.txt", "Paris is in France."), ("b.txt", "Madrid")]);
        let dir = TempDir::new().unwrap();
        let runner = runner(eval_config(dir.path()), Arc::new(ScriptedGenerator::new("Paris")));

        let rows = runner
            .evaluate(&index, &[item("q1", "Where is Paris?", "France", &[])])
            .await
            .unwrap();

        assert_eq!(rows[0].scores.recall, 0.0);
        assert_eq!(rows[0].scores.precision, 0.0);
        assert_eq!(rows[0].scores.mrr, 0.0);
        assert_eq!(rows[0].retrieved_sources, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_empty_corpus_aborts_without_output() {
        let dir = TempDir::new().unwrap();
        write_corpus(dir.path(), &[]);
        write_dataset(
            dir.path(),
            r#"[{"id": "q1", "question": "Q?", "expected_answer": "A", "relevant_sources": []}]"#,
        );
        let config = eval_config(dir.path());
        let csv_path = config.output_csv.clone();

        let err = runner(config, Arc::new(ScriptedGenerator::new("A")))
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::BuildIndex));
        assert!(!csv_path.exists());
        assert!(!csv_path.with_extension("json").exists());
    }

    #[tokio::test]
    async fn test_missing_dataset_aborts_at_load() {
        let dir = TempDir::new().unwrap();
        write_corpus(dir.path(), &[("a.txt", "Some text.")]);
        let config = eval_config(dir.path());
        let csv_path = config.output_csv.clone();

        let err = runner(config, Arc::new(ScriptedGenerator::new("A")))
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::LoadDataset));
        assert!(!csv_path.exists());
    }

    #[tokio::test]
    async fn test_no_retrieved_chunks_uses_sentinel() {
        let dir = TempDir::new().unwrap();
        let generator = Arc::new(ScriptedGenerator::new("should not be called"));
        let runner = runner(eval_config(dir.path()), generator.clone());

        let rows = runner
            .evaluate(
                &StaticIndex::empty(),
                &[
                    item("q1", "Where is Paris?", "France", &["a.txt"]),
                    item("q2", "Anything?", "Information not found", &["a.txt"]),
                ],
            )
            .await
            .unwrap();

        assert_eq!(rows[0].generated_answer, NOT_FOUND);
        assert_eq!(rows[0].scores.f1, 0.0);
        assert_eq!(rows[1].scores.f1, 1.0);
        assert_eq!(rows[1].scores.exact_match, 1);
        assert!(rows[0].retrieved_sources.is_empty());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_rows_are_scored_independently() {
        let dir = TempDir::new().unwrap();
        let generator = ScriptedGenerator::new("unknown")
            .with_answer("capital of France", "Paris")
            .with_answer("capital of Spain", "Madrid");
        let runner = runner(eval_config(dir.path()), Arc::new(generator));
        let index = StaticIndex::new(&[("capitals.txt", "Paris and Madrid are capitals.")]);

        let rows = runner
            .evaluate(
                &index,
                &[
                    item("q1", "What is the capital of France?", "Paris", &["capitals.txt"]),
                    item("q2", "What is the capital of Spain?", "Madrid", &["capitals.txt"]),
                ],
            )
            .await
            .unwrap();

        assert_eq!(rows[0].generated_answer, "Paris");
        assert_eq!(rows[1].generated_answer, "Madrid");
        assert_eq!(rows[0].scores.exact_match, 1);
        assert_eq!(rows[1].scores.exact_match, 1);
        assert_eq!(rows[0].relevant_sources, rows[1].relevant_sources);
    }

    #[tokio::test]
    async fn test_generation_failure_aborts_run() {
        let dir = TempDir::new().unwrap();
        write_corpus(dir.path(), &[("a.txt", "Paris is in France.")]);
        write_dataset(
            dir.path(),
            r#"[{"id": "q1", "question": "Where is Paris?", "expected_answer": "France", "relevant_sources": ["a.txt"]}]"#,
        );
        let config = eval_config(dir.path());
        let csv_path = config.output_csv.clone();

        let err = runner(config, Arc::new(FlakyGenerator::always_failing()))
            .run()
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Generate));
        assert!(err.is_generation());
        assert!(!csv_path.exists());
    }

    #[tokio::test]
    async fn test_best_effort_keeps_failed_rows() {
        let dir = TempDir::new().unwrap();
        write_corpus(dir.path(), &[("a.txt", "Paris is in France.")]);
        write_dataset(
            dir.path(),
            r#"[
                {"id": "q1", "question": "Where is Paris?", "expected_answer": "France", "relevant_sources": ["a.txt"]},
                {"id": "q2", "question": "Where is Rome?", "expected_answer": "Italy", "relevant_sources": ["b.txt"]}
            ]"#,
        );
        let config = EvalConfig {
            failure_policy: FailurePolicy::BestEffort,
            ..eval_config(dir.path())
        };
        let csv_path = config.output_csv.clone();

        let summary = runner(config, Arc::new(FlakyGenerator::always_failing()))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.n_questions, 2);
        assert_eq!(summary.n_failed, 2);
        assert_eq!(summary.mean_f1, 0.0);
        assert_eq!(summary.mean_recall, 0.5);

        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][3], "");
        assert!(records[0][11].contains("model backend unavailable"));
    }

    #[tokio::test]
    async fn test_best_effort_retrieval_failure() {
        let dir = TempDir::new().unwrap();
        let config = EvalConfig {
            failure_policy: FailurePolicy::BestEffort,
            ..eval_config(dir.path())
        };
        let generator = Arc::new(ScriptedGenerator::new("Paris"));
        let runner = runner(config, generator.clone());

        let rows = runner
            .evaluate(&FailingIndex, &[item("q1", "Where?", "Paris", &["a.txt"])])
            .await
            .unwrap();

        assert!(rows[0].is_failed());
        assert!(rows[0].retrieved_sources.is_empty());
        assert_eq!(rows[0].scores, ScoreCard::default());
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_retrieval_failure_aborts_by_default() {
        let dir = TempDir::new().unwrap();
        let runner = runner(eval_config(dir.path()), Arc::new(ScriptedGenerator::new("Paris")));

        let err = runner
            .evaluate(&FailingIndex, &[item("q1", "Where?", "Paris", &["a.txt"])])
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Retrieve));
    }

    #[tokio::test]
    async fn test_concurrency_preserves_dataset_order() {
        let dir = TempDir::new().unwrap();
        let config = EvalConfig {
            concurrency: 4,
            ..eval_config(dir.path())
        };
        let runner = runner(config, Arc::new(ScriptedGenerator::new("answer")));
        let index = StaticIndex::new(&[("a.txt", "text")]);
        let items: Vec<BenchmarkItem> = (0..10)
            .map(|i| item(&format!("q{}", i), &format!("Question {}?", i), "answer", &["a.txt"]))
            .collect();

        let rows = runner.evaluate(&index, &items).await.unwrap();

        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let expected: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_precision_mode_is_applied() {
        let dir = TempDir::new().unwrap();
        let index = StaticIndex::new(&[("a.txt", "one"), ("a.txt", "two"), ("a.txt", "three")]);
        let items = [item("q1", "Q?", "A", &["a.txt"])];

        let distinct = runner(eval_config(dir.path()), Arc::new(ScriptedGenerator::new("A")));
        let rows = distinct.evaluate(&index, &items).await.unwrap();
        assert_eq!(rows[0].scores.precision, 1.0);

        let config = EvalConfig {
            precision_mode: PrecisionMode::Nominal,
            ..eval_config(dir.path())
        };
        let nominal = runner(config, Arc::new(ScriptedGenerator::new("A")));
        let rows = nominal.evaluate(&index, &items).await.unwrap();
        assert!((rows[0].scores.precision - 1.0 / 3.0).abs() < 1e-12);
    }
}
