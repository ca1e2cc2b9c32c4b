//! Benchmark evaluation.
//!
//! This module provides:
//! - Benchmark dataset loading
//! - The evaluation driver that retrieves, answers and scores every question
//! - CSV and summary JSON reports

pub mod dataset;
pub mod report;
pub mod runner;

pub use dataset::{BenchmarkItem, load_dataset};
pub use report::{EvalRow, RunSummary, csv_header, write_csv, write_summary_json};
pub use runner::{EvalRunner, FailurePolicy};
