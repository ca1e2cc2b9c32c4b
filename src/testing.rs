//! Deterministic in-process fakes for the capability traits.

use crate::document::Chunk;
use crate::error::{EvalError, Result};
use crate::index::{ScoredChunk, SearchIndex};
use crate::llm::TextGenerator;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Index that returns its chunks in insertion order, ignoring the query.
pub struct StaticIndex {
    chunks: Vec<Chunk>,
}

impl StaticIndex {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        let chunks = entries
            .iter()
            .enumerate()
            .map(|(i, (source, text))| Chunk {
                text: text.to_string(),
                source: source.to_string(),
                index: i,
            })
            .collect();
        Self { chunks }
    }

    pub fn empty() -> Self {
        Self { chunks: Vec::new() }
    }
}

#[async_trait]
impl SearchIndex for StaticIndex {
    fn name(&self) -> &str {
        "static"
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }

    async fn search(&self, _query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        Ok(self
            .chunks
            .iter()
            .take(k)
            .enumerate()
            .map(|(i, chunk)| ScoredChunk {
                chunk: chunk.clone(),
                score: 1.0 / (i as f32 + 1.0),
            })
            .collect())
    }
}

/// Index whose searches always fail.
pub struct FailingIndex;

#[async_trait]
impl SearchIndex for FailingIndex {
    fn name(&self) -> &str {
        "failing"
    }

    fn len(&self) -> usize {
        0
    }

    async fn search(&self, _query: &str, _k: usize) -> Result<Vec<ScoredChunk>> {
        Err(EvalError::Embedding("embedding service unavailable".to_string()))
    }
}

/// Generator that answers from a script and records every prompt it sees.
///
/// The answer is taken from the first `(needle, answer)` pair whose needle
/// occurs in the prompt, falling back to the default answer.
pub struct ScriptedGenerator {
    default_answer: String,
    script: Vec<(String, String)>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(default_answer: &str) -> Self {
        Self {
            default_answer: default_answer.to_string(),
            script: Vec::new(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_answer(mut self, needle: &str, answer: &str) -> Self {
        self.script.push((needle.to_string(), answer.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let answer = self
            .script
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, answer)| answer.clone())
            .unwrap_or_else(|| self.default_answer.clone());
        Ok(answer)
    }
}

/// Generator that fails a fixed number of times before answering.
pub struct FlakyGenerator {
    failures_left: AtomicUsize,
    calls: AtomicUsize,
    answer: String,
}

impl FlakyGenerator {
    pub fn new(failures: usize, answer: &str) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
            answer: answer.to_string(),
        }
    }

    /// Generator that never answers.
    pub fn always_failing() -> Self {
        Self::new(usize::MAX, "")
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FlakyGenerator {
    fn model(&self) -> &str {
        "flaky"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            if left != usize::MAX {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
            }
            return Err(EvalError::LlmApi("model backend unavailable".to_string()));
        }
        Ok(self.answer.clone())
    }
}

/// Generator that sleeps before answering.
pub struct SlowGenerator {
    delay: Duration,
    answer: String,
}

impl SlowGenerator {
    pub fn new(delay: Duration, answer: &str) -> Self {
        Self {
            delay,
            answer: answer.to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for SlowGenerator {
    fn model(&self) -> &str {
        "slow"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok(self.answer.clone())
    }
}
