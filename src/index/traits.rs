//! Capability interfaces for the embedding and similarity-search backends.
//!
//! The evaluation core only talks to these traits, so the whole harness runs
//! against deterministic in-process implementations in tests.

use crate::document::Chunk;
use crate::error::{EvalError, Result};
use async_trait::async_trait;

/// Turns text into dense vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EvalError::Embedding(format!("{} returned no vector", self.name())))
    }
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Similarity score (higher is more similar).
    pub score: f32,
}

/// A read-only semantic index over corpus chunks.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Index name.
    fn name(&self) -> &str;

    /// Number of indexed chunks.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `k` chunks most similar to `query`, most similar first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>>;
}
