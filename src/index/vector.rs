//! In-memory vector index with exact cosine search.

use super::embedder::cosine_similarity;
use super::traits::{Embedder, ScoredChunk, SearchIndex};
use crate::document::Chunk;
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// A vector index entry.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Vector search index. Immutable once built.
pub struct VectorIndex {
    name: String,
    entries: Vec<IndexEntry>,
    embedder: Arc<dyn Embedder>,
}

impl VectorIndex {
    /// Embed `chunks` in batches of `batch_size` and index them under `name`.
    pub async fn build(
        name: impl Into<String>,
        chunks: Vec<Chunk>,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
    ) -> Result<Self> {
        let name = name.into();
        let mut entries = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size.max(1)) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = embedder.embed_batch(&texts).await?;

            if embeddings.len() != batch.len() {
                return Err(EvalError::IndexBuild(format!(
                    "{} returned {} vectors for {} chunks",
                    embedder.name(),
                    embeddings.len(),
                    batch.len()
                )));
            }

            for (chunk, embedding) in batch.iter().zip(embeddings) {
                entries.push(IndexEntry {
                    chunk: chunk.clone(),
                    embedding,
                });
            }
            debug!(index = %name, embedded = entries.len(), total = chunks.len(), "embedded batch");
        }

        Ok(Self {
            name,
            entries,
            embedder,
        })
    }

    /// Get all entries.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Chunk count per source, ordered by source name.
    pub fn chunks_per_source(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.chunk.source.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

#[async_trait]
impl SearchIndex for VectorIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;

        let mut results: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(&query_embedding, &entry.embedding),
            })
            .collect();

        // Stable sort: equal scores keep index insertion order.
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);

        Ok(results)
    }
}
