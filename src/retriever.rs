//! Top-k retrieval of source-tagged chunks.

use crate::error::Result;
use crate::index::SearchIndex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A retrieved chunk with its position in the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Chunk text content.
    pub text: String,
    /// File name of the document the chunk came from.
    pub source: String,
    /// Similarity score reported by the index.
    pub score: f32,
    /// 1-based rank.
    pub rank: usize,
}

/// Fetch exactly `k` raw chunks (not `k` distinct sources) for `question`,
/// in the order the index ranks them.
pub async fn retrieve(index: &dyn SearchIndex, question: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
    let results = index.search(question, k).await?;
    debug!(index = index.name(), k, hits = results.len(), "retrieved chunks");

    Ok(results
        .into_iter()
        .enumerate()
        .map(|(i, r)| RetrievedChunk {
            text: r.chunk.text,
            source: r.chunk.source,
            score: r.score,
            rank: i + 1,
        })
        .collect())
}

/// Source tags in retrieval order, duplicates included.
pub fn sources(chunks: &[RetrievedChunk]) -> Vec<String> {
    chunks.iter().map(|c| c.source.clone()).collect()
}
