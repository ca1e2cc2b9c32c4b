//! Semantic index over corpus chunks.
//!
//! This module provides:
//! - The `Embedder` and `SearchIndex` capability traits
//! - An OpenAI-compatible HTTP embedder and an offline hashing embedder
//! - An exact cosine-similarity vector index

mod embedder;
mod traits;
mod vector;

pub use embedder::{HashEmbedder, HttpEmbedder, cosine_similarity, embedder_from_config};
pub use traits::{Embedder, ScoredChunk, SearchIndex};
pub use vector::{IndexEntry, VectorIndex};
