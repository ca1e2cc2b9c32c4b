//! Embedding backends.

use super::traits::Embedder;
use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::{EvalError, Result};
use crate::metrics::normalize;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Build the embedder selected by the configuration.
pub fn embedder_from_config(config: &EmbeddingConfig) -> Arc<dyn Embedder> {
    match config.backend {
        EmbeddingBackend::Http => Arc::new(HttpEmbedder::new(config.clone())),
        EmbeddingBackend::Hash => Arc::new(HashEmbedder::new(config.dimension)),
    }
}

/// Request body for an embeddings call.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

/// Response from an embeddings call.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Client for an OpenAI-compatible `/v1/embeddings` endpoint (Ollama, vLLM,
/// llama.cpp server, ...).
#[derive(Clone)]
pub struct HttpEmbedder {
    client: Client,
    config: EmbeddingConfig,
}

impl HttpEmbedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Get the API endpoint URL.
    fn endpoint(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{}/v1/embeddings", base)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if !self.config.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(EvalError::Embedding(format!(
                "Request failed ({}): {}",
                status, body
            )));
        }

        let mut parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| EvalError::Embedding(format!("Unreadable embeddings response: {}", e)))?;

        if parsed.data.len() != texts.len() {
            return Err(EvalError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Deterministic bag-of-words embedder using feature hashing.
///
/// Each normalized token increments one of `dimension` buckets chosen by its
/// FNV-1a hash, and the vector is L2-normalized. Texts sharing vocabulary get
/// high cosine similarity. Needs no model server, so evaluation runs with it
/// are reproducible byte for byte.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in normalize(text) {
            let bucket = (fnv1a(token.as_bytes()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 1e-6);

        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_fnv1a_known_values() {
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[tokio::test]
    async fn test_hash_embedder_is_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(64);
        let first = embedder.embed("The capital of France is Paris").await.unwrap();
        let second = embedder.embed("the capital of france is paris!").await.unwrap();

        assert_eq!(first.len(), 64);
        assert_eq!(first, second);
        let norm: f32 = first.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hash_embedder_prefers_shared_vocabulary() {
        let embedder = HashEmbedder::new(256);
        let vectors = embedder
            .embed_batch(&[
                "capital of france",
                "paris is the capital of france",
                "rust ownership and borrowing",
            ])
            .await
            .unwrap();

        let related = cosine_similarity(&vectors[0], &vectors[1]);
        let unrelated = cosine_similarity(&vectors[0], &vectors[2]);
        assert!(related > unrelated);
    }

    #[tokio::test]
    async fn test_hash_embedder_blank_text_is_zero_vector() {
        let embedder = HashEmbedder::new(8);
        let v = embedder.embed("...").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_http_endpoint_construction() {
        let config = EmbeddingConfig {
            api_base: "http://localhost:11434/".to_string(),
            ..Default::default()
        };
        let embedder = HttpEmbedder::new(config);
        assert_eq!(embedder.endpoint(), "http://localhost:11434/v1/embeddings");
        assert_eq!(embedder.name(), "nomic-embed-text");
    }

    #[test]
    fn test_embedder_from_config() {
        let config = EmbeddingConfig {
            backend: EmbeddingBackend::Hash,
            dimension: 32,
            ..Default::default()
        };
        assert_eq!(embedder_from_config(&config).name(), "hash");
    }
}
