//! Context-bound answer generation.
//!
//! The [`Answerer`] turns a question and its retrieved chunks into a short
//! answer. With no context it returns [`NOT_FOUND`] without calling the model
//! unless [`NoContextPolicy::General`] is configured.

use crate::config::Config;
use crate::error::{EvalError, Result};
use crate::llm::{PromptMode, TextGenerator};
use crate::retriever::RetrievedChunk;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Answer returned when no context was retrieved.
pub const NOT_FOUND: &str = "Information not found";

/// What to do when retrieval returns nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum NoContextPolicy {
    /// Reply with [`NOT_FOUND`] and skip the model.
    #[default]
    Sentinel,
    /// Ask the model with the open-domain prompt.
    General,
}

/// Call settings for the answerer.
#[derive(Debug, Clone)]
pub struct AnswerOptions {
    /// Upper bound on a single model call.
    pub timeout: Duration,
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// Delay before retry `n` is `n * retry_backoff`.
    pub retry_backoff: Duration,
    pub no_context_policy: NoContextPolicy,
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_retries: 0,
            retry_backoff: Duration::from_millis(500),
            no_context_policy: NoContextPolicy::Sentinel,
        }
    }
}

impl AnswerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: Duration::from_secs(config.llm.timeout_secs),
            max_retries: config.llm.max_retries,
            retry_backoff: Duration::from_millis(config.llm.retry_backoff_ms),
            no_context_policy: config.eval.no_context_policy,
        }
    }
}

/// Generates answers from retrieved context.
#[derive(Clone)]
pub struct Answerer {
    generator: Arc<dyn TextGenerator>,
    options: AnswerOptions,
}

impl Answerer {
    pub fn new(generator: Arc<dyn TextGenerator>, options: AnswerOptions) -> Self {
        Self { generator, options }
    }

    pub fn options(&self) -> &AnswerOptions {
        &self.options
    }

    /// Answer `question` from `chunks`. The result is trimmed.
    pub async fn answer(&self, question: &str, chunks: &[RetrievedChunk]) -> Result<String> {
        let prompt = if chunks.is_empty() {
            match self.options.no_context_policy {
                NoContextPolicy::Sentinel => return Ok(NOT_FOUND.to_string()),
                NoContextPolicy::General => PromptMode::General.render("", question),
            }
        } else {
            let context = chunks
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            PromptMode::Strict.render(&context, question)
        };

        let raw = self.complete_with_retry(&prompt).await?;
        Ok(raw.trim().to_string())
    }

    async fn complete_with_retry(&self, prompt: &str) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            match self.complete_once(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.options.max_retries => {
                    attempt += 1;
                    warn!(
                        model = self.generator.model(),
                        attempt,
                        error = %e,
                        "model call failed, retrying"
                    );
                    tokio::time::sleep(self.options.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn complete_once(&self, prompt: &str) -> Result<String> {
        debug!(model = self.generator.model(), prompt_chars = prompt.len(), "calling model");
        match tokio::time::timeout(self.options.timeout, self.generator.complete(prompt)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) if e.is_generation() => Err(e),
            Ok(Err(e)) => Err(EvalError::Generation(e.to_string())),
            Err(_) => Err(EvalError::GenerationTimeout(self.options.timeout)),
        }
    }
}
