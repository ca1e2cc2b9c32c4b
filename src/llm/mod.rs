//! Language model access.
//!
//! - [`TextGenerator`]: the capability the answerer depends on
//! - [`LlmClient`]: OpenAI-compatible chat completions implementing it
//! - [`PromptMode`]: the strict and general answer templates

mod client;
mod generator;
mod prompts;

pub use client::{Completion, LlmClient, parse_completion};
pub use generator::TextGenerator;
pub use prompts::{PromptMode, Prompts};
