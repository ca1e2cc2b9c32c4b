//! Text generation capability.

use crate::error::Result;
use async_trait::async_trait;

/// Generates text for a fully rendered prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model name for logs.
    fn model(&self) -> &str;

    /// Run one completion and return the raw response text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
