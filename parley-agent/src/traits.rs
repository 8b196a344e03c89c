// ABOUTME: Core backend traits that every language-model and image backend implements.
// ABOUTME: Calls are single request/response exchanges; retries live in the retry module.

use crate::ChatMessage;
use anyhow::Result;
use async_trait::async_trait;

/// A language-model backend that answers a list of chat messages with one reply.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Backend name for logging and metrics
    fn name(&self) -> &'static str;

    /// Send the conversation and return the assistant's reply text
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Convenience for the common single-system-prompt query
    async fn ask(&self, prompt: &str) -> Result<String> {
        self.chat(&[ChatMessage::system(prompt)]).await
    }
}

/// A text-to-image backend.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Backend name for logging and metrics
    fn name(&self) -> &'static str;

    /// Render the prompt and return encoded PNG bytes
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>>;
}
