// ABOUTME: Backend implementations (Ollama chat, SD WebUI images, mock, disabled).
// ABOUTME: Each backend implements ChatBackend or ImageBackend.

pub mod mock;
pub mod ollama;
pub mod sdapi;

use crate::traits::ImageBackend;
use anyhow::Result;
use async_trait::async_trait;

/// Image backend used when image generation is switched off in config.
/// Every request fails, which the dispatch pipeline reports as an internal error.
pub struct DisabledImageBackend;

#[async_trait]
impl ImageBackend for DisabledImageBackend {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<Vec<u8>> {
        anyhow::bail!("Image generation is disabled in configuration")
    }
}
