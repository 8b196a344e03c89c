// ABOUTME: Writes generated documents and images into a chat's file area.
// ABOUTME: Names are timestamped with a random suffix so concurrent requests never collide.

use crate::classifier::FileFormat;
use crate::documents;
use crate::files::FileStore;
use crate::metrics;
use anyhow::{Context, Result};
use parley_agent::ImageBackend;
use std::sync::Arc;

/// `<prefix>_<YYYYmmdd_HHMMSS>_<8 hex>.<ext>`
pub fn generated_name(prefix: &str, extension: &str) -> String {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}.{}", prefix, stamp, &suffix[..8], extension)
}

pub struct Generators {
    files: FileStore,
    image: Arc<dyn ImageBackend>,
}

impl Generators {
    pub fn new(files: FileStore, image: Arc<dyn ImageBackend>) -> Self {
        Self { files, image }
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    /// Render and store a document. Returns the file name.
    pub fn write_document(&self, chat_id: &str, format: FileFormat, content: &str) -> Result<String> {
        let bytes = documents::render(format, content)
            .with_context(|| format!("Failed to render {} document", format))?;
        let filename = generated_name("gerado", format.extension());
        self.files.write(chat_id, &filename, &bytes)?;
        metrics::record_generated_file(format.extension());
        tracing::info!(chat_id, filename = %filename, format = %format, "Generated document");
        Ok(filename)
    }

    /// Ask the image backend for a picture and store it. Returns the file name.
    /// Not retried: one diffusion run is already expensive.
    pub async fn generate_image(&self, chat_id: &str, prompt: &str) -> Result<String> {
        tracing::info!(chat_id, backend = self.image.name(), "Generating image");
        let bytes = self
            .image
            .generate(prompt)
            .await
            .context("Image generation failed")?;
        let filename = generated_name("imagem", "png");
        self.files.write(chat_id, &filename, &bytes)?;
        metrics::record_generated_file("png");
        tracing::info!(chat_id, filename = %filename, size = bytes.len(), "Generated image");
        Ok(filename)
    }
}
