// ABOUTME: Stable Diffusion WebUI image backend using the /sdapi/v1/txt2img endpoint.
// ABOUTME: Decodes the first base64 image of the response into PNG bytes.

use crate::registry::ImageFactory;
use crate::traits::ImageBackend;
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:7860";
const DEFAULT_STEPS: u64 = 30;
const DEFAULT_SIZE: u64 = 1024;
// Diffusion on CPU can take many minutes
const DEFAULT_TIMEOUT_SECS: u64 = 1800;

#[derive(Serialize)]
struct Txt2ImgRequest<'a> {
    prompt: &'a str,
    steps: u64,
    width: u64,
    height: u64,
}

#[derive(Deserialize)]
struct Txt2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
}

pub struct SdApiBackend {
    client: reqwest::Client,
    base_url: String,
    steps: u64,
    width: u64,
    height: u64,
}

impl SdApiBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for image backend")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            steps: DEFAULT_STEPS,
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
        })
    }

    pub fn with_dimensions(mut self, steps: u64, width: u64, height: u64) -> Self {
        self.steps = steps;
        self.width = width;
        self.height = height;
        self
    }

    /// Factory function for the registry.
    /// Reads `base_url`, `steps`, `width`, `height` and `timeout_secs`.
    pub fn factory() -> ImageFactory {
        Box::new(|config| {
            let base_url = config["base_url"].as_str().unwrap_or(DEFAULT_BASE_URL);
            let timeout = config["timeout_secs"]
                .as_u64()
                .unwrap_or(DEFAULT_TIMEOUT_SECS);
            let backend = SdApiBackend::new(base_url, Duration::from_secs(timeout))?
                .with_dimensions(
                    config["steps"].as_u64().unwrap_or(DEFAULT_STEPS),
                    config["width"].as_u64().unwrap_or(DEFAULT_SIZE),
                    config["height"].as_u64().unwrap_or(DEFAULT_SIZE),
                );
            Ok(Arc::new(backend) as Arc<dyn ImageBackend>)
        })
    }
}

#[async_trait]
impl ImageBackend for SdApiBackend {
    fn name(&self) -> &'static str {
        "sdapi"
    }

    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        let url = format!("{}/sdapi/v1/txt2img", self.base_url);
        tracing::info!(steps = self.steps, width = self.width, height = self.height, "Requesting image generation");

        let resp = self
            .client
            .post(&url)
            .json(&Txt2ImgRequest {
                prompt,
                steps: self.steps,
                width: self.width,
                height: self.height,
            })
            .send()
            .await
            .with_context(|| format!("Cannot reach image backend at {}", self.base_url))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Image backend returned HTTP {}: {}", status, body);
        }

        let parsed: Txt2ImgResponse = resp
            .json()
            .await
            .context("Failed to decode txt2img response")?;
        let encoded = parsed
            .images
            .first()
            .context("Image backend returned no images")?;
        decode_image(encoded)
    }
}

/// Decode a base64 image, tolerating a `data:image/png;base64,` prefix
fn decode_image(encoded: &str) -> Result<Vec<u8>> {
    let payload = match encoded.split_once("base64,") {
        Some((_, data)) => data,
        None => encoded,
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .context("Image payload is not valid base64")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_base64() {
        assert_eq!(decode_image("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_data_url() {
        assert_eq!(
            decode_image("data:image/png;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_image("not base64!!").is_err());
    }
}
