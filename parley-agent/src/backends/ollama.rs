// ABOUTME: Ollama chat backend - posts non-streaming requests to /api/chat.
// ABOUTME: One HTTP round-trip per call; retries are the caller's responsibility.

use crate::message::ChatMessage;
use crate::registry::ChatFactory;
use crate::traits::ChatBackend;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.1:8b";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for Ollama")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Factory function for the registry.
    /// Reads `base_url`, `model` and `timeout_secs`.
    pub fn factory() -> ChatFactory {
        Box::new(|config| {
            let base_url = config["base_url"].as_str().unwrap_or(DEFAULT_BASE_URL);
            let model = config["model"].as_str().unwrap_or(DEFAULT_MODEL);
            let timeout = config["timeout_secs"]
                .as_u64()
                .unwrap_or(DEFAULT_TIMEOUT_SECS);
            let backend = OllamaBackend::new(base_url, model, Duration::from_secs(timeout))?;
            Ok(Arc::new(backend) as Arc<dyn ChatBackend>)
        })
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        tracing::debug!(model = %self.model, messages = messages.len(), "Sending chat request to Ollama");

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Cannot reach Ollama at {}", self.base_url))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned HTTP {}: {}", status, body);
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .context("Failed to decode Ollama chat response")?;
        Ok(parsed.message.content)
    }
}
