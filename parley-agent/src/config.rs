// ABOUTME: Backend section configuration shared by the chat and image backends.
// ABOUTME: A type discriminator plus free-form fields that are handed to the backend factory.

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of attempts for language-model calls
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default first backoff delay (one "unit") between attempts
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Backend configuration with type discriminator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend type: "ollama", "sdapi", "mock", "disabled"
    #[serde(rename = "type")]
    pub backend_type: String,

    /// Remaining fields passed to backend factory
    #[serde(flatten)]
    pub config: toml::Table,
}

impl BackendConfig {
    pub fn new(backend_type: &str) -> Self {
        Self {
            backend_type: backend_type.to_string(),
            config: toml::Table::new(),
        }
    }

    /// Builder-style setter used by env overrides and tests
    pub fn with(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }

    /// Get backend type name
    pub fn backend_type(&self) -> &str {
        &self.backend_type
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.config
            .get(key)
            .and_then(|v| v.as_integer())
            .and_then(|v| u64::try_from(v).ok())
    }

    /// Exponential retry policy for calls to this backend.
    /// Reads `max_retries` and `retry_base_delay_ms`.
    pub fn retry_policy(&self) -> RetryPolicy {
        let attempts = self
            .get_u64("max_retries")
            .map(|v| v.clamp(1, u32::MAX as u64) as u32)
            .unwrap_or(DEFAULT_MAX_RETRIES);
        let delay = self
            .get_u64("retry_base_delay_ms")
            .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS);
        RetryPolicy::exponential(attempts, Duration::from_millis(delay))
    }

    /// Convert config table to serde_json::Value for registry
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_else(|_| serde_json::json!({}))
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new("ollama")
    }
}
