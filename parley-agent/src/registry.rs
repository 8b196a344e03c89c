// ABOUTME: Registry pattern for runtime backend selection.
// ABOUTME: Backends register factories, parley creates them by name from config.

use crate::config::BackendConfig;
use crate::traits::{ChatBackend, ImageBackend};
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Factory function that creates a chat backend from config
pub type ChatFactory = Box<dyn Fn(&Value) -> Result<Arc<dyn ChatBackend>> + Send + Sync>;

/// Factory function that creates an image backend from config
pub type ImageFactory = Box<dyn Fn(&Value) -> Result<Arc<dyn ImageBackend>> + Send + Sync>;

/// Registry for runtime backend selection
pub struct BackendRegistry {
    chat: HashMap<String, ChatFactory>,
    image: HashMap<String, ImageFactory>,
}

impl BackendRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            chat: HashMap::new(),
            image: HashMap::new(),
        }
    }

    /// Register a chat backend factory by name
    pub fn register_chat<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&Value) -> Result<Arc<dyn ChatBackend>> + Send + Sync + 'static,
    {
        self.chat.insert(name.to_string(), Box::new(factory));
        self
    }

    /// Register an image backend factory by name
    pub fn register_image<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&Value) -> Result<Arc<dyn ImageBackend>> + Send + Sync + 'static,
    {
        self.image.insert(name.to_string(), Box::new(factory));
        self
    }

    /// Create a chat backend by name with the given config
    pub fn create_chat(&self, name: &str, config: &Value) -> Result<Arc<dyn ChatBackend>> {
        let factory = self
            .chat
            .get(name)
            .ok_or_else(|| anyhow!("Unknown chat backend: {}", name))?;
        factory(config)
    }

    /// Create an image backend by name with the given config
    pub fn create_image(&self, name: &str, config: &Value) -> Result<Arc<dyn ImageBackend>> {
        let factory = self
            .image
            .get(name)
            .ok_or_else(|| anyhow!("Unknown image backend: {}", name))?;
        factory(config)
    }

    /// List available chat backend names
    pub fn available_chat(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.chat.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// List available image backend names
    pub fn available_image(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.image.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn chat_from_config(&self, config: &BackendConfig) -> Result<Arc<dyn ChatBackend>> {
        self.create_chat(config.backend_type(), &config.to_json_value())
    }

    pub fn image_from_config(&self, config: &BackendConfig) -> Result<Arc<dyn ImageBackend>> {
        self.create_image(config.backend_type(), &config.to_json_value())
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        use crate::backends::mock::{MockBackend, MockImageBackend};
        use crate::backends::ollama::OllamaBackend;
        use crate::backends::sdapi::SdApiBackend;
        use crate::backends::DisabledImageBackend;

        Self::new()
            .register_chat("ollama", OllamaBackend::factory())
            .register_chat("mock", MockBackend::factory())
            .register_image("sdapi", SdApiBackend::factory())
            .register_image("mock", MockImageBackend::factory())
            .register_image("disabled", |_config: &Value| {
                Ok(Arc::new(DisabledImageBackend) as Arc<dyn ImageBackend>)
            })
    }
}
