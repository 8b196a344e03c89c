// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates numeric limits and provides defaults for every section
use crate::paths;
use anyhow::{Context, Result};
use parley_agent::BackendConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Language-model backend ("ollama" or "mock")
    #[serde(default)]
    pub backend: BackendConfig,
    /// Text-to-image backend ("sdapi", "mock" or "disabled")
    #[serde(default = "default_image_backend")]
    pub image: BackendConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            backend: BackendConfig::default(),
            image: default_image_backend(),
            chat: ChatConfig::default(),
            files: FilesConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Chats, profiles, settings and feedback live here
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Uploaded and generated files, one subdirectory per chat
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            uploads_dir: default_uploads_dir(),
        }
    }
}

impl StorageConfig {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn uploads_path(&self) -> PathBuf {
        PathBuf::from(&self.uploads_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Owner of the single profile this instance keeps
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    /// How many memory sentences a profile keeps
    #[serde(default = "default_memory_cap")]
    pub memory_cap: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            max_message_chars: default_max_message_chars(),
            flush_interval_secs: default_flush_interval_secs(),
            memory_cap: default_memory_cap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Extensions accepted by upload and shown by the file listing
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl FilesConfig {
    pub fn is_allowed(&self, filename: &str) -> bool {
        crate::sanitize::extension_of(filename)
            .map(|ext| {
                self.allowed_extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
            })
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_uploads_dir() -> String {
    "./uploads".to_string()
}

fn default_image_backend() -> BackendConfig {
    BackendConfig::new("sdapi")
}

fn default_user_id() -> String {
    "default_user".to_string()
}

fn default_max_message_chars() -> usize {
    20_000
}

fn default_flush_interval_secs() -> u64 {
    10
}

fn default_memory_cap() -> usize {
    20
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["pdf".to_string(), "txt".to_string()]
}

fn default_max_results() -> usize {
    3
}

/// Expand tilde (~) to home directory in paths
/// Logs a warning if expansion fails and falls back to the original path
fn expand_tilde(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs
                .home_dir()
                .join(stripped)
                .to_string_lossy()
                .to_string();
        }
        tracing::warn!(path = %path, "Failed to expand tilde: could not determine home directory");
    }
    path.to_string()
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. explicit path (the `--config` flag)
    /// 2. PARLEY_CONFIG_PATH env var
    /// 3. ./config.toml (current directory - for development)
    /// 4. ~/.config/parley/config.toml
    fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(env_path) = std::env::var("PARLEY_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration from the usual locations with environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, preferring `explicit` over the search path.
    /// An explicit path that does not exist is an error.
    pub fn load_from(explicit: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file(explicit) {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using defaults");
            Config::default()
        };

        config.apply_env_overrides()?;

        config.storage.data_dir = expand_tilde(&config.storage.data_dir);
        config.storage.uploads_dir = expand_tilde(&config.storage.uploads_dir);

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("PARLEY_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("PARLEY_PORT") {
            self.server.port = val.parse().with_context(|| {
                format!("PARLEY_PORT must be a valid port number, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("PARLEY_DATA_DIR") {
            self.storage.data_dir = val;
        }
        if let Ok(val) = std::env::var("PARLEY_UPLOADS_DIR") {
            self.storage.uploads_dir = val;
        }
        if let Ok(val) = std::env::var("PARLEY_BACKEND") {
            self.backend.backend_type = val;
        }
        if let Ok(val) = std::env::var("OLLAMA_BASE_URL") {
            self.backend.config.insert("base_url".to_string(), val.into());
        }
        if let Ok(val) = std::env::var("PARLEY_MODEL") {
            self.backend.config.insert("model".to_string(), val.into());
        }
        if let Ok(val) = std::env::var("PARLEY_IMAGE_BACKEND") {
            self.image.backend_type = val;
        }
        if let Ok(val) = std::env::var("SD_BASE_URL") {
            self.image.config.insert("base_url".to_string(), val.into());
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }
        if self.backend.get_u64("max_retries") == Some(0) {
            anyhow::bail!("backend.max_retries must be at least 1");
        }
        if self.chat.flush_interval_secs == 0 {
            anyhow::bail!("chat.flush_interval_secs must be at least 1");
        }
        if self.chat.max_message_chars == 0 {
            anyhow::bail!("chat.max_message_chars must be at least 1");
        }
        if self.chat.memory_cap == 0 {
            anyhow::bail!("chat.memory_cap must be at least 1");
        }
        if self.chat.user_id.trim().is_empty() {
            anyhow::bail!("chat.user_id must not be empty");
        }
        Ok(())
    }

    /// Effective configuration rendered back as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }
}
