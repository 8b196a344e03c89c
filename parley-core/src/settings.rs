// ABOUTME: Front-end preferences, including the two memory toggles the pipeline reads.
// ABOUTME: Persisted as a single settings.json document, replaced wholesale on update.

use crate::store::JsonDocument;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub memory: MemorySettings,
    /// Keys the server does not interpret, kept for the front-end
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Include profile attributes and memories in the prompt
    #[serde(default = "default_true")]
    pub reference_saved_memories: bool,
    /// Include earlier turns of the chat in the prompt
    #[serde(default)]
    pub reference_chat_history: bool,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            reference_saved_memories: true,
            reference_chat_history: false,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            language: default_language(),
            memory: MemorySettings::default(),
            extra: serde_json::Map::new(),
        }
    }
}

fn default_theme() -> String {
    "dark".to_string()
}

fn default_language() -> String {
    "auto".to_string()
}

fn default_true() -> bool {
    true
}

pub struct SettingsStore {
    document: JsonDocument<Settings>,
}

impl SettingsStore {
    /// Open `<data_dir>/settings.json`, writing the defaults when it is missing
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("settings.json");
        let existed = path.exists();
        let document = JsonDocument::open(path, Settings::default());
        if !existed {
            document.flush()?;
        }
        Ok(Self { document })
    }

    pub fn get(&self) -> Result<Settings> {
        self.document.get()
    }

    pub fn memory(&self) -> Result<MemorySettings> {
        Ok(self.document.get()?.memory)
    }

    pub fn replace(&self, settings: Settings) -> Result<()> {
        tracing::info!(theme = %settings.theme, language = %settings.language, "Settings updated");
        self.document.replace(settings)
    }

    pub fn flush(&self) -> Result<()> {
        self.document.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_written_on_first_open() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::open(dir.path()).unwrap();
        assert!(dir.path().join("settings.json").exists());
        let settings = store.get().unwrap();
        assert_eq!(settings.theme, "dark");
        assert_eq!(settings.language, "auto");
        assert!(settings.memory.reference_saved_memories);
        assert!(!settings.memory.reference_chat_history);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let settings: Settings = serde_json::from_value(json!({"theme": "light"})).unwrap();
        assert_eq!(settings.theme, "light");
        assert_eq!(settings.memory, MemorySettings::default());
    }

    #[test]
    fn test_unknown_keys_survive() {
        let value = json!({
            "theme": "light",
            "language": "pt",
            "memory": {"reference_saved_memories": false, "reference_chat_history": true},
            "font_size": 14
        });
        let settings: Settings = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(settings.extra["font_size"], 14);
        assert_eq!(serde_json::to_value(&settings).unwrap(), value);
    }

    #[test]
    fn test_replace_persists() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::open(dir.path()).unwrap();
        let mut settings = store.get().unwrap();
        settings.memory.reference_chat_history = true;
        store.replace(settings.clone()).unwrap();

        let reopened = SettingsStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get().unwrap(), settings);
        assert!(reopened.memory().unwrap().reference_chat_history);
    }
}
