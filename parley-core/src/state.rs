// ABOUTME: Bundle of every persistent store the server owns.
// ABOUTME: Opened once at startup; flush_all is shared by the flusher and shutdown.

use crate::config::Config;
use crate::conversation::{CancellationFlags, ConversationStore};
use crate::feedback::FeedbackStore;
use crate::files::FileStore;
use crate::profile::ProfileStore;
use crate::settings::SettingsStore;
use anyhow::{Context, Result};
use std::path::Path;

pub struct Stores {
    pub conversations: ConversationStore,
    pub profiles: ProfileStore,
    pub settings: SettingsStore,
    pub feedback: FeedbackStore,
    pub files: FileStore,
    pub cancellations: CancellationFlags,
}

impl Stores {
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_at(
            &config.storage.data_path(),
            &config.storage.uploads_path(),
            config.chat.memory_cap,
        )
    }

    pub fn open_at(data_dir: &Path, uploads_dir: &Path, memory_cap: usize) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        std::fs::create_dir_all(uploads_dir).with_context(|| {
            format!("Failed to create uploads directory {}", uploads_dir.display())
        })?;

        let stores = Self {
            conversations: ConversationStore::open(data_dir)?,
            profiles: ProfileStore::open(data_dir, memory_cap)?,
            settings: SettingsStore::open(data_dir)?,
            feedback: FeedbackStore::open(data_dir),
            files: FileStore::new(uploads_dir),
            cancellations: CancellationFlags::new(),
        };
        tracing::info!(
            data_dir = %data_dir.display(),
            chats = stores.conversations.count()?,
            "State loaded"
        );
        Ok(stores)
    }

    /// Rewrite every store. Each failure is logged; the first one is returned.
    pub fn flush_all(&self) -> Result<()> {
        let results = [
            ("chats", self.conversations.flush_all().map(|_| ())),
            ("profiles", self.profiles.flush_all().map(|_| ())),
            ("settings", self.settings.flush()),
            ("feedback", self.feedback.flush()),
        ];
        let mut first_error = None;
        for (store, result) in results {
            if let Err(e) = result {
                tracing::error!(store, error = %e, "Failed to flush state");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_layout() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        let uploads = dir.path().join("uploads");
        let stores = Stores::open_at(&data, &uploads, 20).unwrap();
        assert!(data.join("chats").is_dir());
        assert!(data.join("profiles").is_dir());
        assert!(data.join("settings.json").exists());
        assert!(uploads.is_dir());
        stores.flush_all().unwrap();
        assert!(data.join("feedback.json").exists());
    }

    #[test]
    fn test_flush_all_restores_deleted_records() {
        let dir = TempDir::new().unwrap();
        let stores = Stores::open_at(&dir.path().join("d"), &dir.path().join("u"), 20).unwrap();
        let chat = stores.conversations.create_chat().unwrap();
        stores.profiles.add_memory("default_user", "O utilizador lê.").unwrap();
        let chat_file = dir.path().join("d/chats").join(format!("{}.json", chat.id));
        let profile_file = dir.path().join("d/profiles/default_user.json");
        std::fs::remove_file(&chat_file).unwrap();
        std::fs::remove_file(&profile_file).unwrap();

        stores.flush_all().unwrap();
        assert!(chat_file.exists());
        assert!(profile_file.exists());
    }
}
