// ABOUTME: Per-chat file area under the uploads directory.
// ABOUTME: Holds user uploads and generated documents and images, one folder per chat.

use crate::error::{CoreError, CoreResult};
use crate::sanitize::{sanitize_filename, secure_filename};
use anyhow::Context;
use std::path::{Path, PathBuf};

const FILE_NOT_FOUND: &str = "Arquivo não encontrado";
const INVALID_CHAT_ID: &str = "chat_id inválido";

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder name used for a chat, also the `{chat}` part of download links
    pub fn chat_dir_name(chat_id: &str) -> String {
        sanitize_filename(chat_id)
    }

    /// The chat's folder. Ids that would name the uploads root or its parent
    /// (empty, `.`, `..`, any run of dots) are rejected.
    pub fn chat_dir(&self, chat_id: &str) -> CoreResult<PathBuf> {
        let name = Self::chat_dir_name(chat_id);
        if name.chars().all(|c| c == '.') {
            return Err(CoreError::invalid(INVALID_CHAT_ID));
        }
        Ok(self.root.join(name))
    }

    /// Write `bytes` as `filename` in the chat's folder, creating it if needed.
    /// The name must already be safe; it is used as given.
    pub fn write(&self, chat_id: &str, filename: &str, bytes: &[u8]) -> CoreResult<PathBuf> {
        let dir = self.chat_dir(chat_id)?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(filename);
        std::fs::write(&path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Store an upload under its secured name. Returns the stored name.
    pub fn save_upload(&self, chat_id: &str, original_name: &str, bytes: &[u8]) -> CoreResult<String> {
        let name = secure_filename(original_name);
        if name.is_empty() {
            return Err(CoreError::invalid("Nome de arquivo vazio"));
        }
        self.write(chat_id, &name, bytes)?;
        tracing::info!(chat_id, filename = %name, size = bytes.len(), "Stored upload");
        Ok(name)
    }

    /// File names in the chat's folder accepted by `keep`, sorted.
    /// A chat without a folder has no files.
    pub fn list(&self, chat_id: &str, keep: impl Fn(&str) -> bool) -> CoreResult<Vec<String>> {
        let dir = self.chat_dir(chat_id)?;
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to list {}", dir.display()))
                    .into())
            }
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| keep(name))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Path of an existing file in the chat's folder.
    /// The requested name is secured first, so it can never leave the folder.
    pub fn resolve(&self, chat_id: &str, filename: &str) -> CoreResult<PathBuf> {
        let name = secure_filename(filename);
        if name.is_empty() {
            return Err(CoreError::not_found(FILE_NOT_FOUND));
        }
        let path = self.chat_dir(chat_id)?.join(&name);
        if !path.is_file() {
            return Err(CoreError::not_found(FILE_NOT_FOUND));
        }
        Ok(path)
    }
}
