// ABOUTME: Durable JSON persistence with atomic writes and owner-only permissions.
// ABOUTME: JsonCollection keeps one file per key; JsonDocument wraps a single file.

use crate::sanitize::sanitize_filename;
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;

/// Load a JSON document, returning `default` when it is missing or unreadable.
///
/// Read and parse failures are logged; they are never fatal so a corrupt
/// file cannot keep the server from starting.
pub fn load_json<T: DeserializeOwned>(path: &Path, default: T) -> T {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return default,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read state file, using default");
            return default;
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to parse state file, using default");
            default
        }
    }
}

/// Atomically write `value` as pretty JSON to `path`
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    PendingWrite::prepare(path, value)?.commit()
}

/// A serialized document sitting in a temp file next to its target.
///
/// `commit` renames it over the target. Dropping it without committing
/// deletes the temp file and leaves the previous version untouched.
pub struct PendingWrite {
    temp: NamedTempFile,
    target: PathBuf,
}

impl PendingWrite {
    pub fn prepare<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<Self> {
        let target = safe_target(path)?;
        let dir = target
            .parent()
            .ok_or_else(|| anyhow!("State path has no parent: {}", target.display()))?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        let json = serde_json::to_vec_pretty(value).context("Failed to serialize state")?;
        let mut temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        temp.write_all(&json).context("Failed to write temp file")?;
        temp.flush().context("Failed to flush temp file")?;
        temp.as_file().sync_all().context("Failed to sync temp file")?;

        Ok(Self { temp, target })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn commit(self) -> Result<()> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| anyhow!("Failed to replace {}: {}", target.display(), e.error))?;
        restrict_permissions(&target)?;
        Ok(())
    }
}

/// Sanitize the file name component, keep the directory as given
fn safe_target(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid state file name: {}", path.display()))?;
    Ok(path.with_file_name(sanitize_filename(name)))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|e| anyhow!("{} lock poisoned: {}", what, e))
}

/// Key-indexed collection stored as `<dir>/<sanitized key>.json`.
///
/// All access goes through the collection's own lock, and every mutation
/// writes only the record it touched before the lock is released. Memory
/// only changes once that write has succeeded.
pub struct JsonCollection<T> {
    dir: PathBuf,
    records: Mutex<BTreeMap<String, T>>,
}

impl<T> JsonCollection<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Load every `*.json` document found in `dir` (created if missing)
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        let mut records = BTreeMap::new();
        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(value) = load_json::<Option<T>>(&path, None) else {
                continue;
            };
            records.insert(key.to_string(), value);
        }

        tracing::debug!(dir = %dir.display(), count = records.len(), "Loaded collection");
        Ok(Self {
            dir,
            records: Mutex::new(records),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_filename(key)))
    }

    fn guard(&self) -> Result<MutexGuard<'_, BTreeMap<String, T>>> {
        lock(&self.records, "Collection")
    }

    pub fn get(&self, key: &str) -> Result<Option<T>> {
        Ok(self.guard()?.get(key).cloned())
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.guard()?.contains_key(key))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.guard()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.guard()?.is_empty())
    }

    /// Snapshot of every record, ordered by key
    pub fn list(&self) -> Result<Vec<(String, T)>> {
        Ok(self
            .guard()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    pub fn insert(&self, key: &str, value: T) -> Result<()> {
        let mut records = self.guard()?;
        save_json(&self.path_for(key), &value)?;
        records.insert(key.to_string(), value);
        Ok(())
    }

    /// Mutate an existing record and persist it. Returns `None` for unknown keys.
    pub fn update<R>(&self, key: &str, f: impl FnOnce(&mut T) -> R) -> Result<Option<R>> {
        let mut records = self.guard()?;
        let Some(current) = records.get(key) else {
            return Ok(None);
        };
        let mut record = current.clone();
        let out = f(&mut record);
        save_json(&self.path_for(key), &record)?;
        records.insert(key.to_string(), record);
        Ok(Some(out))
    }

    /// Mutate a record, creating it with `init` first when absent
    pub fn upsert_with<R>(
        &self,
        key: &str,
        init: impl FnOnce() -> T,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R> {
        let mut records = self.guard()?;
        let mut record = records.get(key).cloned().unwrap_or_else(init);
        let out = f(&mut record);
        save_json(&self.path_for(key), &record)?;
        records.insert(key.to_string(), record);
        Ok(out)
    }

    /// Remove a record and its file. Returns the removed value.
    pub fn remove(&self, key: &str) -> Result<Option<T>> {
        let mut records = self.guard()?;
        let removed = records.remove(key);
        if removed.is_some() {
            let path = self.path_for(key);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to delete {}", path.display()))
                }
            }
        }
        Ok(removed)
    }

    /// Rewrite every record. Returns how many were written.
    pub fn flush_all(&self) -> Result<usize> {
        let records = self.guard()?;
        for (key, value) in records.iter() {
            save_json(&self.path_for(key), value)?;
        }
        Ok(records.len())
    }
}

/// A single JSON document with its own lock
pub struct JsonDocument<T> {
    path: PathBuf,
    value: Mutex<T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Load the document, falling back to `default` when missing or corrupt
    pub fn open(path: impl Into<PathBuf>, default: T) -> Self {
        let path = path.into();
        let value = load_json(&path, default);
        Self {
            path,
            value: Mutex::new(value),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Result<T> {
        Ok(lock(&self.value, "Document")?.clone())
    }

    pub fn replace(&self, value: T) -> Result<()> {
        let mut current = lock(&self.value, "Document")?;
        save_json(&self.path, &value)?;
        *current = value;
        Ok(())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut current = lock(&self.value, "Document")?;
        let mut next = current.clone();
        let out = f(&mut next);
        save_json(&self.path, &next)?;
        *current = next;
        Ok(out)
    }

    pub fn flush(&self) -> Result<()> {
        let current = lock(&self.value, "Document")?;
        save_json(&self.path, &*current)
    }
}
