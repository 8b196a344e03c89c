// ABOUTME: Per-user profile of free-form attributes and short memory sentences.
// ABOUTME: Stored one file per user under <data_dir>/profiles/.

mod extractor;

pub use extractor::{is_greeting, parse_attributes, ProfileExtractor, ProfileUpdate};

use crate::error::{CoreError, CoreResult};
use crate::sanitize::clean_capped;
use crate::store::JsonCollection;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Longest attribute value or memory sentence accepted from clients
pub const MAX_VALUE_CHARS: usize = 200;

/// Key holding the memory list; never accepted as an attribute name
pub const MEMORIES_KEY: &str = "memorias_resumidas";

/// What the assistant knows about its user.
///
/// On disk and on the wire the attributes sit at the top level next to
/// `memorias_resumidas`, e.g. `{"nome": "Ana", "memorias_resumidas": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
    #[serde(rename = "memorias_resumidas", default)]
    pub memories: Vec<String>,
}

/// Render a JSON value as an attribute string.
/// Scalars are stringified, arrays of scalars joined with ", ",
/// null and nested objects give `None`.
pub fn attribute_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::Array(_) | Value::Object(_) => None,
                    other => attribute_value(other),
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::Null | Value::Object(_) => None,
    }
}

/// Drop exact duplicates (first occurrence wins) and keep the `cap` most recent
fn normalize_memories(memories: Vec<String>, cap: usize) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(memories.len());
    for sentence in memories {
        if !unique.contains(&sentence) {
            unique.push(sentence);
        }
    }
    let excess = unique.len().saturating_sub(cap);
    unique.split_off(excess)
}

pub struct ProfileStore {
    profiles: JsonCollection<UserProfile>,
    memory_cap: usize,
}

impl ProfileStore {
    pub fn open(data_dir: &Path, memory_cap: usize) -> Result<Self> {
        Ok(Self {
            profiles: JsonCollection::open(data_dir.join("profiles"))?,
            memory_cap: memory_cap.max(1),
        })
    }

    pub fn memory_cap(&self) -> usize {
        self.memory_cap
    }

    /// The user's profile, empty when none was stored yet
    pub fn get(&self, user_id: &str) -> CoreResult<UserProfile> {
        Ok(self.profiles.get(user_id)?.unwrap_or_default())
    }

    /// Shallow-merge extracted attributes. Returns whether anything changed.
    pub fn merge_attributes(
        &self,
        user_id: &str,
        attributes: BTreeMap<String, String>,
    ) -> CoreResult<bool> {
        if attributes.is_empty() {
            return Ok(false);
        }
        let changed = self.profiles.upsert_with(user_id, UserProfile::default, |profile| {
            let mut changed = false;
            for (key, value) in attributes {
                if key == MEMORIES_KEY {
                    continue;
                }
                if profile.attributes.get(&key) != Some(&value) {
                    profile.attributes.insert(key, value);
                    changed = true;
                }
            }
            changed
        })?;
        Ok(changed)
    }

    /// Append a memory sentence unless already known, keeping the most recent
    /// `memory_cap` entries. Returns whether the list changed.
    pub fn add_memory(&self, user_id: &str, sentence: &str) -> CoreResult<bool> {
        let cap = self.memory_cap;
        let added = self.profiles.upsert_with(user_id, UserProfile::default, |profile| {
            if profile.memories.iter().any(|m| m == sentence) {
                return false;
            }
            profile.memories.push(sentence.to_string());
            let excess = profile.memories.len().saturating_sub(cap);
            profile.memories.drain(..excess);
            true
        })?;
        Ok(added)
    }

    /// Replace every attribute with client-supplied values.
    /// Values are rendered with [`attribute_value`], markup-escaped and capped.
    pub fn replace_attributes(
        &self,
        user_id: &str,
        values: &serde_json::Map<String, Value>,
    ) -> CoreResult<()> {
        let attributes: BTreeMap<String, String> = values
            .iter()
            .filter(|(key, _)| key.as_str() != MEMORIES_KEY)
            .filter_map(|(key, value)| {
                attribute_value(value).map(|v| (key.clone(), clean_capped(&v, MAX_VALUE_CHARS)))
            })
            .collect();
        self.profiles.upsert_with(user_id, UserProfile::default, |profile| {
            profile.attributes = attributes;
        })?;
        Ok(())
    }

    /// Replace the memory list with client-supplied sentences
    pub fn replace_memories(&self, user_id: &str, memories: &[Value]) -> CoreResult<()> {
        let cleaned: Vec<String> = memories
            .iter()
            .filter_map(attribute_value)
            .map(|m| clean_capped(&m, MAX_VALUE_CHARS))
            .filter(|m| !m.trim().is_empty())
            .collect();
        let normalized = normalize_memories(cleaned, self.memory_cap);
        self.profiles.upsert_with(user_id, UserProfile::default, |profile| {
            profile.memories = normalized;
        })?;
        Ok(())
    }

    pub fn delete_memory(&self, user_id: &str, idx: usize) -> CoreResult<()> {
        let removed = self
            .profiles
            .update(user_id, |profile| {
                if idx < profile.memories.len() {
                    profile.memories.remove(idx);
                    true
                } else {
                    false
                }
            })?
            .unwrap_or(false);
        if !removed {
            return Err(CoreError::invalid("Índice inválido"));
        }
        Ok(())
    }

    pub fn clear_memories(&self, user_id: &str) -> CoreResult<()> {
        self.profiles
            .update(user_id, |profile| profile.memories.clear())?
            .ok_or_else(|| CoreError::invalid("Nada para apagar"))
    }

    pub fn flush_all(&self) -> Result<usize> {
        self.profiles.flush_all()
    }
}
