// ABOUTME: Chat records made of conversation blocks, stored one file per chat.
// ABOUTME: Also holds the per-chat cancellation flags checked by the dispatch pipeline.

use crate::error::{CoreError, CoreResult};
use crate::metrics;
use crate::sanitize::escape_markup;
use crate::store::JsonCollection;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

pub const DEFAULT_CHAT_NAME: &str = "Novo Chat";
pub const CANCELLED_MARKER: &str = "⏹️ Resposta cancelada pelo usuário.";
pub const MAX_CHAT_NAME_CHARS: usize = 200;

const CHAT_NOT_FOUND: &str = "Chat não encontrado";

/// One user turn: the message variants and the AI response for each.
///
/// A block starts with a single variant whose response is `None` (pending)
/// and the response is filled in place later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationBlock {
    pub user_variants: Vec<String>,
    pub ai_responses: Vec<Option<String>>,
    #[serde(default)]
    pub selected: usize,
}

impl ConversationBlock {
    pub fn pending(user_text: &str) -> Self {
        Self {
            user_variants: vec![user_text.to_string()],
            ai_responses: vec![None],
            selected: 0,
        }
    }

    pub fn selected_user_text(&self) -> Option<&str> {
        self.user_variants.get(self.selected).map(String::as_str)
    }

    pub fn selected_response(&self) -> Option<&str> {
        self.ai_responses
            .get(self.selected)
            .and_then(|r| r.as_deref())
    }

    pub fn is_complete(&self) -> bool {
        self.selected_response().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    #[serde(default = "default_chat_name")]
    pub name: String,
    #[serde(default)]
    pub conversation_blocks: Vec<ConversationBlock>,
    /// Set once the user picks a name; auto-naming never overrides it
    #[serde(default)]
    pub renamed: bool,
}

fn default_chat_name() -> String {
    DEFAULT_CHAT_NAME.to_string()
}

impl Default for Chat {
    fn default() -> Self {
        Self {
            name: default_chat_name(),
            conversation_blocks: Vec::new(),
            renamed: false,
        }
    }
}

/// Chat id and name, as listed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    pub name: String,
}

/// Repository over the per-chat JSON documents in `<data_dir>/chats/`
pub struct ConversationStore {
    chats: JsonCollection<Chat>,
}

impl ConversationStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        let chats = JsonCollection::open(data_dir.join("chats"))?;
        let store = Self { chats };
        metrics::set_chat_count(store.count()?);
        Ok(store)
    }

    pub fn count(&self) -> Result<usize> {
        self.chats.len()
    }

    pub fn create_chat(&self) -> CoreResult<ChatSummary> {
        let id = uuid::Uuid::new_v4().to_string();
        let chat = Chat::default();
        let name = chat.name.clone();
        self.chats.insert(&id, chat)?;
        metrics::set_chat_count(self.count()?);
        tracing::info!(chat_id = %id, "Created chat");
        Ok(ChatSummary { id, name })
    }

    /// All chats, ordered by name then id
    pub fn list_chats(&self) -> CoreResult<Vec<ChatSummary>> {
        let mut summaries: Vec<ChatSummary> = self
            .chats
            .list()?
            .into_iter()
            .map(|(id, chat)| ChatSummary {
                id,
                name: chat.name,
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(summaries)
    }

    pub fn get_chat(&self, id: &str) -> CoreResult<Chat> {
        self.chats
            .get(id)?
            .ok_or_else(|| CoreError::not_found(CHAT_NOT_FOUND))
    }

    pub fn exists(&self, id: &str) -> CoreResult<bool> {
        Ok(self.chats.contains(id)?)
    }

    pub fn get_blocks(&self, id: &str) -> CoreResult<Vec<ConversationBlock>> {
        Ok(self.get_chat(id)?.conversation_blocks)
    }

    pub fn delete_chat(&self, id: &str) -> CoreResult<()> {
        if self.chats.remove(id)?.is_none() {
            return Err(CoreError::not_found(CHAT_NOT_FOUND));
        }
        metrics::set_chat_count(self.count()?);
        tracing::info!(chat_id = %id, "Deleted chat");
        Ok(())
    }

    /// Rename a chat on the user's behalf. Returns the stored name.
    pub fn rename_chat(&self, id: &str, name: &str) -> CoreResult<String> {
        let clean = escape_markup(name.trim());
        if clean.chars().count() > MAX_CHAT_NAME_CHARS {
            return Err(CoreError::invalid(format!(
                "Nome demasiado longo (máx {} caracteres)",
                MAX_CHAT_NAME_CHARS
            )));
        }
        if clean.is_empty() {
            return Err(CoreError::invalid("Nome inválido"));
        }
        let stored = clean.clone();
        self.chats
            .update(id, move |chat| {
                chat.name = clean;
                chat.renamed = true;
            })?
            .ok_or_else(|| CoreError::not_found(CHAT_NOT_FOUND))?;
        Ok(stored)
    }

    /// Append a block with a pending response. Returns its index.
    pub fn append_pending_block(&self, id: &str, user_text: &str) -> CoreResult<usize> {
        self.chats
            .update(id, |chat| {
                chat.conversation_blocks
                    .push(ConversationBlock::pending(user_text));
                chat.conversation_blocks.len() - 1
            })?
            .ok_or_else(|| CoreError::not_found(CHAT_NOT_FOUND))
    }

    /// Store the response for one variant of a block
    pub fn finalize_block(
        &self,
        id: &str,
        block_idx: usize,
        variant_idx: usize,
        text: &str,
    ) -> CoreResult<()> {
        self.chats
            .update(id, |chat| {
                let slot = chat
                    .conversation_blocks
                    .get_mut(block_idx)
                    .and_then(|block| block.ai_responses.get_mut(variant_idx))
                    .ok_or_else(|| CoreError::invalid("Índice inválido"))?;
                *slot = Some(text.to_string());
                Ok(())
            })?
            .ok_or_else(|| CoreError::not_found(CHAT_NOT_FOUND))?
    }

    /// Replace the block's selected response with the cancellation marker
    pub fn cancel_block(&self, id: &str, block_idx: usize) -> CoreResult<()> {
        let variant = self
            .get_blocks(id)?
            .get(block_idx)
            .map(|b| b.selected)
            .ok_or_else(|| CoreError::invalid("Índice inválido"))?;
        self.finalize_block(id, block_idx, variant, CANCELLED_MARKER)
    }

    /// Apply a generated name unless the user already renamed the chat.
    /// Returns whether the name was applied.
    pub fn set_auto_name(&self, id: &str, name: &str) -> CoreResult<bool> {
        let clean: String = escape_markup(name.trim())
            .chars()
            .take(MAX_CHAT_NAME_CHARS)
            .collect();
        if clean.is_empty() {
            return Ok(false);
        }
        self.chats
            .update(id, move |chat| {
                if chat.renamed {
                    return false;
                }
                chat.name = clean;
                true
            })?
            .ok_or_else(|| CoreError::not_found(CHAT_NOT_FOUND))
    }

    pub fn completed_block_count(&self, id: &str) -> CoreResult<usize> {
        Ok(self
            .get_blocks(id)?
            .iter()
            .filter(|b| b.is_complete())
            .count())
    }

    /// Selected user text and response of every block before `block_idx`.
    /// Pending blocks contribute only their user text.
    pub fn history_before(
        &self,
        id: &str,
        block_idx: usize,
    ) -> CoreResult<Vec<(String, Option<String>)>> {
        Ok(self
            .get_blocks(id)?
            .iter()
            .take(block_idx)
            .filter_map(|b| {
                let user = b.selected_user_text()?.to_string();
                Some((user, b.selected_response().map(str::to_string)))
            })
            .collect())
    }

    pub fn flush_all(&self) -> Result<usize> {
        self.chats.flush_all()
    }
}

/// Per-chat "stop" requests, consumed by the next finished reply
#[derive(Default)]
pub struct CancellationFlags {
    flags: Mutex<HashSet<String>>,
}

impl CancellationFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, chat_id: &str) -> Result<()> {
        self.flags
            .lock()
            .map_err(|e| anyhow!("Cancellation lock poisoned: {}", e))?
            .insert(chat_id.to_string());
        Ok(())
    }

    /// Clear the flag, returning whether it was set
    pub fn take(&self, chat_id: &str) -> Result<bool> {
        Ok(self
            .flags
            .lock()
            .map_err(|e| anyhow!("Cancellation lock poisoned: {}", e))?
            .remove(chat_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ConversationStore) {
        let dir = TempDir::new().unwrap();
        let store = ConversationStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_create_and_list() {
        let (_dir, store) = store();
        let a = store.create_chat().unwrap();
        let b = store.create_chat().unwrap();
        assert_eq!(a.name, DEFAULT_CHAT_NAME);
        assert_ne!(a.id, b.id);

        store.rename_chat(&b.id, "Alpha").unwrap();
        let listed = store.list_chats().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "Alpha");
        assert_eq!(listed[1].id, a.id);
    }

    #[test]
    fn test_chat_file_written_on_create() {
        let (dir, store) = store();
        let chat = store.create_chat().unwrap();
        assert!(dir
            .path()
            .join("chats")
            .join(format!("{}.json", chat.id))
            .exists());
    }

    #[test]
    fn test_unknown_chat_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(store.get_blocks("nope"), Err(CoreError::NotFound(_))));
        assert!(matches!(store.delete_chat("nope"), Err(CoreError::NotFound(_))));
        assert!(matches!(
            store.append_pending_block("nope", "hi"),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            store.rename_chat("nope", "Name"),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_chat() {
        let (dir, store) = store();
        let chat = store.create_chat().unwrap();
        store.delete_chat(&chat.id).unwrap();
        assert!(store.list_chats().unwrap().is_empty());
        assert!(!dir
            .path()
            .join("chats")
            .join(format!("{}.json", chat.id))
            .exists());
    }

    #[test]
    fn test_rename_sanitizes_and_marks_renamed() {
        let (_dir, store) = store();
        let chat = store.create_chat().unwrap();
        let stored = store.rename_chat(&chat.id, "  <b>Plans</b>  ").unwrap();
        assert_eq!(stored, "&lt;b&gt;Plans&lt;/b&gt;");
        let record = store.get_chat(&chat.id).unwrap();
        assert_eq!(record.name, stored);
        assert!(record.renamed);
    }

    #[test]
    fn test_invalid_renames_leave_name_unchanged() {
        let (_dir, store) = store();
        let chat = store.create_chat().unwrap();

        assert!(matches!(
            store.rename_chat(&chat.id, "   "),
            Err(CoreError::InvalidArgument(_))
        ));
        let too_long = "x".repeat(MAX_CHAT_NAME_CHARS + 1);
        assert!(matches!(
            store.rename_chat(&chat.id, &too_long),
            Err(CoreError::InvalidArgument(_))
        ));
        // 67 '<' become 268 escaped chars
        let expands = "<".repeat(67);
        assert!(store.rename_chat(&chat.id, &expands).is_err());

        let record = store.get_chat(&chat.id).unwrap();
        assert_eq!(record.name, DEFAULT_CHAT_NAME);
        assert!(!record.renamed);

        let exact = "y".repeat(MAX_CHAT_NAME_CHARS);
        assert_eq!(store.rename_chat(&chat.id, &exact).unwrap(), exact);
    }

    #[test]
    fn test_blocks_keep_insertion_order() {
        let (_dir, store) = store();
        let chat = store.create_chat().unwrap();
        let indices: Vec<usize> = (0..5)
            .map(|i| {
                store
                    .append_pending_block(&chat.id, &format!("msg {}", i))
                    .unwrap()
            })
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(store.completed_block_count(&chat.id).unwrap(), 0);

        for i in indices.iter().rev() {
            store
                .finalize_block(&chat.id, *i, 0, &format!("reply {}", i))
                .unwrap();
        }

        let blocks = store.get_blocks(&chat.id).unwrap();
        assert_eq!(blocks.len(), 5);
        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(block.selected_user_text(), Some(format!("msg {}", i).as_str()));
            assert_eq!(block.selected_response(), Some(format!("reply {}", i).as_str()));
            assert!(block.selected < block.user_variants.len());
            assert_eq!(block.user_variants.len(), block.ai_responses.len());
        }
        assert_eq!(store.completed_block_count(&chat.id).unwrap(), 5);
    }

    #[test]
    fn test_finalize_rejects_bad_indices() {
        let (_dir, store) = store();
        let chat = store.create_chat().unwrap();
        store.append_pending_block(&chat.id, "hi").unwrap();
        assert!(matches!(
            store.finalize_block(&chat.id, 3, 0, "x"),
            Err(CoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.finalize_block(&chat.id, 0, 1, "x"),
            Err(CoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_cancel_block_writes_marker() {
        let (_dir, store) = store();
        let chat = store.create_chat().unwrap();
        let idx = store.append_pending_block(&chat.id, "write an essay").unwrap();
        store.cancel_block(&chat.id, idx).unwrap();
        let blocks = store.get_blocks(&chat.id).unwrap();
        assert_eq!(blocks[idx].selected_response(), Some(CANCELLED_MARKER));
    }

    #[test]
    fn test_auto_name_respects_user_rename() {
        let (_dir, store) = store();
        let chat = store.create_chat().unwrap();
        assert!(store.set_auto_name(&chat.id, "Viagem a Lisboa").unwrap());
        assert_eq!(store.get_chat(&chat.id).unwrap().name, "Viagem a Lisboa");
        assert!(!store.get_chat(&chat.id).unwrap().renamed);

        store.rename_chat(&chat.id, "Mine").unwrap();
        assert!(!store.set_auto_name(&chat.id, "Other").unwrap());
        assert_eq!(store.get_chat(&chat.id).unwrap().name, "Mine");
    }

    #[test]
    fn test_history_before_skips_current_block() {
        let (_dir, store) = store();
        let chat = store.create_chat().unwrap();
        store.append_pending_block(&chat.id, "one").unwrap();
        store.finalize_block(&chat.id, 0, 0, "uno").unwrap();
        store.append_pending_block(&chat.id, "two").unwrap();
        let current = store.append_pending_block(&chat.id, "three").unwrap();

        let history = store.history_before(&chat.id, current).unwrap();
        assert_eq!(
            history,
            vec![
                ("one".to_string(), Some("uno".to_string())),
                ("two".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_reopen_preserves_chats() {
        let dir = TempDir::new().unwrap();
        let id = {
            let store = ConversationStore::open(dir.path()).unwrap();
            let chat = store.create_chat().unwrap();
            store.append_pending_block(&chat.id, "persist me").unwrap();
            store.finalize_block(&chat.id, 0, 0, "done").unwrap();
            chat.id
        };
        let store = ConversationStore::open(dir.path()).unwrap();
        let before = store.get_chat(&id).unwrap();
        assert_eq!(before.conversation_blocks.len(), 1);
        assert_eq!(
            before.conversation_blocks[0].selected_response(),
            Some("done")
        );
    }

    #[test]
    fn test_legacy_chat_without_renamed_field_loads() {
        let json = r#"{"name":"Old","conversation_blocks":[{"user_variants":["a"],"ai_responses":[null],"selected":0}]}"#;
        let chat: Chat = serde_json::from_str(json).unwrap();
        assert!(!chat.renamed);
        assert!(!chat.conversation_blocks[0].is_complete());
    }

    #[test]
    fn test_cancellation_flags_are_consumed() {
        let flags = CancellationFlags::new();
        assert!(!flags.take("c1").unwrap());
        flags.request("c1").unwrap();
        flags.request("c1").unwrap();
        assert!(flags.take("c1").unwrap());
        assert!(!flags.take("c1").unwrap());
    }
}
