// ABOUTME: The message pipeline: validate, record, extract profile, reply, classify, generate, persist.
// ABOUTME: Every backend failure except image generation degrades to a usable reply.

use crate::classifier::{RequestClassifier, RequestKind};
use crate::config::Config;
use crate::conversation::CANCELLED_MARKER;
use crate::documents;
use crate::error::{CoreError, CoreResult};
use crate::files::FileStore;
use crate::generate::Generators;
use crate::llm;
use crate::metrics;
use crate::profile::ProfileExtractor;
use crate::prompts;
use crate::sanitize::escape_markup;
use crate::state::Stores;
use parley_agent::{ChatBackend, ChatMessage, ImageBackend, RetryPolicy};
use serde::Serialize;
use std::sync::Arc;

/// Characters of the user message used as a fallback chat name
const FALLBACK_NAME_CHARS: usize = 30;

/// How a message ended up being answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    PlainReplied,
    FileGenerated,
    FileFormatUnknown,
    ImageGenerated,
    Cancelled,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::PlainReplied => "plain",
            Outcome::FileGenerated => "file",
            Outcome::FileFormatUnknown => "file_format_unknown",
            Outcome::ImageGenerated => "image",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// Response body of `POST /chat/{id}/send`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendResult {
    pub ai_text: String,
    pub block_idx: usize,
    pub memoria_atualizada: bool,
}

pub struct Dispatcher {
    stores: Arc<Stores>,
    backend: Arc<dyn ChatBackend>,
    policy: RetryPolicy,
    extractor: ProfileExtractor,
    classifier: RequestClassifier,
    generators: Generators,
    user_id: String,
    max_message_chars: usize,
}

impl Dispatcher {
    pub fn new(
        stores: Arc<Stores>,
        backend: Arc<dyn ChatBackend>,
        image: Arc<dyn ImageBackend>,
        config: &Config,
    ) -> Self {
        let policy = config.backend.retry_policy();
        let files: FileStore = stores.files.clone();
        Self {
            extractor: ProfileExtractor::new(backend.clone(), policy),
            classifier: RequestClassifier::new(backend.clone(), policy),
            generators: Generators::new(files, image),
            stores,
            backend,
            policy,
            user_id: config.chat.user_id.clone(),
            max_message_chars: config.chat.max_message_chars,
        }
    }

    pub fn stores(&self) -> &Arc<Stores> {
        &self.stores
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Answer one user message in `chat_id`.
    ///
    /// The block is persisted as pending before any backend call, so a crash
    /// mid-reply still leaves the question on disk. Only a failed image
    /// generation is an error; the block then stays pending.
    pub async fn send(&self, chat_id: &str, message: &str) -> CoreResult<SendResult> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(CoreError::invalid("Mensagem vazia"));
        }
        if trimmed.chars().count() > self.max_message_chars {
            return Err(CoreError::invalid(format!(
                "Mensagem demasiado longa (máx {} caracteres)",
                self.max_message_chars
            )));
        }
        if !self.stores.conversations.exists(chat_id)? {
            return Err(CoreError::not_found("Chat não encontrado"));
        }

        let user_text = escape_markup(trimmed);
        let conversations = &self.stores.conversations;
        let block_idx = conversations.append_pending_block(chat_id, &user_text)?;
        tracing::info!(chat_id, block_idx, chars = user_text.chars().count(), "Message received");

        let update = self
            .extractor
            .update_profile(&self.stores.profiles, &self.user_id, &user_text)
            .await;

        let messages = self.build_messages(chat_id, block_idx, &user_text)?;
        let mut ai_text = llm::chat(self.backend.as_ref(), &self.policy, &messages)
            .await
            .unwrap_or_else(|| prompts::APOLOGY.to_string());

        let chat_dir = FileStore::chat_dir_name(chat_id);
        let outcome = match self.classifier.classify(&user_text).await {
            RequestKind::Plain => Outcome::PlainReplied,
            RequestKind::FileFormatUnknown => {
                if let Some(cancelled) = self.take_cancellation(chat_id, block_idx, false)? {
                    return Ok(cancelled);
                }
                conversations.finalize_block(chat_id, block_idx, 0, prompts::ASK_FILE_FORMAT)?;
                self.finish(chat_id, Outcome::FileFormatUnknown);
                return Ok(SendResult {
                    ai_text: prompts::ASK_FILE_FORMAT.to_string(),
                    block_idx,
                    memoria_atualizada: false,
                });
            }
            RequestKind::File(format) => {
                let content = documents::document_content(&user_text, &ai_text);
                match self.generators.write_document(chat_id, format, &content) {
                    Ok(filename) => {
                        ai_text.push_str(&prompts::file_link(&chat_dir, &filename));
                        Outcome::FileGenerated
                    }
                    Err(e) => {
                        tracing::warn!(chat_id, format = %format, error = %e, "Document generation failed");
                        Outcome::PlainReplied
                    }
                }
            }
            RequestKind::Image => {
                let filename = self
                    .generators
                    .generate_image(chat_id, &user_text)
                    .await
                    .map_err(|e| {
                        tracing::error!(chat_id, block_idx, error = %e, "Image generation failed");
                        metrics::record_backend_failure("image");
                        CoreError::Internal(e)
                    })?;
                ai_text = prompts::image_reply(&chat_dir, &filename);
                Outcome::ImageGenerated
            }
        };

        if let Some(cancelled) =
            self.take_cancellation(chat_id, block_idx, update.memory_updated)?
        {
            return Ok(cancelled);
        }

        conversations.finalize_block(chat_id, block_idx, 0, &ai_text)?;
        if conversations.completed_block_count(chat_id)? == 1
            && !conversations.get_chat(chat_id)?.renamed
        {
            let name = self.suggest_name(&user_text).await;
            if conversations.set_auto_name(chat_id, &name)? {
                tracing::info!(chat_id, name = %name, "Chat named");
            }
        }

        self.finish(chat_id, outcome);
        Ok(SendResult {
            ai_text,
            block_idx,
            memoria_atualizada: update.memory_updated,
        })
    }

    /// Consume a pending cancellation, marking the block as cancelled
    fn take_cancellation(
        &self,
        chat_id: &str,
        block_idx: usize,
        memory_updated: bool,
    ) -> CoreResult<Option<SendResult>> {
        if !self.stores.cancellations.take(chat_id)? {
            return Ok(None);
        }
        self.stores.conversations.cancel_block(chat_id, block_idx)?;
        self.finish(chat_id, Outcome::Cancelled);
        Ok(Some(SendResult {
            ai_text: CANCELLED_MARKER.to_string(),
            block_idx,
            memoria_atualizada: memory_updated,
        }))
    }

    /// Flag the chat so its in-flight reply is discarded when it returns
    pub fn cancel(&self, chat_id: &str) -> CoreResult<()> {
        if !self.stores.conversations.exists(chat_id)? {
            return Err(CoreError::not_found("Chat não encontrado"));
        }
        self.stores.cancellations.request(chat_id)?;
        tracing::info!(chat_id, "Cancellation requested");
        Ok(())
    }

    /// Persona, optional profile and history context, then the new message
    fn build_messages(
        &self,
        chat_id: &str,
        block_idx: usize,
        user_text: &str,
    ) -> CoreResult<Vec<ChatMessage>> {
        let memory = self.stores.settings.memory()?;
        let mut messages = vec![ChatMessage::system(prompts::PERSONA)];

        if memory.reference_saved_memories {
            let profile = self.stores.profiles.get(&self.user_id)?;
            if let Some(context) = prompts::profile_context(&profile) {
                messages.push(ChatMessage::system(context));
            }
        }
        if memory.reference_chat_history {
            for (user, response) in self.stores.conversations.history_before(chat_id, block_idx)? {
                messages.push(ChatMessage::user(user));
                if let Some(response) = response {
                    messages.push(ChatMessage::assistant(response));
                }
            }
        }

        messages.push(ChatMessage::user(user_text));
        Ok(messages)
    }

    /// One naming attempt; falls back to the start of the message
    async fn suggest_name(&self, user_text: &str) -> String {
        let policy = self.policy.with_max_attempts(1);
        let prompt = prompts::naming_prompt(user_text);
        let suggested = llm::ask(self.backend.as_ref(), &policy, "naming", &prompt)
            .await
            .map(|name| {
                name.trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”') || c.is_whitespace())
                    .to_string()
            })
            .filter(|name| !name.is_empty());

        suggested.unwrap_or_else(|| user_text.chars().take(FALLBACK_NAME_CHARS).collect())
    }

    fn finish(&self, chat_id: &str, outcome: Outcome) {
        metrics::record_message(outcome.as_str());
        tracing::info!(chat_id, outcome = outcome.as_str(), "Message answered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels_are_distinct() {
        let labels: std::collections::HashSet<_> = [
            Outcome::PlainReplied,
            Outcome::FileGenerated,
            Outcome::FileFormatUnknown,
            Outcome::ImageGenerated,
            Outcome::Cancelled,
        ]
        .iter()
        .map(|o| o.as_str())
        .collect();
        assert_eq!(labels.len(), 5);
    }

    #[test]
    fn test_send_result_wire_format() {
        let result = SendResult {
            ai_text: "Olá".to_string(),
            block_idx: 2,
            memoria_atualizada: true,
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({"ai_text": "Olá", "block_idx": 2, "memoria_atualizada": true})
        );
    }
}
