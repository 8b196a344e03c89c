// ABOUTME: Derives profile attributes and memory sentences from chat messages.
// ABOUTME: Both passes ask the language model and degrade to "no update" on failure.

use super::{attribute_value, ProfileStore, MEMORIES_KEY};
use crate::llm;
use crate::prompts;
use parley_agent::{ChatBackend, RetryPolicy};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

const GREETINGS: &[&str] = &[
    "bom dia",
    "boa tarde",
    "boa noite",
    "olá",
    "ola",
    "oi",
    "tudo bem",
    "alô",
    "hello",
    "hi",
    "boa madrugada",
    "saudações",
    "salve",
    "e aí",
    "eai",
    "yo",
    "hey",
    "oiê",
    "oii",
    "oiii",
    "al",
];

/// Stretched greetings such as "oiii", "aloooo" or "eaiii"
static GREETING_SHAPES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^[a\slo]+$",
        r"^[o\si]+$",
        r"^[o\sla]+$",
        r"^[h\si]+$",
        r"^[e\sai]+$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("greeting pattern is valid"))
    .collect()
});

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("object pattern is valid"));

/// Messages too short or too formulaic to say anything about the user
pub fn is_greeting(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    lowered.chars().count() < 10
        || GREETINGS.contains(&lowered.as_str())
        || GREETING_SHAPES.iter().any(|re| re.is_match(&lowered))
}

/// Pull the outermost `{...}` out of a model answer and read it as attributes.
///
/// Returns `None` when no JSON object is present, it does not parse, or the
/// top level is not an object. Values go through [`attribute_value`].
pub fn parse_attributes(answer: &str) -> Option<BTreeMap<String, String>> {
    let candidate = JSON_OBJECT.find(answer)?.as_str();
    let parsed: serde_json::Value = match serde_json::from_str(candidate) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Attribute answer is not valid JSON");
            return None;
        }
    };
    let Some(object) = parsed.as_object() else {
        tracing::warn!("Attribute answer is not a JSON object");
        return None;
    };
    Some(
        object
            .iter()
            .filter(|(key, _)| key.as_str() != MEMORIES_KEY)
            .filter_map(|(key, value)| attribute_value(value).map(|v| (key.clone(), v)))
            .collect(),
    )
}

/// What a profile update pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub attributes_changed: bool,
    pub memory_updated: bool,
}

pub struct ProfileExtractor {
    backend: Arc<dyn ChatBackend>,
    policy: RetryPolicy,
}

impl ProfileExtractor {
    pub fn new(backend: Arc<dyn ChatBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub async fn extract_attributes(&self, user_text: &str) -> Option<BTreeMap<String, String>> {
        let prompt = prompts::attributes_prompt(user_text);
        let answer = llm::ask(
            self.backend.as_ref(),
            &self.policy,
            "extract_attributes",
            &prompt,
        )
        .await?;
        let attributes = parse_attributes(&answer);
        if attributes.is_none() {
            tracing::debug!("No attributes found in model answer");
        }
        attributes
    }

    /// One sentence about the user, or `None` for greetings and "N/A" answers.
    /// Greetings never reach the backend.
    pub async fn summarize_memory(&self, user_text: &str) -> Option<String> {
        if is_greeting(user_text) {
            return None;
        }
        let prompt = prompts::memory_prompt(user_text);
        let answer = llm::ask(self.backend.as_ref(), &self.policy, "summarize_memory", &prompt)
            .await?;
        if answer.is_empty() || answer == prompts::NO_MEMORY {
            return None;
        }
        Some(answer)
    }

    /// Run both passes concurrently and merge their results into the profile
    pub async fn update_profile(
        &self,
        store: &ProfileStore,
        user_id: &str,
        user_text: &str,
    ) -> ProfileUpdate {
        let (attributes, memory) = tokio::join!(
            self.extract_attributes(user_text),
            self.summarize_memory(user_text)
        );

        let mut update = ProfileUpdate::default();
        if let Some(attributes) = attributes {
            match store.merge_attributes(user_id, attributes) {
                Ok(changed) => update.attributes_changed = changed,
                Err(e) => tracing::warn!(user_id, error = %e, "Failed to store attributes"),
            }
        }
        if let Some(sentence) = memory {
            match store.add_memory(user_id, &sentence) {
                Ok(added) => update.memory_updated = added,
                Err(e) => tracing::warn!(user_id, error = %e, "Failed to store memory"),
            }
        }
        tracing::debug!(
            user_id,
            attributes_changed = update.attributes_changed,
            memory_updated = update.memory_updated,
            "Profile update finished"
        );
        update
    }
}
