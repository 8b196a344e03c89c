// ABOUTME: Thumbs up/down feedback on AI replies, grouped by user and topic.
// ABOUTME: One record per (message, reply) pair; resubmitting updates it in place.

use crate::error::{CoreError, CoreResult};
use crate::store::JsonDocument;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_TOPIC: &str = "geral";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Positivo,
    Negativo,
}

impl std::str::FromStr for Verdict {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positivo" => Ok(Verdict::Positivo),
            "negativo" => Ok(Verdict::Negativo),
            other => Err(CoreError::invalid(format!("Feedback inválido: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub mensagem_usuario: String,
    pub resposta_ai: String,
    pub feedback: Verdict,
    #[serde(default)]
    pub comentario: String,
    /// Local time, `%Y-%m-%d %H:%M:%S`
    pub timestamp: String,
}

/// user id -> topic -> records
pub type FeedbackLog = BTreeMap<String, BTreeMap<String, Vec<FeedbackRecord>>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStats {
    pub positivo: u64,
    pub negativo: u64,
}

/// A submission as received from a client
#[derive(Debug, Clone)]
pub struct FeedbackEntry {
    pub user_id: String,
    pub topic: String,
    pub verdict: Verdict,
    pub comment: String,
    pub user_message: String,
    pub ai_response: String,
}

pub struct FeedbackStore {
    document: JsonDocument<FeedbackLog>,
}

impl FeedbackStore {
    pub fn open(data_dir: &Path) -> Self {
        Self {
            document: JsonDocument::open(data_dir.join("feedback.json"), FeedbackLog::new()),
        }
    }

    /// Insert or update the record for this exact message/reply pair
    pub fn submit(&self, entry: FeedbackEntry) -> CoreResult<()> {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.document.update(|log| {
            let records = log
                .entry(entry.user_id)
                .or_default()
                .entry(entry.topic)
                .or_default();
            let existing = records.iter_mut().find(|r| {
                r.mensagem_usuario == entry.user_message && r.resposta_ai == entry.ai_response
            });
            match existing {
                Some(record) => {
                    record.feedback = entry.verdict;
                    record.comentario = entry.comment;
                    record.timestamp = timestamp;
                }
                None => records.push(FeedbackRecord {
                    mensagem_usuario: entry.user_message,
                    resposta_ai: entry.ai_response,
                    feedback: entry.verdict,
                    comentario: entry.comment,
                    timestamp,
                }),
            }
        })?;
        Ok(())
    }

    /// Positive and negative counts per topic, across all users
    pub fn stats(&self) -> Result<BTreeMap<String, TopicStats>> {
        let log = self.document.get()?;
        let mut stats: BTreeMap<String, TopicStats> = BTreeMap::new();
        for topics in log.values() {
            for (topic, records) in topics {
                let entry = stats.entry(topic.clone()).or_default();
                for record in records {
                    match record.feedback {
                        Verdict::Positivo => entry.positivo += 1,
                        Verdict::Negativo => entry.negativo += 1,
                    }
                }
            }
        }
        Ok(stats)
    }

    pub fn log(&self) -> Result<FeedbackLog> {
        self.document.get()
    }

    pub fn flush(&self) -> Result<()> {
        self.document.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(topic: &str, verdict: Verdict, message: &str, comment: &str) -> FeedbackEntry {
        FeedbackEntry {
            user_id: "default_user".to_string(),
            topic: topic.to_string(),
            verdict,
            comment: comment.to_string(),
            user_message: message.to_string(),
            ai_response: format!("reply to {}", message),
        }
    }

    #[test]
    fn test_verdict_parsing() {
        assert_eq!("positivo".parse::<Verdict>().unwrap(), Verdict::Positivo);
        assert_eq!("negativo".parse::<Verdict>().unwrap(), Verdict::Negativo);
        assert!(matches!(
            "meh".parse::<Verdict>(),
            Err(CoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_resubmission_updates_in_place() {
        let dir = TempDir::new().unwrap();
        let store = FeedbackStore::open(dir.path());
        store.submit(entry("geral", Verdict::Positivo, "olá", "")).unwrap();
        store
            .submit(entry("geral", Verdict::Negativo, "olá", "afinal não"))
            .unwrap();

        let log = store.log().unwrap();
        let records = &log["default_user"]["geral"];
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].feedback, Verdict::Negativo);
        assert_eq!(records[0].comentario, "afinal não");
        assert_eq!(records[0].timestamp.len(), "2024-01-01 00:00:00".len());
    }

    #[test]
    fn test_stats_group_by_topic() {
        let dir = TempDir::new().unwrap();
        let store = FeedbackStore::open(dir.path());
        store.submit(entry("geral", Verdict::Positivo, "a", "")).unwrap();
        store.submit(entry("geral", Verdict::Positivo, "b", "")).unwrap();
        store.submit(entry("geral", Verdict::Negativo, "c", "")).unwrap();
        store.submit(entry("codigo", Verdict::Negativo, "d", "")).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats["geral"], TopicStats { positivo: 2, negativo: 1 });
        assert_eq!(stats["codigo"], TopicStats { positivo: 0, negativo: 1 });
    }

    #[test]
    fn test_feedback_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FeedbackStore::open(dir.path());
            store.submit(entry("geral", Verdict::Positivo, "a", "bom")).unwrap();
        }
        assert!(dir.path().join("feedback.json").exists());
        let store = FeedbackStore::open(dir.path());
        assert_eq!(store.stats().unwrap()["geral"].positivo, 1);
    }
}
