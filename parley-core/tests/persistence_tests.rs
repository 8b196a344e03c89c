// ABOUTME: Reopening the stores from disk gives back exactly what was saved.
// ABOUTME: Covers chats, profiles, settings and feedback plus an interrupted write.

use parley_core::feedback::{FeedbackEntry, Verdict};
use parley_core::store::{load_json, PendingWrite};
use parley_core::Stores;
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;

fn open(dir: &TempDir) -> Stores {
    Stores::open_at(&dir.path().join("data"), &dir.path().join("uploads"), 20).unwrap()
}

fn feedback(verdict: Verdict, comment: &str) -> FeedbackEntry {
    FeedbackEntry {
        user_id: "default_user".to_string(),
        topic: "culinária".to_string(),
        verdict,
        comment: comment.to_string(),
        user_message: "Como faço pão?".to_string(),
        ai_response: "Farinha, água, sal e fermento.".to_string(),
    }
}

#[test]
fn test_all_documents_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let (chat_id, chats, profile, settings, log) = {
        let stores = open(&dir);

        let chat = stores.conversations.create_chat().unwrap();
        let idx = stores
            .conversations
            .append_pending_block(&chat.id, "Olá &amp; adeus")
            .unwrap();
        stores
            .conversations
            .finalize_block(&chat.id, idx, 0, "Até já!")
            .unwrap();
        stores.conversations.append_pending_block(&chat.id, "Ainda à espera").unwrap();
        stores.conversations.rename_chat(&chat.id, "Despedidas").unwrap();

        let mut attributes = serde_json::Map::new();
        attributes.insert("nome".to_string(), json!("Ana"));
        attributes.insert("idade".to_string(), json!(31));
        stores.profiles.replace_attributes("default_user", &attributes).unwrap();
        stores.profiles.add_memory("default_user", "O utilizador faz pão.").unwrap();

        let mut settings = stores.settings.get().unwrap();
        settings.theme = "light".to_string();
        settings.memory.reference_chat_history = true;
        settings.extra.insert("font_size".to_string(), json!(14));
        stores.settings.replace(settings).unwrap();

        stores.feedback.submit(feedback(Verdict::Positivo, "")).unwrap();

        (
            chat.id.clone(),
            stores.conversations.get_chat(&chat.id).unwrap(),
            stores.profiles.get("default_user").unwrap(),
            stores.settings.get().unwrap(),
            stores.feedback.log().unwrap(),
        )
    };

    let reopened = open(&dir);
    assert_eq!(reopened.conversations.get_chat(&chat_id).unwrap(), chats);
    assert_eq!(reopened.profiles.get("default_user").unwrap(), profile);
    assert_eq!(reopened.settings.get().unwrap(), settings);
    assert_eq!(reopened.feedback.log().unwrap(), log);

    assert_eq!(profile.attributes["idade"], "31");
    assert!(!chats.conversation_blocks[1].is_complete());
}

#[test]
fn test_feedback_resubmission_updates_in_place_across_reopen() {
    let dir = TempDir::new().unwrap();
    open(&dir)
        .feedback
        .submit(feedback(Verdict::Positivo, ""))
        .unwrap();

    let stores = open(&dir);
    stores
        .feedback
        .submit(feedback(Verdict::Negativo, "faltou o tempo de forno"))
        .unwrap();

    let records = &stores.feedback.log().unwrap()["default_user"]["culinária"];
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].feedback, Verdict::Negativo);
    assert_eq!(records[0].comentario, "faltou o tempo de forno");

    let stats = stores.feedback.stats().unwrap();
    assert_eq!(stats["culinária"].positivo, 0);
    assert_eq!(stats["culinária"].negativo, 1);
}

#[test]
fn test_interrupted_write_keeps_previous_chat() {
    let dir = TempDir::new().unwrap();
    let stores = open(&dir);
    let chat = stores.conversations.create_chat().unwrap();
    let path: PathBuf = dir
        .path()
        .join("data/chats")
        .join(format!("{}.json", chat.id));
    let before: serde_json::Value = load_json(&path, json!(null));

    let pending = PendingWrite::prepare(&path, &json!({"name": "meio escrito"})).unwrap();
    drop(pending);

    let after: serde_json::Value = load_json(&path, json!(null));
    assert_eq!(before, after);
    assert_eq!(after["name"], "Novo Chat");

    let leftovers = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter(|e| e.as_ref().unwrap().path() != path)
        .count();
    assert_eq!(leftovers, 0);
}
