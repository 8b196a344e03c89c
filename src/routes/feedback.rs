// ABOUTME: Feedback routes: record a verdict on a reply and report per-topic counts.

use super::{ok, ApiJson};
use crate::error::ApiError;
use crate::server::SharedState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use parley_core::feedback::{FeedbackEntry, TopicStats, Verdict, DEFAULT_TOPIC};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/feedback", post(add_feedback))
        .route("/feedback/stats", get(feedback_stats))
}

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    user_id: Option<String>,
    tema: Option<String>,
    #[serde(default)]
    feedback: String,
    #[serde(default)]
    comentario: String,
    #[serde(default)]
    mensagem_usuario: String,
    #[serde(default)]
    resposta_ai: String,
}

async fn add_feedback(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<FeedbackRequest>,
) -> Result<Json<Value>, ApiError> {
    let verdict: Verdict = request.feedback.parse()?;
    let entry = FeedbackEntry {
        user_id: request
            .user_id
            .unwrap_or_else(|| state.dispatcher.user_id().to_string()),
        topic: request.tema.unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
        verdict,
        comment: request.comentario,
        user_message: request.mensagem_usuario,
        ai_response: request.resposta_ai,
    };
    tracing::info!(topic = %entry.topic, verdict = ?entry.verdict, "Feedback received");
    state.stores.feedback.submit(entry)?;
    Ok(ok())
}

async fn feedback_stats(
    State(state): State<SharedState>,
) -> Result<Json<BTreeMap<String, TopicStats>>, ApiError> {
    Ok(Json(state.stores.feedback.stats()?))
}
