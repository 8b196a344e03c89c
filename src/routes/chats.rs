// ABOUTME: Chat lifecycle routes: list, create, read, delete, rename, send and cancel.
// ABOUTME: Sending delegates to the dispatcher; everything else talks to the conversation store.

use super::{ok, ApiJson};
use crate::error::ApiError;
use crate::server::SharedState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use parley_core::{ChatSummary, ConversationBlock, SendResult};
use serde::Deserialize;
use serde_json::Value;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/chats", get(list_chats))
        .route("/chat", post(create_chat))
        .route("/chat/{id}", get(get_chat).delete(delete_chat))
        .route("/chat/{id}/rename", post(rename_chat))
        .route("/chat/{id}/send", post(send_message))
        .route("/chat/{id}/cancel", post(cancel_chat))
}

#[derive(Debug, Deserialize)]
struct RenameRequest {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct SendRequest {
    #[serde(default)]
    message: String,
}

async fn list_chats(State(state): State<SharedState>) -> Result<Json<Vec<ChatSummary>>, ApiError> {
    Ok(Json(state.stores.conversations.list_chats()?))
}

async fn create_chat(State(state): State<SharedState>) -> Result<Json<ChatSummary>, ApiError> {
    let chat = state.stores.conversations.create_chat()?;
    tracing::info!(chat_id = %chat.id, "Chat created");
    Ok(Json(chat))
}

async fn get_chat(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ConversationBlock>>, ApiError> {
    Ok(Json(state.stores.conversations.get_blocks(&id)?))
}

async fn delete_chat(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.stores.conversations.delete_chat(&id)?;
    tracing::info!(chat_id = %id, "Chat deleted");
    Ok(ok())
}

async fn rename_chat(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<RenameRequest>,
) -> Result<Json<Value>, ApiError> {
    let name = state.stores.conversations.rename_chat(&id, &request.name)?;
    tracing::info!(chat_id = %id, name = %name, "Chat renamed");
    Ok(ok())
}

async fn send_message(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<SendRequest>,
) -> Result<Json<SendResult>, ApiError> {
    Ok(Json(state.dispatcher.send(&id, &request.message).await?))
}

async fn cancel_chat(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.dispatcher.cancel(&id)?;
    Ok(ok())
}
