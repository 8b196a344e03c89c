// ABOUTME: Profile routes: read and replace the user's attributes and memory sentences.
// ABOUTME: The profile is serialized flat, with memories under "memorias_resumidas".

use super::{ok, ApiJson};
use crate::error::ApiError;
use crate::server::SharedState;
use axum::{extract::State, routing::{get, post}, Json, Router};
use parley_core::profile::UserProfile;
use serde::Deserialize;
use serde_json::{Map, Value};

const MEMORIES_KEY: &str = "memorias_resumidas";

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/user_info", get(get_user_info).post(update_user_info))
        .route("/user_memory/delete", post(delete_memory))
        .route("/user_memory/delete_all", post(delete_all_memories))
}

#[derive(Debug, Deserialize)]
struct DeleteMemoryRequest {
    #[serde(default)]
    idx: Value,
}

async fn get_user_info(State(state): State<SharedState>) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(state.stores.profiles.get(state.dispatcher.user_id())?))
}

/// Attributes are replaced wholesale; memories only when the key is present
async fn update_user_info(
    State(state): State<SharedState>,
    ApiJson(mut body): ApiJson<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    let user_id = state.dispatcher.user_id();
    let memories = body.remove(MEMORIES_KEY);

    state.stores.profiles.replace_attributes(user_id, &body)?;
    match memories {
        Some(Value::Array(items)) => state.stores.profiles.replace_memories(user_id, &items)?,
        Some(Value::Null) | None => {}
        Some(_) => return Err(ApiError::bad_request("memorias_resumidas deve ser uma lista")),
    }
    tracing::info!(user_id, attributes = body.len(), "Profile replaced");
    Ok(ok())
}

async fn delete_memory(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<DeleteMemoryRequest>,
) -> Result<Json<Value>, ApiError> {
    let idx = memory_index(&request.idx).ok_or_else(|| ApiError::bad_request("Índice inválido"))?;
    state
        .stores
        .profiles
        .delete_memory(state.dispatcher.user_id(), idx)?;
    Ok(ok())
}

async fn delete_all_memories(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    state
        .stores
        .profiles
        .clear_memories(state.dispatcher.user_id())?;
    Ok(ok())
}

/// Accepts `3` as well as `"3"`
fn memory_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_index() {
        assert_eq!(memory_index(&json!(2)), Some(2));
        assert_eq!(memory_index(&json!(" 4 ")), Some(4));
        assert_eq!(memory_index(&json!(-1)), None);
        assert_eq!(memory_index(&json!("dois")), None);
        assert_eq!(memory_index(&Value::Null), None);
    }
}
