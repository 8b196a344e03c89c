// ABOUTME: Settings routes: read the preferences document or replace it wholesale.

use super::ApiJson;
use crate::error::ApiError;
use crate::server::SharedState;
use axum::{extract::State, routing::get, Json, Router};
use parley_core::settings::Settings;
use serde_json::{json, Value};

pub fn router() -> Router<SharedState> {
    Router::new().route("/api/settings", get(get_settings).post(update_settings))
}

async fn get_settings(State(state): State<SharedState>) -> Result<Json<Settings>, ApiError> {
    Ok(Json(state.stores.settings.get()?))
}

async fn update_settings(
    State(state): State<SharedState>,
    ApiJson(settings): ApiJson<Settings>,
) -> Result<Json<Value>, ApiError> {
    state.stores.settings.replace(settings)?;
    Ok(Json(json!({ "status": "success" })))
}
