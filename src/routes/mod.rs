// ABOUTME: HTTP route groups and the extractors they share.
// ABOUTME: Extraction failures are reported with the same JSON error body as handler errors.

pub mod chats;
pub mod feedback;
pub mod files;
pub mod profile;
pub mod settings;
pub mod websearch;

use crate::error::ApiError;
use axum::extract::FromRequest;
use axum::extract::FromRequestParts;
use axum::Json;
use serde_json::{json, Value};

/// `axum::Json` with a JSON error body on rejection
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` with a JSON error body on rejection
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// `{"ok": true}`
pub fn ok() -> Json<Value> {
    Json(json!({ "ok": true }))
}
