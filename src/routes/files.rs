// ABOUTME: File routes: upload into a chat's folder, list it, and download as an attachment.
// ABOUTME: Only known chats have a folder; upload and listing honour the extension allow-list.

use super::ApiQuery;
use crate::error::ApiError;
use crate::server::SharedState;
use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/api/upload",
            post(upload_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/files", get(list_files))
        .route("/api/download", get(download_file))
        .route("/files/{chat_id}/{filename}", get(serve_file))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    chat_id: Option<String>,
    filename: Option<String>,
}

async fn upload_file(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut chat_id = None;
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        match field.name().map(str::to_string).as_deref() {
            Some("chat_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                chat_id = Some(text);
            }
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.body_text()))?;
                upload = Some((name, bytes));
            }
            _ => {}
        }
    }

    let chat_id = chat_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("chat_id é obrigatório"))?;
    let (name, bytes) = upload.ok_or_else(|| ApiError::bad_request("Nenhum arquivo enviado"))?;
    if name.is_empty() {
        return Err(ApiError::bad_request("Nome de arquivo vazio"));
    }
    if !state.config.files.is_allowed(&name) {
        return Err(ApiError::bad_request("Tipo de arquivo não permitido"));
    }
    require_chat(&state, &chat_id)?;

    let filename = state.stores.files.save_upload(&chat_id, &name, &bytes)?;
    Ok(Json(json!({ "ok": true, "filename": filename })))
}

async fn list_files(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let chat_id = query
        .chat_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("chat_id é obrigatório"))?;
    require_chat(&state, &chat_id)?;
    let files = state
        .stores
        .files
        .list(&chat_id, |name| state.config.files.is_allowed(name))?;
    Ok(Json(json!({ "files": files })))
}

async fn download_file(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<DownloadQuery>,
) -> Result<Response, ApiError> {
    let (Some(chat_id), Some(filename)) = (query.chat_id, query.filename) else {
        return Err(ApiError::bad_request("chat_id e filename são obrigatórios"));
    };
    require_chat(&state, &chat_id)?;
    attachment(state.stores.files.resolve(&chat_id, &filename)?).await
}

async fn serve_file(
    State(state): State<SharedState>,
    Path((chat_id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    require_chat(&state, &chat_id)?;
    attachment(state.stores.files.resolve(&chat_id, &filename)?).await
}

/// 404 unless `chat_id` names a stored chat
fn require_chat(state: &SharedState, chat_id: &str) -> Result<(), ApiError> {
    state.stores.conversations.get_chat(chat_id)?;
    Ok(())
}

async fn attachment(path: PathBuf) -> Result<Response, ApiError> {
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("download");
    let content_type = mime_guess::from_path(&path).first_or_octet_stream();

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}
