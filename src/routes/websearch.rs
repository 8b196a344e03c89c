// ABOUTME: Web search route. Provider failures produce an empty result list.

use super::ApiJson;
use crate::error::ApiError;
use crate::server::SharedState;
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

const MIN_QUERY_CHARS: usize = 3;

pub fn router() -> Router<SharedState> {
    Router::new().route("/api/websearch", post(websearch))
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: String,
}

async fn websearch(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<SearchRequest>,
) -> Result<Json<Value>, ApiError> {
    let query = request.query.trim();
    if query.chars().count() < MIN_QUERY_CHARS {
        return Err(ApiError::bad_request("Query muito curta"));
    }

    let max_results = state.config.search.max_results;
    let results = match state.search.search(query, max_results).await {
        Ok(results) => results,
        Err(e) => {
            tracing::warn!(provider = state.search.name(), error = %e, "Web search failed");
            Vec::new()
        }
    };
    tracing::info!(results = results.len(), "Web search answered");
    Ok(Json(json!({ "results": results })))
}
