//! Generation history handler.

use crate::{api::ApiError, AppState};
use axum::extract::{Extension, Json, Query};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use voxgate_db::list_recent_generations;

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

/// Handler for `GET /api/history`.
///
/// Returns the most recent generations, newest first. Responds `404` when
/// history is disabled.
pub async fn list_history_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let pool = state
        .history
        .clone()
        .ok_or_else(|| ApiError::NotFound("generation history is disabled".to_string()))?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    let generations = tokio::task::spawn_blocking(move || {
        let conn = pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db connection failed: {}", e)))?;
        list_recent_generations(&conn, limit)
            .map_err(|e| ApiError::InternalServerError(format!("failed to load history: {}", e)))
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task join error: {}", e)))??;

    Ok(Json(json!({ "generations": generations })))
}
