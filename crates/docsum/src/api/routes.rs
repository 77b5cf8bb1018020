//! HTTP handlers.
//!
//! Thin translation between JSON payloads and the queue/result store.
//! All handlers require an [`AuthUser`]; ownership scoping happens in
//! the repository queries, so a foreign record is indistinguishable
//! from an absent one.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::summary_repo::{self, SummaryRow};
use crate::queue::{JobPayload, SUMMARIZE_TOPIC};

use super::auth::AuthUser;
use super::error::ApiError;
use super::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueJobRequest {
    pub file_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStatusQuery {
    pub file_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDto {
    pub id: String,
    pub file_url: String,
    pub summary: Option<String>,
    pub status: String,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct ListSummariesResponse {
    pub summaries: Vec<SummaryDto>,
}

impl From<SummaryRow> for SummaryDto {
    fn from(row: SummaryRow) -> Self {
        Self {
            id: row.id,
            file_url: row.file_url,
            summary: row.summary,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

/// POST /api/queue-job — accepts a document for asynchronous
/// summarization and returns as soon as it is durably queued.
pub async fn queue_job(
    State(state): State<AppState>,
    AuthUser(owner_id): AuthUser,
    Json(body): Json<QueueJobRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let file_url = body
        .file_url
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::MissingField("fileUrl"))?;

    // Placeholder row first, so a poll between this response and the
    // worker finishing sees `pending` rather than not-found.
    summary_repo::insert_pending(&state.db, file_url, &owner_id)?;

    let job_id = state.queue.enqueue(
        SUMMARIZE_TOPIC,
        &JobPayload {
            file_url: file_url.to_string(),
            owner_id,
        },
    )?;
    tracing::info!(%job_id, file_url, "Queued summarization job");

    Ok(Json(json!({ "status": "queued" })))
}

/// GET /api/summary-status?fileUrl=… — the polling endpoint.
pub async fn summary_status(
    State(state): State<AppState>,
    AuthUser(owner_id): AuthUser,
    Query(query): Query<SummaryStatusQuery>,
) -> Result<Response, ApiError> {
    let file_url = query
        .file_url
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::MissingField("fileUrl"))?;

    let response = match summary_repo::find(&state.db, file_url, &owner_id)? {
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "not_found" })),
        )
            .into_response(),
        Some(row) => Json(json!({
            "status": row.status,
            "summary": row.summary,
        }))
        .into_response(),
    };
    Ok(response)
}

/// GET /api/summaries — the caller's summaries, newest first.
pub async fn list_summaries(
    State(state): State<AppState>,
    AuthUser(owner_id): AuthUser,
) -> Result<Json<ListSummariesResponse>, ApiError> {
    let rows = summary_repo::list_for_owner(&state.db, &owner_id)?;
    Ok(Json(ListSummariesResponse {
        summaries: rows.into_iter().map(SummaryDto::from).collect(),
    }))
}

/// DELETE /api/summaries/:id — removes one of the caller's summaries.
pub async fn delete_summary(
    State(state): State<AppState>,
    AuthUser(owner_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !summary_repo::delete(&state.db, &id, &owner_id)? {
        return Err(ApiError::NotFound);
    }
    tracing::info!(summary_id = %id, "Deleted summary");
    Ok(Json(json!({ "status": "deleted" })))
}

pub async fn health() -> &'static str {
    "OK"
}
