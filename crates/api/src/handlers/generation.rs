//! Handlers for the `/generate` resource.
//!
//! Everything except the status poll requires authentication via [`AuthUser`].

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use neurovid_core::error::CoreError;
use neurovid_core::submission::SubmitGeneration;
use neurovid_core::types::SessionId;
use neurovid_db::models::generation::{Generation, GenerationStatusView, RecentGeneration};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a path session id. Anything that is not a UUID cannot name a
/// record, so it is reported the same way as an unknown id.
fn parse_session_id(raw: &str) -> AppResult<SessionId> {
    raw.parse().map_err(|_| {
        AppError::Core(CoreError::NotFound {
            entity: "Generation",
            id: raw.to_string(),
        })
    })
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// Response body of a successful submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub session_id: SessionId,
    pub limit: i64,
    pub used: i64,
    pub remaining: i64,
}

/// POST /api/generate/submitGeneration
///
/// Creates the record and returns 201 before the job is enqueued.
pub async fn submit_generation(
    auth: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<SubmitGeneration>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = body.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let receipt = state.intake.submit(&auth.principal_id, input).await?;

    tracing::info!(
        session_id = %receipt.session_id,
        principal_id = %auth.principal_id,
        remaining = receipt.quota.remaining,
        "Generation submitted",
    );

    // The enqueue task runs detached; its outcome is logged by the intake service.
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            success: true,
            session_id: receipt.session_id,
            limit: receipt.quota.limit,
            used: receipt.quota.used,
            remaining: receipt.quota.remaining,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/generate/status/{sessionId}
///
/// Polling endpoint. Not ownership-checked.
pub async fn get_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<GenerationStatusView>> {
    let session_id = parse_session_id(&session_id)?;
    let view = state.status.status(session_id).await?;
    Ok(Json(view))
}

/// GET /api/generate/session/{sessionId}
pub async fn get_session(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<Generation>> {
    let session_id = parse_session_id(&session_id)?;
    let generation = state.status.session(&auth.principal_id, session_id).await?;
    Ok(Json(generation))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

/// GET /api/generate/recent?limit=N
///
/// Newest first; `limit` defaults to 3 and is capped at 10.
pub async fn get_recent(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> AppResult<Json<Vec<RecentGeneration>>> {
    let rows = state.status.recent(&auth.principal_id, query.limit).await?;
    Ok(Json(rows))
}

/// GET /api/generate/getGeneration
///
/// The caller's newest generation, or 404 if they have none.
pub async fn get_latest(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Generation>> {
    let generation = state.status.latest(&auth.principal_id).await?;
    Ok(Json(generation))
}
