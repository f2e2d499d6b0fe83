use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use neurovid_core::queue::GENERATION_JOB_KIND;
use neurovid_db::models::job::QueueCounts;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable. Always true without a database.
    pub db_healthy: bool,
    /// Generation queue depth, absent when the queue cannot be read.
    pub queue: Option<QueueCounts>,
}

/// GET /health -- 200 when healthy, 503 when degraded.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_healthy = match &state.pool {
        Some(pool) => neurovid_db::health_check(pool).await.is_ok(),
        None => true,
    };

    let queue = match state.queue.counts(GENERATION_JOB_KIND).await {
        Ok(counts) => Some(counts),
        Err(e) => {
            tracing::warn!(error = %e, "Queue counts unavailable");
            None
        }
    };

    let healthy = db_healthy && queue.is_some();
    let (code, status) = if healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            db_healthy,
            queue,
        }),
    )
}

/// Mount health check routes (root level, not under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
