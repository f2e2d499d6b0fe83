use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use neurovid_core::error::CoreError;
use neurovid_pipeline::{ServiceError, StoreError};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and the storage errors that can
/// surface from a request. Every variant renders as
/// `{ "error": message, "code": CODE }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Malformed request body.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Core(core) => AppError::Core(core),
            ServiceError::Store(store) => AppError::Store(store),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, .. } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::PrerequisiteMissing(msg) => (
                    StatusCode::FORBIDDEN,
                    "PREREQUISITE_MISSING",
                    msg.clone(),
                ),
                CoreError::QuotaExceeded(quota) => {
                    let body = json!({
                        "error": "Free trial limit reached",
                        "code": "QUOTA_EXCEEDED",
                        "limit": quota.limit,
                        "used": quota.used,
                        "remaining": quota.remaining,
                    });
                    return (StatusCode::TOO_MANY_REQUESTS, axum::Json(body)).into_response();
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            // --- Storage ---
            AppError::Store(err) => {
                tracing::error!(error = %err, "Store error");
                internal()
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use neurovid_core::submission::QuotaSnapshot;

    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn quota_exceeded_carries_usage() {
        let (status, body) =
            render(CoreError::QuotaExceeded(QuotaSnapshot::new(3, 3)).into()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "QUOTA_EXCEEDED");
        assert_eq!(body["limit"], 3);
        assert_eq!(body["used"], 3);
        assert_eq!(body["remaining"], 0);
    }

    #[tokio::test]
    async fn prerequisite_missing_is_forbidden() {
        let (status, body) =
            render(CoreError::PrerequisiteMissing("survey".into()).into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "PREREQUISITE_MISSING");
    }

    #[tokio::test]
    async fn store_errors_are_sanitized() {
        let (status, body) =
            render(StoreError::Unavailable("connection refused on 10.0.0.4".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "An internal error occurred");
    }

    #[tokio::test]
    async fn service_errors_keep_their_kind() {
        let err: AppError = ServiceError::Core(CoreError::Validation("topic is required".into())).into();
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "topic is required");
    }
}
