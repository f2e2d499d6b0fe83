use crate::submission::QuotaSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The caller has not completed a required prior flow (the style survey).
    #[error("Prerequisite missing: {0}")]
    PrerequisiteMissing(String),

    #[error("Quota exceeded: {} of {} used", .0.used, .0.limit)]
    QuotaExceeded(QuotaSnapshot),

    #[error("Internal error: {0}")]
    Internal(String),
}
