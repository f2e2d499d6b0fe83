use neurovid_core::error::CoreError;
use neurovid_core::generation::GenerationStatus;
use neurovid_core::types::SessionId;

use crate::store::StoreError;

/// Failures surfaced by the request-side services (intake and status).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures raised while processing one generation job.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The job points at a record that does not exist. Retrying cannot help.
    #[error("Generation not found for session: {0}")]
    RecordNotFound(SessionId),

    /// The record's current status does not accept the requested move, for
    /// example because another delivery already completed it.
    #[error("Generation {session_id} refused {from} -> {to}")]
    TransitionRejected {
        session_id: SessionId,
        from: GenerationStatus,
        to: GenerationStatus,
    },

    #[error("Script generation failed: {0}")]
    ScriptGenerationFailed(String),

    #[error("Quiz generation failed: {0}")]
    QuizGenerationFailed(String),

    #[error("Empty script content for video generation")]
    EmptyScriptContent,

    #[error("Video generation failed: {0}")]
    VideoGenerationFailed(String),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Whether the queue should schedule another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::RecordNotFound(_) | Self::TransitionRejected { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use neurovid_core::types::new_session_id;

    use super::*;

    #[test]
    fn missing_record_and_refused_transition_are_fatal() {
        assert!(!PipelineError::RecordNotFound(new_session_id()).is_retryable());
        assert!(!PipelineError::TransitionRejected {
            session_id: new_session_id(),
            from: GenerationStatus::Completed,
            to: GenerationStatus::GeneratingScript,
        }
        .is_retryable());
        assert!(PipelineError::ScriptGenerationFailed("x".into()).is_retryable());
        assert!(PipelineError::QuizGenerationFailed("x".into()).is_retryable());
        assert!(PipelineError::EmptyScriptContent.is_retryable());
        assert!(PipelineError::VideoGenerationFailed("x".into()).is_retryable());
        assert!(PipelineError::Store(StoreError::Unavailable("down".into())).is_retryable());
    }
}
