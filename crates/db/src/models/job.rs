//! Queue job models for the durable generation queue.

use neurovid_core::queue::{Backoff, BackoffKind, JobOptions, JobPayload};
use neurovid_core::types::Timestamp;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

/// Lifecycle of a queue row. Completed jobs are deleted rather than kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Ready to run once `run_at` has passed.
    Waiting,
    /// Claimed by a worker until `locked_until`.
    Active,
    /// Attempts exhausted or failed fatally; kept for operator inspection.
    Held,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Held => "held",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown job state '{0}'")]
pub struct UnknownJobState(String);

impl TryFrom<String> for JobState {
    type Error = UnknownJobState;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "held" => Ok(Self::Held),
            _ => Err(UnknownJobState(value)),
        }
    }
}

/// A row from the `queue_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueuedJob {
    pub id: i64,
    pub kind: String,
    pub payload: Json<JobPayload>,
    #[sqlx(try_from = "String")]
    pub state: JobState,
    pub attempts_made: i32,
    pub max_attempts: i32,
    pub backoff_kind: String,
    pub backoff_delay_ms: i64,
    pub run_at: Timestamp,
    pub locked_until: Option<Timestamp>,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl QueuedJob {
    /// Options as given at enqueue time. Unknown backoff kinds fall back to
    /// exponential.
    pub fn options(&self) -> JobOptions {
        JobOptions {
            attempts: self.max_attempts,
            backoff: Backoff {
                kind: BackoffKind::parse(&self.backoff_kind).unwrap_or(BackoffKind::Exponential),
                delay: self.backoff_delay_ms,
            },
        }
    }
}

/// Per-state job counts for health reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub waiting: i64,
    pub active: i64,
    pub held: i64,
}
