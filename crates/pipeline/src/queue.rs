//! Durable job-queue seam.
//!
//! Delivery is at-least-once: a job whose worker dies mid-run becomes
//! claimable again once its lease expires.

use std::time::Duration;

use async_trait::async_trait;
use neurovid_core::queue::{JobOptions, JobPayload};
use neurovid_db::models::job::{QueueCounts, QueuedJob};
use neurovid_db::repositories::JobRepo;
use neurovid_db::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for QueueError {
    fn from(e: sqlx::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

/// Returned by a successful enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobHandle {
    pub id: i64,
}

/// A job handed to a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedJob {
    pub id: i64,
    pub payload: JobPayload,
    /// Attempts including the current one.
    pub attempts_made: i32,
    pub options: JobOptions,
}

impl ClaimedJob {
    pub fn attempts_left(&self) -> bool {
        self.attempts_made < self.options.attempts
    }
}

impl From<QueuedJob> for ClaimedJob {
    fn from(job: QueuedJob) -> Self {
        let options = job.options();
        Self {
            id: job.id,
            payload: job.payload.0,
            attempts_made: job.attempts_made,
            options,
        }
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(
        &self,
        kind: &str,
        payload: JobPayload,
        options: JobOptions,
    ) -> Result<JobHandle, QueueError>;

    /// Claim the next due job of `kind`, leasing it for `lease`.
    async fn claim(&self, kind: &str, lease: Duration) -> Result<Option<ClaimedJob>, QueueError>;

    async fn complete(&self, job_id: i64) -> Result<(), QueueError>;

    /// Release a failed job to run again after `delay`.
    async fn retry_later(&self, job_id: i64, delay: Duration, error: &str) -> Result<(), QueueError>;

    /// Stop retrying a job and keep it for inspection.
    async fn hold(&self, job_id: i64, error: &str) -> Result<(), QueueError>;

    async fn counts(&self, kind: &str) -> Result<QueueCounts, QueueError>;
}

/// [`JobQueue`] backed by the `queue_jobs` table.
#[derive(Clone)]
pub struct PgJobQueue {
    pool: DbPool,
}

impl PgJobQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(
        &self,
        kind: &str,
        payload: JobPayload,
        options: JobOptions,
    ) -> Result<JobHandle, QueueError> {
        let job = JobRepo::enqueue(&self.pool, kind, &payload, &options).await?;
        Ok(JobHandle { id: job.id })
    }

    async fn claim(&self, kind: &str, lease: Duration) -> Result<Option<ClaimedJob>, QueueError> {
        let job = JobRepo::claim_next(&self.pool, kind, lease).await?;
        Ok(job.map(ClaimedJob::from))
    }

    async fn complete(&self, job_id: i64) -> Result<(), QueueError> {
        Ok(JobRepo::complete(&self.pool, job_id).await?)
    }

    async fn retry_later(&self, job_id: i64, delay: Duration, error: &str) -> Result<(), QueueError> {
        Ok(JobRepo::retry_later(&self.pool, job_id, delay, error).await?)
    }

    async fn hold(&self, job_id: i64, error: &str) -> Result<(), QueueError> {
        Ok(JobRepo::hold(&self.pool, job_id, error).await?)
    }

    async fn counts(&self, kind: &str) -> Result<QueueCounts, QueueError> {
        Ok(JobRepo::counts(&self.pool, kind).await?)
    }
}

#[cfg(test)]
mod tests {
    use neurovid_core::queue::DEFAULT_ATTEMPTS;
    use neurovid_core::types::new_session_id;

    use super::*;

    fn claimed(attempts_made: i32) -> ClaimedJob {
        ClaimedJob {
            id: 1,
            payload: JobPayload {
                session_id: new_session_id(),
            },
            attempts_made,
            options: JobOptions::default(),
        }
    }

    #[test]
    fn attempts_left_until_limit_reached() {
        assert!(claimed(1).attempts_left());
        assert!(claimed(DEFAULT_ATTEMPTS - 1).attempts_left());
        assert!(!claimed(DEFAULT_ATTEMPTS).attempts_left());
    }
}
