//! Repository for the `queue_jobs` table.
//!
//! Jobs are claimed with a lease (`locked_until`). An `active` job whose
//! lease has run out is claimable again, so a crashed worker never strands
//! work.

use std::time::Duration;

use neurovid_core::queue::{JobOptions, JobPayload, LEASE_EXHAUSTED};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::job::{JobState, QueueCounts, QueuedJob};

/// Column list for `queue_jobs` queries.
const COLUMNS: &str = "\
    id, kind, payload, state, attempts_made, max_attempts, \
    backoff_kind, backoff_delay_ms, run_at, locked_until, last_error, \
    created_at, updated_at, finished_at";

/// Provides durable queue operations.
pub struct JobRepo;

impl JobRepo {
    /// Add a job that is runnable immediately.
    pub async fn enqueue(
        pool: &PgPool,
        kind: &str,
        payload: &JobPayload,
        options: &JobOptions,
    ) -> Result<QueuedJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO queue_jobs (kind, payload, state, max_attempts, backoff_kind, backoff_delay_ms) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueuedJob>(&query)
            .bind(kind)
            .bind(Json(payload))
            .bind(JobState::Waiting.as_str())
            .bind(options.attempts)
            .bind(options.backoff.kind.as_str())
            .bind(options.backoff.delay)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the oldest due job of `kind`.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers never
    /// receive the same job. Each claim counts as one attempt. An expired
    /// lease is only redelivered while attempts remain; otherwise the job is
    /// held first.
    pub async fn claim_next(
        pool: &PgPool,
        kind: &str,
        lease: Duration,
    ) -> Result<Option<QueuedJob>, sqlx::Error> {
        Self::hold_exhausted_leases(pool, kind).await?;

        let query = format!(
            "UPDATE queue_jobs \
             SET state = $2, attempts_made = attempts_made + 1, \
                 locked_until = NOW() + make_interval(secs => $3), \
                 updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM queue_jobs \
                 WHERE kind = $1 \
                   AND ((state = $4 AND run_at <= NOW()) \
                        OR (state = $2 AND locked_until < NOW() \
                            AND attempts_made < max_attempts)) \
                 ORDER BY run_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueuedJob>(&query)
            .bind(kind)
            .bind(JobState::Active.as_str())
            .bind(lease.as_secs_f64())
            .bind(JobState::Waiting.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Hold active jobs whose lease ran out on their final attempt.
    /// Returns the number of jobs held.
    pub async fn hold_exhausted_leases(pool: &PgPool, kind: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE queue_jobs \
             SET state = $2, locked_until = NULL, last_error = $4, \
                 finished_at = NOW(), updated_at = NOW() \
             WHERE kind = $1 AND state = $3 \
               AND locked_until < NOW() AND attempts_made >= max_attempts",
        )
        .bind(kind)
        .bind(JobState::Held.as_str())
        .bind(JobState::Active.as_str())
        .bind(LEASE_EXHAUSTED)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Remove a successfully finished job.
    pub async fn complete(pool: &PgPool, job_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM queue_jobs WHERE id = $1")
            .bind(job_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Return a failed job to `waiting`, runnable again after `delay`.
    pub async fn retry_later(
        pool: &PgPool,
        job_id: i64,
        delay: Duration,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE queue_jobs \
             SET state = $2, run_at = NOW() + make_interval(secs => $3), \
                 locked_until = NULL, last_error = $4, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(JobState::Waiting.as_str())
        .bind(delay.as_secs_f64())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Park a job that will not be retried. Held rows are kept for inspection.
    pub async fn hold(pool: &PgPool, job_id: i64, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE queue_jobs \
             SET state = $2, locked_until = NULL, last_error = $3, \
                 finished_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(JobState::Held.as_str())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(pool: &PgPool, job_id: i64) -> Result<Option<QueuedJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM queue_jobs WHERE id = $1");
        sqlx::query_as::<_, QueuedJob>(&query)
            .bind(job_id)
            .fetch_optional(pool)
            .await
    }

    /// Count jobs of `kind` per state.
    pub async fn counts(pool: &PgPool, kind: &str) -> Result<QueueCounts, sqlx::Error> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT state, COUNT(*) FROM queue_jobs WHERE kind = $1 GROUP BY state",
        )
        .bind(kind)
        .fetch_all(pool)
        .await?;

        let mut counts = QueueCounts::default();
        for (state, n) in rows {
            match JobState::try_from(state) {
                Ok(JobState::Waiting) => counts.waiting = n,
                Ok(JobState::Active) => counts.active = n,
                Ok(JobState::Held) => counts.held = n,
                Err(_) => {}
            }
        }
        Ok(counts)
    }
}
