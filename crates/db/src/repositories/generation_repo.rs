//! Repository for the `generations` table.
//!
//! Status and progress are always written together, with progress derived
//! from [`GenerationStatus::progress`], so the two never disagree.

use neurovid_core::generation::GenerationStatus;
use neurovid_core::submission::QuotaSnapshot;
use neurovid_core::types::SessionId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::generation::{CreateGeneration, Generation, StageUpdate};

/// Column list for `generations` queries.
const COLUMNS: &str = "\
    session_id, user_id, topic, details, category, language, duration, style, \
    status, progress, script, quiz, video_url, thumbnail_url, \
    created_at, updated_at";

/// Result of [`GenerationRepo::create_within_quota`].
#[derive(Debug)]
pub enum CreateOutcome {
    /// Row inserted; `quota.used` includes the new request.
    Created {
        generation: Generation,
        quota: QuotaSnapshot,
    },
    /// Nothing inserted; the principal is at or over the limit.
    QuotaExceeded(QuotaSnapshot),
}

/// Provides persistence for generation requests.
pub struct GenerationRepo;

impl GenerationRepo {
    /// Insert a new `CREATED` request if the owner is under `limit`.
    ///
    /// Quota usage counts every request that has not `FAILED`. The count and
    /// insert run in one transaction under a per-owner advisory lock so two
    /// concurrent submissions cannot both take the last slot.
    pub async fn create_within_quota(
        pool: &PgPool,
        input: &CreateGeneration,
        limit: i64,
    ) -> Result<CreateOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&input.owner_id)
            .execute(&mut *tx)
            .await?;

        let used: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM generations WHERE user_id = $1 AND status <> $2",
        )
        .bind(&input.owner_id)
        .bind(GenerationStatus::Failed.as_str())
        .fetch_one(&mut *tx)
        .await?;

        if used >= limit {
            tx.rollback().await?;
            return Ok(CreateOutcome::QuotaExceeded(QuotaSnapshot::new(limit, used)));
        }

        let query = format!(
            "INSERT INTO generations \
                 (session_id, user_id, topic, details, category, language, duration, style, \
                  status, progress) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        let generation = sqlx::query_as::<_, Generation>(&query)
            .bind(input.session_id)
            .bind(&input.owner_id)
            .bind(&input.topic)
            .bind(&input.details)
            .bind(&input.category)
            .bind(&input.language)
            .bind(input.duration_minutes)
            .bind(&input.style)
            .bind(GenerationStatus::Created.as_str())
            .bind(GenerationStatus::Created.progress())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(CreateOutcome::Created {
            generation,
            quota: QuotaSnapshot::new(limit, used + 1),
        })
    }

    pub async fn find_by_session(
        pool: &PgPool,
        session_id: SessionId,
    ) -> Result<Option<Generation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generations WHERE session_id = $1");
        sqlx::query_as::<_, Generation>(&query)
            .bind(session_id)
            .fetch_optional(pool)
            .await
    }

    /// Newest-first requests for one owner.
    pub async fn list_recent_by_owner(
        pool: &PgPool,
        owner_id: &str,
        limit: i64,
    ) -> Result<Vec<Generation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generations \
             WHERE user_id = $1 \
             ORDER BY created_at DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(owner_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    pub async fn find_latest_by_owner(
        pool: &PgPool,
        owner_id: &str,
    ) -> Result<Option<Generation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM generations \
             WHERE user_id = $1 \
             ORDER BY created_at DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, Generation>(&query)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// Advance `CREATED` to `QUEUED` once the job is confirmed enqueued.
    ///
    /// Returns `false` (and changes nothing) if the worker already moved the
    /// record on, keeping progress monotonic.
    pub async fn mark_queued(pool: &PgPool, session_id: SessionId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status = $2, progress = $3, updated_at = NOW() \
             WHERE session_id = $1 AND status = $4",
        )
        .bind(session_id)
        .bind(GenerationStatus::Queued.as_str())
        .bind(GenerationStatus::Queued.progress())
        .bind(GenerationStatus::Created.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply one worker stage update in a single statement.
    ///
    /// Outputs not present in `update` are left untouched. The write only
    /// lands if the current status may move to `update.status` (see
    /// [`GenerationStatus::can_transition_to`]). Returns `false` if no row
    /// exists for `session_id` or the transition was refused.
    pub async fn apply_stage(
        pool: &PgPool,
        session_id: SessionId,
        update: &StageUpdate,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status = $2, progress = $3, \
                 script = COALESCE($4, script), \
                 quiz = COALESCE($5, quiz), \
                 video_url = COALESCE($6, video_url), \
                 thumbnail_url = COALESCE($7, thumbnail_url), \
                 updated_at = NOW() \
             WHERE session_id = $1 AND status = ANY($8)",
        )
        .bind(session_id)
        .bind(update.status.as_str())
        .bind(update.progress())
        .bind(update.script.as_ref().map(Json))
        .bind(update.quiz.as_ref().map(Json))
        .bind(&update.video_url)
        .bind(&update.thumbnail_url)
        .bind(
            update
                .status
                .predecessors()
                .into_iter()
                .map(GenerationStatus::as_str)
                .collect::<Vec<_>>(),
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
