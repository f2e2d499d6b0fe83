//! Record-store seams used by intake, the worker and the status service.

use async_trait::async_trait;
use neurovid_core::types::SessionId;
use neurovid_db::models::generation::{CreateGeneration, Generation, StageUpdate};
use neurovid_db::models::survey::{CreateSurvey, Survey};
use neurovid_db::repositories::{CreateOutcome, GenerationRepo, SurveyRepo};
use neurovid_db::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Durable state of generation requests.
#[async_trait]
pub trait GenerationStore: Send + Sync {
    /// Insert a `CREATED` record unless the owner has used `limit` requests.
    async fn create_within_quota(
        &self,
        input: CreateGeneration,
        limit: i64,
    ) -> Result<CreateOutcome, StoreError>;

    async fn find(&self, session_id: SessionId) -> Result<Option<Generation>, StoreError>;

    /// Newest first, at most `limit` rows.
    async fn list_recent(&self, owner_id: &str, limit: i64) -> Result<Vec<Generation>, StoreError>;

    async fn find_latest(&self, owner_id: &str) -> Result<Option<Generation>, StoreError>;

    /// `CREATED` -> `QUEUED`. Returns `false` if the record had already moved on.
    async fn mark_queued(&self, session_id: SessionId) -> Result<bool, StoreError>;

    /// Apply a stage update. Returns `false` if the record does not exist or
    /// its current status may not move to `update.status`.
    async fn apply_stage(
        &self,
        session_id: SessionId,
        update: StageUpdate,
    ) -> Result<bool, StoreError>;
}

/// Completed style surveys, one per principal.
#[async_trait]
pub trait SurveyStore: Send + Sync {
    async fn find_by_owner(&self, owner_id: &str) -> Result<Option<Survey>, StoreError>;

    /// Returns `None` if the owner already completed the survey.
    async fn create(&self, input: CreateSurvey) -> Result<Option<Survey>, StoreError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgGenerationStore {
    pool: DbPool,
}

impl PgGenerationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GenerationStore for PgGenerationStore {
    async fn create_within_quota(
        &self,
        input: CreateGeneration,
        limit: i64,
    ) -> Result<CreateOutcome, StoreError> {
        Ok(GenerationRepo::create_within_quota(&self.pool, &input, limit).await?)
    }

    async fn find(&self, session_id: SessionId) -> Result<Option<Generation>, StoreError> {
        Ok(GenerationRepo::find_by_session(&self.pool, session_id).await?)
    }

    async fn list_recent(&self, owner_id: &str, limit: i64) -> Result<Vec<Generation>, StoreError> {
        Ok(GenerationRepo::list_recent_by_owner(&self.pool, owner_id, limit).await?)
    }

    async fn find_latest(&self, owner_id: &str) -> Result<Option<Generation>, StoreError> {
        Ok(GenerationRepo::find_latest_by_owner(&self.pool, owner_id).await?)
    }

    async fn mark_queued(&self, session_id: SessionId) -> Result<bool, StoreError> {
        Ok(GenerationRepo::mark_queued(&self.pool, session_id).await?)
    }

    async fn apply_stage(
        &self,
        session_id: SessionId,
        update: StageUpdate,
    ) -> Result<bool, StoreError> {
        Ok(GenerationRepo::apply_stage(&self.pool, session_id, &update).await?)
    }
}

#[derive(Clone)]
pub struct PgSurveyStore {
    pool: DbPool,
}

impl PgSurveyStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SurveyStore for PgSurveyStore {
    async fn find_by_owner(&self, owner_id: &str) -> Result<Option<Survey>, StoreError> {
        Ok(SurveyRepo::find_by_owner(&self.pool, owner_id).await?)
    }

    async fn create(&self, input: CreateSurvey) -> Result<Option<Survey>, StoreError> {
        Ok(SurveyRepo::create(&self.pool, &input).await?)
    }
}
