//! In-process implementations of the store and queue seams.
//!
//! Behaviour mirrors the PostgreSQL implementations (quota check and insert
//! are atomic, outputs are only ever overwritten, expired leases are
//! reclaimable). Queue timing uses `tokio::time` so paused-clock tests can
//! drive backoff deterministically.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use neurovid_core::generation::GenerationStatus;
use neurovid_core::queue::{JobOptions, JobPayload, LEASE_EXHAUSTED};
use neurovid_core::submission::QuotaSnapshot;
use neurovid_core::types::SessionId;
use neurovid_db::models::generation::{CreateGeneration, Generation, StageUpdate};
use neurovid_db::models::job::{JobState, QueueCounts};
use neurovid_db::models::survey::{CreateSurvey, Survey};
use neurovid_db::repositories::CreateOutcome;
use sqlx::types::Json;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::queue::{ClaimedJob, JobHandle, JobQueue, QueueError};
use crate::store::{GenerationStore, StoreError, SurveyStore};

// ---------------------------------------------------------------------------
// Generations
// ---------------------------------------------------------------------------

/// Generation records kept in insertion order.
#[derive(Default)]
pub struct MemoryGenerationStore {
    rows: Mutex<Vec<Generation>>,
    history: Mutex<Vec<(SessionId, GenerationStatus, i16)>>,
}

impl MemoryGenerationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(session, status, progress)` written, in order, including the
    /// initial insert.
    pub async fn history(&self, session_id: SessionId) -> Vec<(GenerationStatus, i16)> {
        self.history
            .lock()
            .await
            .iter()
            .filter(|(id, _, _)| *id == session_id)
            .map(|(_, status, progress)| (*status, *progress))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    async fn record(&self, session_id: SessionId, status: GenerationStatus) {
        self.history
            .lock()
            .await
            .push((session_id, status, status.progress()));
    }
}

#[async_trait]
impl GenerationStore for MemoryGenerationStore {
    async fn create_within_quota(
        &self,
        input: CreateGeneration,
        limit: i64,
    ) -> Result<CreateOutcome, StoreError> {
        let mut rows = self.rows.lock().await;
        let used = rows
            .iter()
            .filter(|g| g.owner_id == input.owner_id && g.status != GenerationStatus::Failed)
            .count() as i64;
        if used >= limit {
            return Ok(CreateOutcome::QuotaExceeded(QuotaSnapshot::new(limit, used)));
        }

        let now = Utc::now();
        let generation = Generation {
            session_id: input.session_id,
            owner_id: input.owner_id,
            topic: input.topic,
            details: input.details,
            category: input.category,
            language: input.language,
            duration_minutes: input.duration_minutes,
            style: input.style,
            status: GenerationStatus::Created,
            progress: GenerationStatus::Created.progress(),
            script: None,
            quiz: None,
            video_url: None,
            thumbnail_url: None,
            created_at: now,
            updated_at: now,
        };
        rows.push(generation.clone());
        drop(rows);

        self.record(generation.session_id, GenerationStatus::Created)
            .await;
        Ok(CreateOutcome::Created {
            generation,
            quota: QuotaSnapshot::new(limit, used + 1),
        })
    }

    async fn find(&self, session_id: SessionId) -> Result<Option<Generation>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().find(|g| g.session_id == session_id).cloned())
    }

    async fn list_recent(&self, owner_id: &str, limit: i64) -> Result<Vec<Generation>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .rev()
            .filter(|g| g.owner_id == owner_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn find_latest(&self, owner_id: &str) -> Result<Option<Generation>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().rev().find(|g| g.owner_id == owner_id).cloned())
    }

    async fn mark_queued(&self, session_id: SessionId) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().await;
        let Some(row) = rows
            .iter_mut()
            .find(|g| g.session_id == session_id && g.status == GenerationStatus::Created)
        else {
            return Ok(false);
        };
        row.status = GenerationStatus::Queued;
        row.progress = GenerationStatus::Queued.progress();
        row.updated_at = Utc::now();
        drop(rows);

        self.record(session_id, GenerationStatus::Queued).await;
        Ok(true)
    }

    async fn apply_stage(
        &self,
        session_id: SessionId,
        update: StageUpdate,
    ) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().await;
        let Some(row) = rows.iter_mut().find(|g| g.session_id == session_id) else {
            return Ok(false);
        };
        if !row.status.can_transition_to(update.status) {
            return Ok(false);
        }
        row.status = update.status;
        row.progress = update.progress();
        if let Some(script) = update.script {
            row.script = Some(Json(script));
        }
        if let Some(quiz) = update.quiz {
            row.quiz = Some(Json(quiz));
        }
        if let Some(url) = update.video_url {
            row.video_url = Some(url);
        }
        if let Some(url) = update.thumbnail_url {
            row.thumbnail_url = Some(url);
        }
        row.updated_at = Utc::now();
        drop(rows);

        self.record(session_id, update.status).await;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Surveys
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemorySurveyStore {
    rows: Mutex<Vec<Survey>>,
}

impl MemorySurveyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SurveyStore for MemorySurveyStore {
    async fn find_by_owner(&self, owner_id: &str) -> Result<Option<Survey>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().find(|s| s.owner_id == owner_id).cloned())
    }

    async fn create(&self, input: CreateSurvey) -> Result<Option<Survey>, StoreError> {
        let mut rows = self.rows.lock().await;
        if rows.iter().any(|s| s.owner_id == input.owner_id) {
            return Ok(None);
        }
        let now = Utc::now();
        let survey = Survey {
            id: rows.len() as i64 + 1,
            owner_id: input.owner_id,
            left_score: input.left_score,
            right_score: input.right_score,
            dominant_quadrant: input.dominant_quadrant,
            completed_at: Some(now),
            created_at: now,
        };
        rows.push(survey.clone());
        Ok(Some(survey))
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Snapshot of one queued job.
#[derive(Debug, Clone)]
pub struct MemoryJob {
    pub id: i64,
    pub kind: String,
    pub payload: JobPayload,
    pub options: JobOptions,
    pub state: JobState,
    pub attempts_made: i32,
    pub run_at: Instant,
    pub locked_until: Option<Instant>,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct QueueInner {
    next_id: i64,
    jobs: Vec<MemoryJob>,
}

/// Queue with the same claim, lease and retry semantics as `queue_jobs`.
#[derive(Default)]
pub struct MemoryJobQueue {
    inner: Mutex<QueueInner>,
    unavailable: AtomicBool,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent enqueues and counts fail with [`QueueError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn jobs(&self) -> Vec<MemoryJob> {
        self.inner.lock().await.jobs.clone()
    }

    pub async fn get(&self, job_id: i64) -> Option<MemoryJob> {
        self.inner
            .lock()
            .await
            .jobs
            .iter()
            .find(|j| j.id == job_id)
            .cloned()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(
        &self,
        kind: &str,
        payload: JobPayload,
        options: JobOptions,
    ) -> Result<JobHandle, QueueError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("queue is offline".to_string()));
        }
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.jobs.push(MemoryJob {
            id,
            kind: kind.to_string(),
            payload,
            options,
            state: JobState::Waiting,
            attempts_made: 0,
            run_at: Instant::now(),
            locked_until: None,
            last_error: None,
        });
        Ok(JobHandle { id })
    }

    async fn claim(&self, kind: &str, lease: Duration) -> Result<Option<ClaimedJob>, QueueError> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        for job in inner.jobs.iter_mut().filter(|j| j.kind == kind) {
            let lease_expired = job.locked_until.is_some_and(|until| until < now);
            if job.state == JobState::Active
                && lease_expired
                && job.attempts_made >= job.options.attempts
            {
                job.state = JobState::Held;
                job.locked_until = None;
                job.last_error = Some(LEASE_EXHAUSTED.to_string());
            }
        }
        let next = inner
            .jobs
            .iter_mut()
            .filter(|j| j.kind == kind)
            .filter(|j| match j.state {
                JobState::Waiting => j.run_at <= now,
                JobState::Active => j.locked_until.is_some_and(|until| until < now),
                JobState::Held => false,
            })
            .min_by_key(|j| (j.run_at, j.id));

        Ok(next.map(|job| {
            job.state = JobState::Active;
            job.attempts_made += 1;
            job.locked_until = Some(now + lease);
            ClaimedJob {
                id: job.id,
                payload: job.payload,
                attempts_made: job.attempts_made,
                options: job.options,
            }
        }))
    }

    async fn complete(&self, job_id: i64) -> Result<(), QueueError> {
        self.inner.lock().await.jobs.retain(|j| j.id != job_id);
        Ok(())
    }

    async fn retry_later(&self, job_id: i64, delay: Duration, error: &str) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        if let Some(job) = inner.jobs.iter_mut().find(|j| j.id == job_id) {
            job.state = JobState::Waiting;
            job.run_at = Instant::now() + delay;
            job.locked_until = None;
            job.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn hold(&self, job_id: i64, error: &str) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        if let Some(job) = inner.jobs.iter_mut().find(|j| j.id == job_id) {
            job.state = JobState::Held;
            job.locked_until = None;
            job.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn counts(&self, kind: &str) -> Result<QueueCounts, QueueError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("queue is offline".to_string()));
        }
        let inner = self.inner.lock().await;
        let mut counts = QueueCounts::default();
        for job in inner.jobs.iter().filter(|j| j.kind == kind) {
            match job.state {
                JobState::Waiting => counts.waiting += 1,
                JobState::Active => counts.active += 1,
                JobState::Held => counts.held += 1,
            }
        }
        Ok(counts)
    }
}
