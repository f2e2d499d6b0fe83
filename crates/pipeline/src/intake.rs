//! Request intake: validate, check the survey prerequisite, take a quota
//! slot, create the record, and hand the job to the queue in the background.

use std::sync::Arc;
use std::time::Duration;

use neurovid_core::error::CoreError;
use neurovid_core::queue::{JobOptions, JobPayload, GENERATION_JOB_KIND};
use neurovid_core::submission::{QuotaSnapshot, SubmitGeneration};
use neurovid_core::types::{new_session_id, SessionId};
use neurovid_db::models::generation::CreateGeneration;
use neurovid_db::repositories::CreateOutcome;
use tokio::task::JoinHandle;

use crate::error::ServiceError;
use crate::queue::{JobQueue, QueueError};
use crate::store::{GenerationStore, SurveyStore};

/// Upper bound on the background enqueue call.
pub const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of an accepted submission.
#[derive(Debug)]
pub struct SubmitReceipt {
    pub session_id: SessionId,
    /// Usage including this request.
    pub quota: QuotaSnapshot,
    /// Background enqueue task. Dropping the handle detaches it.
    pub enqueue_task: JoinHandle<()>,
}

pub struct IntakeService {
    generations: Arc<dyn GenerationStore>,
    surveys: Arc<dyn SurveyStore>,
    queue: Arc<dyn JobQueue>,
    quota_limit: i64,
}

impl IntakeService {
    pub fn new(
        generations: Arc<dyn GenerationStore>,
        surveys: Arc<dyn SurveyStore>,
        queue: Arc<dyn JobQueue>,
        quota_limit: i64,
    ) -> Self {
        Self {
            generations,
            surveys,
            queue,
            quota_limit,
        }
    }

    /// Accept a generation request for `owner_id`.
    ///
    /// Returns as soon as the `CREATED` record exists. Enqueueing and the
    /// `QUEUED` transition happen on a spawned task; if the queue is down the
    /// record stays `CREATED` and the failure is only logged.
    pub async fn submit(
        &self,
        owner_id: &str,
        input: SubmitGeneration,
    ) -> Result<SubmitReceipt, ServiceError> {
        let input = input.validate()?;

        let survey = self.surveys.find_by_owner(owner_id).await?.ok_or_else(|| {
            CoreError::PrerequisiteMissing("Brain dominance survey not completed".to_string())
        })?;

        let create = CreateGeneration {
            session_id: new_session_id(),
            owner_id: owner_id.to_string(),
            topic: input.topic,
            details: input.details,
            category: input.category,
            language: input.language,
            duration_minutes: input.duration_minutes,
            style: survey.dominant_quadrant,
        };

        let (generation, quota) = match self
            .generations
            .create_within_quota(create, self.quota_limit)
            .await?
        {
            CreateOutcome::Created { generation, quota } => (generation, quota),
            CreateOutcome::QuotaExceeded(snapshot) => {
                tracing::info!(
                    owner_id,
                    used = snapshot.used,
                    limit = snapshot.limit,
                    "Generation quota exhausted",
                );
                return Err(CoreError::QuotaExceeded(snapshot).into());
            }
        };

        let session_id = generation.session_id;
        tracing::info!(
            session_id = %session_id,
            owner_id,
            used = quota.used,
            "Generation created",
        );

        let enqueue_task = tokio::spawn(enqueue_generation(
            Arc::clone(&self.generations),
            Arc::clone(&self.queue),
            session_id,
        ));

        Ok(SubmitReceipt {
            session_id,
            quota,
            enqueue_task,
        })
    }
}

/// Enqueue the job for `session_id`, then record `QUEUED`.
async fn enqueue_generation(
    generations: Arc<dyn GenerationStore>,
    queue: Arc<dyn JobQueue>,
    session_id: SessionId,
) {
    let enqueue = queue.enqueue(
        GENERATION_JOB_KIND,
        JobPayload { session_id },
        JobOptions::default(),
    );
    let handle = match tokio::time::timeout(ENQUEUE_TIMEOUT, enqueue).await {
        Ok(Ok(handle)) => handle,
        Ok(Err(QueueError::Unavailable(reason))) => {
            tracing::error!(
                session_id = %session_id,
                error = %reason,
                "Queue unavailable; generation left in CREATED",
            );
            return;
        }
        Err(_) => {
            tracing::error!(
                session_id = %session_id,
                timeout_secs = ENQUEUE_TIMEOUT.as_secs(),
                "Enqueue timed out; generation left in CREATED",
            );
            return;
        }
    };
    tracing::info!(session_id = %session_id, job_id = handle.id, "Job enqueued");

    match generations.mark_queued(session_id).await {
        Ok(true) => tracing::debug!(session_id = %session_id, "Status updated to QUEUED"),
        Ok(false) => tracing::debug!(
            session_id = %session_id,
            "Worker already picked up the job; QUEUED not written",
        ),
        Err(e) => tracing::error!(
            session_id = %session_id,
            error = %e,
            "Failed to update status to QUEUED",
        ),
    }
}
