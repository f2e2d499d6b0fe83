//! Worker pool: polls the queue, runs jobs under a concurrency cap and a
//! start-rate limit, and applies the retry policy to each outcome.
//!
//! Concurrency is a Tokio [`Semaphore`]; the start rate is a `governor`
//! GCRA limiter. A job holds its semaphore permit until it finishes.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::Clock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use neurovid_core::queue::GENERATION_JOB_KIND;
use neurovid_pipeline::{ClaimedJob, GenerationPipeline, JobQueue};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;

type DirectRateLimiter =
    RateLimiter<NotKeyed, InMemoryState, TokioClock, NoOpMiddleware<std::time::Instant>>;

/// Rate limiter clock that follows `tokio::time`, so a paused runtime
/// also pauses start spacing.
#[derive(Debug, Clone, Copy, Default)]
struct TokioClock;

impl Clock for TokioClock {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Scheduling knobs for [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub concurrency: usize,
    pub rate_limit_max: NonZeroU32,
    pub rate_limit_window: Duration,
    pub poll_interval: Duration,
    pub lease: Duration,
}

impl From<&WorkerConfig> for PoolSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            rate_limit_max: config.rate_limit_max,
            rate_limit_window: config.rate_limit_window,
            poll_interval: config.poll_interval,
            lease: config.lease,
        }
    }
}

/// What happened to a job after one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// Scheduled for another attempt after `delay`.
    Retrying { delay: Duration },
    /// Attempts exhausted or failure was fatal; kept for inspection.
    Held,
}

pub struct WorkerPool {
    queue: Arc<dyn JobQueue>,
    pipeline: Arc<GenerationPipeline>,
    slots: Arc<Semaphore>,
    limiter: Arc<DirectRateLimiter>,
    settings: PoolSettings,
}

impl WorkerPool {
    pub fn new(queue: Arc<dyn JobQueue>, pipeline: Arc<GenerationPipeline>, settings: PoolSettings) -> Self {
        let slots = Arc::new(Semaphore::new(settings.concurrency));
        let limiter = Arc::new(RateLimiter::direct_with_clock(
            start_quota(settings.rate_limit_max, settings.rate_limit_window),
            TokioClock,
        ));
        Self {
            queue,
            pipeline,
            slots,
            limiter,
            settings,
        }
    }

    /// Run until `cancel` fires, then wait for in-flight jobs to finish.
    ///
    /// In-flight jobs are never interrupted.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tasks = JoinSet::new();

        tracing::info!(
            concurrency = self.settings.concurrency,
            rate_limit_max = self.settings.rate_limit_max.get(),
            rate_limit_window_secs = self.settings.rate_limit_window.as_secs(),
            poll_interval_ms = self.settings.poll_interval.as_millis() as u64,
            "Worker pool started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Worker pool shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.dispatch(&mut tasks).await;
                }
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Job task panicked");
                    }
                }
            }
        }

        tracing::info!(in_flight = tasks.len(), "Waiting for in-flight jobs");
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Job task panicked");
            }
        }
        tracing::info!("Worker pool stopped");
    }

    /// Claim and spawn jobs while free slots remain.
    async fn dispatch(&self, tasks: &mut JoinSet<()>) {
        loop {
            let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() else {
                return;
            };

            let job = match self.queue.claim(GENERATION_JOB_KIND, self.settings.lease).await {
                Ok(Some(job)) => job,
                Ok(None) => return,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim job");
                    return;
                }
            };

            let queue = Arc::clone(&self.queue);
            let pipeline = Arc::clone(&self.pipeline);
            let limiter = Arc::clone(&self.limiter);
            tasks.spawn(async move {
                while let Err(not_until) = limiter.check() {
                    let wait = not_until.wait_time_from(TokioClock.now());
                    tracing::debug!(
                        job_id = job.id,
                        wait_ms = wait.as_millis() as u64,
                        "Start rate limit reached, delaying job",
                    );
                    tokio::time::sleep(wait).await;
                }
                execute_job(queue.as_ref(), &pipeline, job).await;
                drop(permit);
            });
        }
    }
}

/// At most `max` starts in any `window`: one start every `window / max`,
/// with no burst on top.
fn start_quota(max: NonZeroU32, window: Duration) -> Quota {
    Quota::with_period(window / max.get())
        .unwrap_or_else(|| Quota::per_minute(max).allow_burst(NonZeroU32::MIN))
}

/// Run one attempt of `job` and settle it with the queue.
///
/// Success removes the job. A retryable failure with attempts left goes back
/// to the queue after the job's backoff delay. Anything else is held.
pub async fn execute_job(
    queue: &dyn JobQueue,
    pipeline: &GenerationPipeline,
    job: ClaimedJob,
) -> JobOutcome {
    let session_id = job.payload.session_id;
    tracing::info!(
        job_id = job.id,
        session_id = %session_id,
        attempt = job.attempts_made,
        max_attempts = job.options.attempts,
        "Job started",
    );

    let outcome = match pipeline.process(session_id).await {
        Ok(()) => {
            if let Err(e) = queue.complete(job.id).await {
                tracing::error!(job_id = job.id, error = %e, "Failed to mark job complete");
            }
            JobOutcome::Completed
        }
        Err(err) if err.is_retryable() && job.attempts_left() => {
            let delay = job.options.backoff.delay_for(job.attempts_made);
            if let Err(e) = queue.retry_later(job.id, delay, &err.to_string()).await {
                tracing::error!(job_id = job.id, error = %e, "Failed to schedule retry");
            }
            tracing::warn!(
                job_id = job.id,
                session_id = %session_id,
                attempt = job.attempts_made,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Job failed, retrying",
            );
            JobOutcome::Retrying { delay }
        }
        Err(err) => {
            if let Err(e) = queue.hold(job.id, &err.to_string()).await {
                tracing::error!(job_id = job.id, error = %e, "Failed to hold job");
            }
            tracing::error!(
                job_id = job.id,
                session_id = %session_id,
                attempt = job.attempts_made,
                retryable = err.is_retryable(),
                error = %err,
                "Job failed permanently, held for inspection",
            );
            JobOutcome::Held
        }
    };

    if outcome == JobOutcome::Completed {
        tracing::info!(job_id = job.id, session_id = %session_id, "Job completed");
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use governor::clock::FakeRelativeClock;
    use neurovid_core::generation::GenerationStatus;
    use neurovid_core::queue::{JobOptions, JobPayload};
    use neurovid_core::types::{new_session_id, SessionId};
    use neurovid_db::models::generation::CreateGeneration;
    use neurovid_db::models::job::JobState;
    use neurovid_pipeline::memory::{MemoryGenerationStore, MemoryJobQueue};
    use neurovid_pipeline::providers::{ProviderError, RenderedVideo, TextGenerator, VideoRenderer};
    use neurovid_pipeline::GenerationStore;

    use super::*;

    const SCRIPT: &str = r#"{"title":"Tides","bullets":["The moon pulls the sea."]}"#;
    const QUIZ: &str = r#"{"questions":[{"question":"What pulls the sea?","options":["Moon","Sun","Wind","Fish"],"correctAnswer":0,"explanation":"Gravity."}]}"#;

    // -- fakes --

    /// Fails the first `failures` script calls, then succeeds. Tracks how many
    /// calls overlap.
    struct FlakyText {
        failures: usize,
        calls: AtomicUsize,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FlakyText {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for FlakyText {
        async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if prompt.starts_with("Based on this educational video script") {
                return Ok(QUIZ.to_string());
            }
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(ProviderError::EmptyResponse);
            }
            Ok(SCRIPT.to_string())
        }
    }

    struct StubVideo;

    #[async_trait]
    impl VideoRenderer for StubVideo {
        async fn render(&self, _narration: &str) -> Result<RenderedVideo, ProviderError> {
            Ok(RenderedVideo {
                video_url: "https://cdn.local/videos/1_x.mp4".to_string(),
                thumbnail_url: None,
            })
        }
    }

    fn settings() -> PoolSettings {
        PoolSettings {
            concurrency: 2,
            rate_limit_max: NonZeroU32::new(1000).unwrap(),
            rate_limit_window: Duration::from_secs(60),
            poll_interval: Duration::from_millis(100),
            lease: Duration::from_secs(900),
        }
    }

    async fn seed(store: &MemoryGenerationStore, queue: &MemoryJobQueue) -> (SessionId, i64) {
        let input = CreateGeneration {
            session_id: new_session_id(),
            owner_id: "u1".to_string(),
            topic: "Tides".to_string(),
            details: "for kids".to_string(),
            category: None,
            language: "en".to_string(),
            duration_minutes: 1,
            style: "right".to_string(),
        };
        let id = input.session_id;
        store.create_within_quota(input, 100).await.unwrap();
        let handle = queue
            .enqueue(
                GENERATION_JOB_KIND,
                JobPayload { session_id: id },
                JobOptions::default(),
            )
            .await
            .unwrap();
        (id, handle.id)
    }

    async fn wait_for_status(store: &MemoryGenerationStore, id: SessionId, status: GenerationStatus) {
        for _ in 0..10_000 {
            let row = store.find(id).await.unwrap().unwrap();
            if row.status == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("record never reached {status}");
    }

    // -- retry policy --

    #[tokio::test(start_paused = true)]
    async fn failed_attempt_is_retried_with_exponential_backoff() {
        let store = Arc::new(MemoryGenerationStore::new());
        let queue = Arc::new(MemoryJobQueue::new());
        let (id, job_id) = seed(&store, &queue).await;
        let pipeline = GenerationPipeline::new(store.clone(), Arc::new(FlakyText::new(5)), Arc::new(StubVideo));
        let lease = Duration::from_secs(900);

        let job = queue.claim(GENERATION_JOB_KIND, lease).await.unwrap().unwrap();
        let outcome = execute_job(queue.as_ref(), &pipeline, job).await;
        assert_eq!(outcome, JobOutcome::Retrying { delay: Duration::from_secs(8) });

        tokio::time::advance(Duration::from_secs(8)).await;
        let job = queue.claim(GENERATION_JOB_KIND, lease).await.unwrap().unwrap();
        let outcome = execute_job(queue.as_ref(), &pipeline, job).await;
        assert_eq!(outcome, JobOutcome::Retrying { delay: Duration::from_secs(16) });

        tokio::time::advance(Duration::from_secs(16)).await;
        let job = queue.claim(GENERATION_JOB_KIND, lease).await.unwrap().unwrap();
        assert_eq!(job.attempts_made, 3);
        let outcome = execute_job(queue.as_ref(), &pipeline, job).await;
        assert_eq!(outcome, JobOutcome::Held);

        let held = queue.get(job_id).await.unwrap();
        assert_eq!(held.state, JobState::Held);
        let row = store.find(id).await.unwrap().unwrap();
        assert_eq!(row.status, GenerationStatus::Failed);
        assert_eq!(row.progress, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_record_is_held_without_retry() {
        let store = Arc::new(MemoryGenerationStore::new());
        let queue = Arc::new(MemoryJobQueue::new());
        let handle = queue
            .enqueue(
                GENERATION_JOB_KIND,
                JobPayload {
                    session_id: new_session_id(),
                },
                JobOptions::default(),
            )
            .await
            .unwrap();
        let pipeline = GenerationPipeline::new(store, Arc::new(FlakyText::new(0)), Arc::new(StubVideo));

        let job = queue
            .claim(GENERATION_JOB_KIND, Duration::from_secs(60))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(execute_job(queue.as_ref(), &pipeline, job).await, JobOutcome::Held);
        assert_eq!(queue.get(handle.id).await.unwrap().attempts_made, 1);
    }

    // -- pool --

    #[tokio::test(start_paused = true)]
    async fn pool_recovers_from_transient_failure() {
        let store = Arc::new(MemoryGenerationStore::new());
        let queue = Arc::new(MemoryJobQueue::new());
        let (id, job_id) = seed(&store, &queue).await;
        let pipeline = Arc::new(GenerationPipeline::new(
            store.clone(),
            Arc::new(FlakyText::new(1)),
            Arc::new(StubVideo),
        ));
        let pool = Arc::new(WorkerPool::new(queue.clone(), pipeline, settings()));

        let cancel = CancellationToken::new();
        let runner = {
            let pool = Arc::clone(&pool);
            let cancel = cancel.clone();
            tokio::spawn(async move { pool.run(cancel).await })
        };

        wait_for_status(&store, id, GenerationStatus::Completed).await;
        cancel.cancel();
        runner.await.unwrap();

        assert!(queue.get(job_id).await.is_none());
        let row = store.find(id).await.unwrap().unwrap();
        assert_eq!(row.progress, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn pool_never_exceeds_concurrency() {
        let store = Arc::new(MemoryGenerationStore::new());
        let queue = Arc::new(MemoryJobQueue::new());
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(seed(&store, &queue).await.0);
        }
        let mut text = FlakyText::new(0);
        text.delay = Duration::from_secs(2);
        let text = Arc::new(text);
        let pipeline = Arc::new(GenerationPipeline::new(store.clone(), text.clone(), Arc::new(StubVideo)));
        let pool = Arc::new(WorkerPool::new(queue.clone(), pipeline, settings()));

        let cancel = CancellationToken::new();
        let runner = {
            let pool = Arc::clone(&pool);
            let cancel = cancel.clone();
            tokio::spawn(async move { pool.run(cancel).await })
        };

        for id in &ids {
            wait_for_status(&store, *id, GenerationStatus::Completed).await;
        }
        cancel.cancel();
        runner.await.unwrap();

        assert_eq!(text.max_in_flight.load(Ordering::SeqCst), 2);
        assert!(queue.jobs().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pool_starts_at_most_five_jobs_per_minute() {
        let store = Arc::new(MemoryGenerationStore::new());
        let queue = Arc::new(MemoryJobQueue::new());
        let mut ids = Vec::new();
        for _ in 0..7 {
            ids.push(seed(&store, &queue).await.0);
        }
        let pipeline = Arc::new(GenerationPipeline::new(
            store.clone(),
            Arc::new(FlakyText::new(0)),
            Arc::new(StubVideo),
        ));
        let pool = Arc::new(WorkerPool::new(
            queue.clone(),
            pipeline,
            PoolSettings {
                concurrency: 7,
                rate_limit_max: NonZeroU32::new(5).unwrap(),
                ..settings()
            },
        ));

        let cancel = CancellationToken::new();
        let runner = {
            let pool = Arc::clone(&pool);
            let cancel = cancel.clone();
            tokio::spawn(async move { pool.run(cancel).await })
        };

        let completed = |store: Arc<MemoryGenerationStore>, ids: Vec<SessionId>| async move {
            let mut done = 0;
            for id in ids {
                if store.find(id).await.unwrap().unwrap().status == GenerationStatus::Completed {
                    done += 1;
                }
            }
            done
        };

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(completed(store.clone(), ids.clone()).await, 5);

        tokio::time::sleep(Duration::from_secs(26)).await;
        assert_eq!(completed(store.clone(), ids.clone()).await, 7);

        cancel.cancel();
        runner.await.unwrap();
    }

    #[test]
    fn start_quota_spaces_starts_evenly() {
        let quota = start_quota(NonZeroU32::new(5).unwrap(), Duration::from_secs(60));
        assert_eq!(quota.replenish_interval(), Duration::from_secs(12));
        assert_eq!(quota.burst_size().get(), 1);
    }

    #[test]
    fn no_window_admits_more_than_max_starts() {
        let clock = FakeRelativeClock::default();
        let limiter = RateLimiter::direct_with_clock(
            start_quota(NonZeroU32::new(5).unwrap(), Duration::from_secs(60)),
            clock.clone(),
        );

        // Greedy caller: every second, start as many jobs as the limiter allows.
        let mut starts = Vec::new();
        for second in 0..180u64 {
            while limiter.check().is_ok() {
                starts.push(second);
            }
            clock.advance(Duration::from_secs(1));
        }

        assert_eq!(starts.len(), 15);
        for &from in &starts {
            let in_window = starts.iter().filter(|&&t| t >= from && t < from + 60).count();
            assert!(in_window <= 5, "{in_window} starts in the 60s from {from}s");
        }
    }
}
