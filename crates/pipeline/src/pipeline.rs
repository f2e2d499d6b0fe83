//! The per-job generation algorithm: script, quiz, video.
//!
//! Every stage transition is written before the stage's provider call so a
//! polling client sees `GENERATING_*` while the work runs. Outputs are
//! persisted together with the transition that follows them, and the final
//! write sets all outputs plus `COMPLETED` at once. Any failure records
//! `FAILED` without touching outputs already written.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use neurovid_core::content::{Quiz, Script};
use neurovid_core::generation::GenerationStatus;
use neurovid_core::model_output::parse_model_json;
use neurovid_core::prompts::{quiz_prompt, script_prompt, ScriptPromptInput};
use neurovid_core::types::SessionId;
use neurovid_db::models::generation::{Generation, StageUpdate};

use crate::error::PipelineError;
use crate::providers::{ProviderError, RenderedVideo, TextGenerator, VideoRenderer};
use crate::store::GenerationStore;

/// Default bound on one text-model call.
pub const DEFAULT_TEXT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default bound on one render call.
pub const DEFAULT_VIDEO_TIMEOUT: Duration = Duration::from_secs(600);

pub struct GenerationPipeline {
    store: Arc<dyn GenerationStore>,
    text: Arc<dyn TextGenerator>,
    video: Arc<dyn VideoRenderer>,
    text_timeout: Duration,
    video_timeout: Duration,
}

impl GenerationPipeline {
    pub fn new(
        store: Arc<dyn GenerationStore>,
        text: Arc<dyn TextGenerator>,
        video: Arc<dyn VideoRenderer>,
    ) -> Self {
        Self {
            store,
            text,
            video,
            text_timeout: DEFAULT_TEXT_TIMEOUT,
            video_timeout: DEFAULT_VIDEO_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, text: Duration, video: Duration) -> Self {
        self.text_timeout = text;
        self.video_timeout = video;
        self
    }

    /// Run the whole pipeline for `session_id`.
    ///
    /// On error the record has already been moved to `FAILED` (unless it does
    /// not exist or refused the move) and the error is returned for the
    /// queue's retry policy.
    pub async fn process(&self, session_id: SessionId) -> Result<(), PipelineError> {
        let started = Instant::now();

        match self.run(session_id).await {
            Ok(()) => {
                tracing::info!(
                    session_id = %session_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Generation completed",
                );
                Ok(())
            }
            Err(err @ PipelineError::RecordNotFound(_)) => {
                tracing::error!(session_id = %session_id, error = %err, "Generation record missing");
                Err(err)
            }
            Err(err @ PipelineError::TransitionRejected { .. }) => {
                tracing::warn!(session_id = %session_id, error = %err, "Generation moved on elsewhere");
                Err(err)
            }
            Err(err) => {
                match self.store.apply_stage(session_id, StageUpdate::failed()).await {
                    Ok(true) => {}
                    Ok(false) => tracing::warn!(
                        session_id = %session_id,
                        "FAILED status refused, record already terminal",
                    ),
                    Err(store_err) => tracing::error!(
                        session_id = %session_id,
                        error = %store_err,
                        "Failed to record FAILED status",
                    ),
                }
                tracing::warn!(
                    session_id = %session_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %err,
                    "Generation failed",
                );
                Err(err)
            }
        }
    }

    async fn run(&self, session_id: SessionId) -> Result<(), PipelineError> {
        let generation = self
            .store
            .find(session_id)
            .await?
            .ok_or(PipelineError::RecordNotFound(session_id))?;

        match generation.status {
            GenerationStatus::Completed => {
                tracing::info!(session_id = %session_id, "Generation already completed, skipping");
                return Ok(());
            }
            // Enqueue confirmation not recorded yet; keep progress 0 -> 10 -> 20.
            GenerationStatus::Created => {
                self.store.mark_queued(session_id).await?;
            }
            GenerationStatus::Queued => {}
            GenerationStatus::Failed => {
                self.advance(session_id, StageUpdate::status(GenerationStatus::Queued))
                    .await?;
            }
            // An earlier delivery died mid-run and its lease ran out.
            GenerationStatus::GeneratingScript
            | GenerationStatus::GeneratingQuiz
            | GenerationStatus::GeneratingVideo => {
                tracing::warn!(
                    session_id = %session_id,
                    status = %generation.status,
                    "Restarting interrupted generation",
                );
                self.advance(session_id, StageUpdate::failed()).await?;
                self.advance(session_id, StageUpdate::status(GenerationStatus::Queued))
                    .await?;
            }
        }

        tracing::debug!(
            session_id = %session_id,
            topic = %generation.topic,
            duration = generation.duration_minutes,
            "Processing generation",
        );

        self.advance(session_id, StageUpdate::status(GenerationStatus::GeneratingScript))
            .await?;
        let script = timed(session_id, "script", self.generate_script(&generation)).await?;

        self.advance(
            session_id,
            StageUpdate::status(GenerationStatus::GeneratingQuiz).with_script(script.clone()),
        )
        .await?;
        let quiz = timed(session_id, "quiz", self.generate_quiz(&script)).await?;

        self.advance(
            session_id,
            StageUpdate::status(GenerationStatus::GeneratingVideo).with_quiz(quiz.clone()),
        )
        .await?;
        let video = timed(session_id, "video", self.render_video(&script)).await?;

        self.advance(
            session_id,
            StageUpdate::status(GenerationStatus::Completed)
                .with_script(script)
                .with_quiz(quiz)
                .with_video(video.video_url, video.thumbnail_url),
        )
        .await
    }

    async fn advance(&self, session_id: SessionId, update: StageUpdate) -> Result<(), PipelineError> {
        let status = update.status;
        if !self.store.apply_stage(session_id, update).await? {
            return Err(match self.store.find(session_id).await? {
                Some(current) => PipelineError::TransitionRejected {
                    session_id,
                    from: current.status,
                    to: status,
                },
                None => PipelineError::RecordNotFound(session_id),
            });
        }
        tracing::debug!(
            session_id = %session_id,
            status = %status,
            progress = status.progress(),
            "Status updated",
        );
        Ok(())
    }

    async fn generate_script(&self, generation: &Generation) -> Result<Script, PipelineError> {
        let prompt = script_prompt(ScriptPromptInput {
            topic: &generation.topic,
            details: &generation.details,
            duration_minutes: generation.duration_minutes,
            language: &generation.language,
            style: &generation.style,
        });

        let raw = self
            .call_text(&prompt)
            .await
            .map_err(PipelineError::ScriptGenerationFailed)?;
        tracing::debug!(raw_len = raw.len(), "Script response received");

        let script: Script = parse_model_json(&raw)
            .map_err(|e| PipelineError::ScriptGenerationFailed(e.to_string()))?;
        script
            .validate()
            .map_err(PipelineError::ScriptGenerationFailed)?;
        Ok(script)
    }

    async fn generate_quiz(&self, script: &Script) -> Result<Quiz, PipelineError> {
        let raw = self
            .call_text(&quiz_prompt(script))
            .await
            .map_err(PipelineError::QuizGenerationFailed)?;
        tracing::debug!(raw_len = raw.len(), "Quiz response received");

        let quiz: Quiz =
            parse_model_json(&raw).map_err(|e| PipelineError::QuizGenerationFailed(e.to_string()))?;
        quiz.validate().map_err(PipelineError::QuizGenerationFailed)?;
        Ok(quiz)
    }

    async fn render_video(&self, script: &Script) -> Result<RenderedVideo, PipelineError> {
        let narration = script.narration();
        if narration.trim().is_empty() {
            return Err(PipelineError::EmptyScriptContent);
        }
        tracing::debug!(narration_len = narration.len(), "Requesting video render");

        let video = with_timeout(self.video_timeout, self.video.render(&narration))
            .await
            .map_err(PipelineError::VideoGenerationFailed)?;
        if video.video_url.trim().is_empty() {
            return Err(PipelineError::VideoGenerationFailed(
                "renderer returned an empty URL".to_string(),
            ));
        }
        Ok(video)
    }

    async fn call_text(&self, prompt: &str) -> Result<String, String> {
        with_timeout(self.text_timeout, self.text.generate(prompt)).await
    }
}

/// Await a provider call with an upper bound, flattening both failure modes
/// into a message.
async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, String> {
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {}s", limit.as_secs())),
    }
}

async fn timed<T>(
    session_id: SessionId,
    stage: &'static str,
    work: impl Future<Output = Result<T, PipelineError>>,
) -> Result<T, PipelineError> {
    let started = Instant::now();
    let result = work.await;
    tracing::info!(
        session_id = %session_id,
        stage,
        ok = result.is_ok(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Stage finished",
    );
    result
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use neurovid_core::types::new_session_id;
    use neurovid_db::models::generation::CreateGeneration;
    use neurovid_db::repositories::CreateOutcome;
    use tokio::sync::Mutex;

    use super::*;
    use crate::memory::MemoryGenerationStore;

    const SCRIPT_JSON: &str =
        r#"{"title":"Photosynthesis","bullets":["Leaves catch light.","Plants make sugar."]}"#;

    fn quiz_json() -> String {
        let question = serde_json::json!({
            "question": "What do leaves catch?",
            "options": ["Light", "Rocks", "Sound", "Heat"],
            "correctAnswer": 0,
            "explanation": "Leaves absorb sunlight."
        });
        serde_json::json!({ "questions": vec![question; 5] }).to_string()
    }

    // -- fakes --

    /// Replies to script prompts and quiz prompts from separate queues.
    /// When a queue runs dry the last reply is repeated.
    struct FakeText {
        script: Mutex<VecDeque<Result<String, String>>>,
        quiz: Mutex<VecDeque<Result<String, String>>>,
        delay: Option<Duration>,
    }

    impl FakeText {
        fn new(script: Vec<Result<String, String>>, quiz: Vec<Result<String, String>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                quiz: Mutex::new(quiz.into()),
                delay: None,
            }
        }

        fn ok() -> Self {
            Self::new(vec![Ok(SCRIPT_JSON.to_string())], vec![Ok(quiz_json())])
        }
    }

    async fn next_reply(queue: &Mutex<VecDeque<Result<String, String>>>) -> Result<String, String> {
        let mut queue = queue.lock().await;
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }

    #[async_trait]
    impl TextGenerator for FakeText {
        async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let reply = if prompt.starts_with("Based on this educational video script") {
                next_reply(&self.quiz).await
            } else {
                next_reply(&self.script).await
            };
            reply.map_err(|body| ProviderError::Api { status: 500, body })
        }
    }

    struct FakeVideo {
        url: String,
    }

    impl FakeVideo {
        fn ok() -> Self {
            Self {
                url: "https://cdn.local/videos/1_abc.mp4".to_string(),
            }
        }
    }

    #[async_trait]
    impl VideoRenderer for FakeVideo {
        async fn render(&self, _narration: &str) -> Result<RenderedVideo, ProviderError> {
            Ok(RenderedVideo {
                video_url: self.url.clone(),
                thumbnail_url: None,
            })
        }
    }

    async fn seeded_store() -> (Arc<MemoryGenerationStore>, SessionId) {
        let store = Arc::new(MemoryGenerationStore::new());
        let input = CreateGeneration {
            session_id: new_session_id(),
            owner_id: "user_1".to_string(),
            topic: "Photosynthesis".to_string(),
            details: "for a 10-year-old".to_string(),
            category: None,
            language: "en".to_string(),
            duration_minutes: 2,
            style: "balanced".to_string(),
        };
        let id = input.session_id;
        let outcome = store.create_within_quota(input, 3).await.unwrap();
        assert_matches!(outcome, CreateOutcome::Created { .. });
        (store, id)
    }

    fn pipeline(store: Arc<MemoryGenerationStore>, text: FakeText, video: FakeVideo) -> GenerationPipeline {
        GenerationPipeline::new(store, Arc::new(text), Arc::new(video))
    }

    // -- happy path --

    #[tokio::test]
    async fn successful_run_populates_all_outputs() {
        let (store, id) = seeded_store().await;
        pipeline(store.clone(), FakeText::ok(), FakeVideo::ok())
            .process(id)
            .await
            .unwrap();

        let row = store.find(id).await.unwrap().unwrap();
        assert_eq!(row.status, GenerationStatus::Completed);
        assert_eq!(row.progress, 100);
        assert_eq!(row.script().unwrap().title, "Photosynthesis");
        assert!(!row.quiz().unwrap().questions.is_empty());
        assert_eq!(row.video_url.as_deref(), Some("https://cdn.local/videos/1_abc.mp4"));
    }

    #[tokio::test]
    async fn progress_follows_fixed_sequence() {
        let (store, id) = seeded_store().await;
        pipeline(store.clone(), FakeText::ok(), FakeVideo::ok())
            .process(id)
            .await
            .unwrap();

        let progress: Vec<i16> = store.history(id).await.into_iter().map(|(_, p)| p).collect();
        assert_eq!(progress, [0, 10, 20, 40, 60, 100]);
    }

    #[tokio::test]
    async fn quiz_is_never_written_before_script() {
        let (store, id) = seeded_store().await;
        let history_store = store.clone();
        pipeline(store, FakeText::ok(), FakeVideo::ok())
            .process(id)
            .await
            .unwrap();

        let statuses: Vec<_> = history_store.history(id).await.into_iter().map(|(s, _)| s).collect();
        let script_at = statuses
            .iter()
            .position(|s| *s == GenerationStatus::GeneratingQuiz)
            .unwrap();
        let quiz_at = statuses
            .iter()
            .position(|s| *s == GenerationStatus::GeneratingVideo)
            .unwrap();
        assert!(script_at < quiz_at);
    }

    #[tokio::test]
    async fn recovers_json_wrapped_in_prose() {
        let (store, id) = seeded_store().await;
        let wrapped = format!("Sure! Here is your script:\n```json\n{SCRIPT_JSON}\n```\nEnjoy.");
        let text = FakeText::new(vec![Ok(wrapped)], vec![Ok(quiz_json())]);
        pipeline(store.clone(), text, FakeVideo::ok())
            .process(id)
            .await
            .unwrap();

        let row = store.find(id).await.unwrap().unwrap();
        assert_eq!(row.status, GenerationStatus::Completed);
    }

    #[tokio::test]
    async fn rerun_after_completion_keeps_terminal_state() {
        let (store, id) = seeded_store().await;
        let p = pipeline(store.clone(), FakeText::ok(), FakeVideo::ok());
        p.process(id).await.unwrap();
        p.process(id).await.unwrap();

        let row = store.find(id).await.unwrap().unwrap();
        assert_eq!(row.status, GenerationStatus::Completed);
        assert!(row.script.is_some() && row.quiz.is_some() && row.video_url.is_some());
    }

    #[tokio::test]
    async fn rerun_after_failure_reaches_completed() {
        let (store, id) = seeded_store().await;
        let text = FakeText::new(
            vec![Ok(SCRIPT_JSON.to_string())],
            vec![Err("overloaded".to_string()), Ok(quiz_json())],
        );
        let p = pipeline(store.clone(), text, FakeVideo::ok());

        assert_matches!(p.process(id).await, Err(PipelineError::QuizGenerationFailed(_)));
        p.process(id).await.unwrap();

        let row = store.find(id).await.unwrap().unwrap();
        assert_eq!(row.status, GenerationStatus::Completed);
        assert_eq!(row.progress, 100);
        assert!(row.video_url.is_some());
    }

    #[tokio::test]
    async fn rerun_after_failure_restarts_at_queued() {
        let (store, id) = seeded_store().await;
        let text = FakeText::new(
            vec![Err("overloaded".to_string()), Ok(SCRIPT_JSON.to_string())],
            vec![Ok(quiz_json())],
        );
        let p = pipeline(store.clone(), text, FakeVideo::ok());

        assert!(p.process(id).await.is_err());
        p.process(id).await.unwrap();

        let progress: Vec<i16> = store.history(id).await.into_iter().map(|(_, p)| p).collect();
        assert_eq!(progress, [0, 10, 20, 0, 10, 20, 40, 60, 100]);
    }

    #[tokio::test]
    async fn interrupted_run_is_restarted_from_queued() {
        let (store, id) = seeded_store().await;
        store
            .apply_stage(id, StageUpdate::status(GenerationStatus::GeneratingQuiz))
            .await
            .unwrap();

        pipeline(store.clone(), FakeText::ok(), FakeVideo::ok())
            .process(id)
            .await
            .unwrap();

        let statuses: Vec<_> = store.history(id).await.into_iter().map(|(s, _)| s).collect();
        assert_eq!(
            statuses[1..4],
            [
                GenerationStatus::GeneratingQuiz,
                GenerationStatus::Failed,
                GenerationStatus::Queued,
            ]
        );
        assert_eq!(
            store.find(id).await.unwrap().unwrap().status,
            GenerationStatus::Completed
        );
    }

    /// Renders only after another delivery has completed the same record.
    struct RacingVideo {
        store: Arc<MemoryGenerationStore>,
        session_id: SessionId,
    }

    #[async_trait]
    impl VideoRenderer for RacingVideo {
        async fn render(&self, _narration: &str) -> Result<RenderedVideo, ProviderError> {
            let done = StageUpdate::status(GenerationStatus::Completed)
                .with_video("https://cdn.local/videos/winner.mp4".to_string(), None);
            self.store.apply_stage(self.session_id, done).await.unwrap();
            Err(ProviderError::Api {
                status: 503,
                body: "busy".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn late_failure_does_not_overwrite_completed() {
        let (store, id) = seeded_store().await;
        let video = RacingVideo {
            store: store.clone(),
            session_id: id,
        };
        let err = GenerationPipeline::new(store.clone(), Arc::new(FakeText::ok()), Arc::new(video))
            .process(id)
            .await
            .unwrap_err();

        assert_matches!(err, PipelineError::VideoGenerationFailed(_));
        let row = store.find(id).await.unwrap().unwrap();
        assert_eq!(row.status, GenerationStatus::Completed);
        assert_eq!(row.video_url.as_deref(), Some("https://cdn.local/videos/winner.mp4"));
    }

    #[tokio::test]
    async fn stage_write_after_completion_is_rejected() {
        let (store, id) = seeded_store().await;
        let p = pipeline(store.clone(), FakeText::ok(), FakeVideo::ok());
        p.process(id).await.unwrap();

        let err = p
            .advance(id, StageUpdate::status(GenerationStatus::GeneratingScript))
            .await
            .unwrap_err();
        assert_matches!(
            err,
            PipelineError::TransitionRejected {
                from: GenerationStatus::Completed,
                to: GenerationStatus::GeneratingScript,
                ..
            }
        );
        assert!(!err.is_retryable());
    }

    // -- failures --

    #[tokio::test]
    async fn unrecoverable_script_output_fails_the_record() {
        let (store, id) = seeded_store().await;
        let text = FakeText::new(
            vec![Ok("I cannot help with that.".to_string())],
            vec![Ok(quiz_json())],
        );
        let err = pipeline(store.clone(), text, FakeVideo::ok())
            .process(id)
            .await
            .unwrap_err();

        assert_matches!(err, PipelineError::ScriptGenerationFailed(_));
        assert!(err.is_retryable());
        let row = store.find(id).await.unwrap().unwrap();
        assert_eq!(row.status, GenerationStatus::Failed);
        assert_eq!(row.progress, 0);
        assert!(row.script.is_none());
    }

    #[tokio::test]
    async fn script_without_bullets_is_rejected() {
        let (store, id) = seeded_store().await;
        let text = FakeText::new(
            vec![Ok(r#"{"title":"Photosynthesis","bullets":[]}"#.to_string())],
            vec![Ok(quiz_json())],
        );
        let err = pipeline(store, text, FakeVideo::ok())
            .process(id)
            .await
            .unwrap_err();
        assert_matches!(err, PipelineError::ScriptGenerationFailed(_));
    }

    #[tokio::test]
    async fn quiz_failure_keeps_script() {
        let (store, id) = seeded_store().await;
        let text = FakeText::new(
            vec![Ok(SCRIPT_JSON.to_string())],
            vec![Ok(r#"{"questions":[]}"#.to_string())],
        );
        let err = pipeline(store.clone(), text, FakeVideo::ok())
            .process(id)
            .await
            .unwrap_err();

        assert_matches!(err, PipelineError::QuizGenerationFailed(_));
        let row = store.find(id).await.unwrap().unwrap();
        assert_eq!(row.status, GenerationStatus::Failed);
        assert_eq!(row.progress, 0);
        assert_eq!(row.script().unwrap().title, "Photosynthesis");
        assert!(row.quiz.is_none());
    }

    #[tokio::test]
    async fn quiz_answer_out_of_range_fails_the_record() {
        let (store, id) = seeded_store().await;
        let bad = serde_json::json!({
            "questions": [{
                "question": "What do leaves catch?",
                "options": ["Light", "Rocks", "Sound", "Heat"],
                "correctAnswer": 7,
                "explanation": ""
            }]
        });
        let text = FakeText::new(vec![Ok(SCRIPT_JSON.to_string())], vec![Ok(bad.to_string())]);
        let err = pipeline(store.clone(), text, FakeVideo::ok())
            .process(id)
            .await
            .unwrap_err();

        assert_matches!(err, PipelineError::QuizGenerationFailed(msg) if msg.contains("out of range"));
        let row = store.find(id).await.unwrap().unwrap();
        assert_eq!(row.status, GenerationStatus::Failed);
        assert!(row.quiz.is_none());
    }

    #[tokio::test]
    async fn blank_bullets_are_empty_script_content() {
        let (store, id) = seeded_store().await;
        let text = FakeText::new(
            vec![Ok(r#"{"title":"T","bullets":["  ", ""]}"#.to_string())],
            vec![Ok(quiz_json())],
        );
        let err = pipeline(store.clone(), text, FakeVideo::ok())
            .process(id)
            .await
            .unwrap_err();

        assert_matches!(err, PipelineError::EmptyScriptContent);
        let row = store.find(id).await.unwrap().unwrap();
        assert_eq!(row.status, GenerationStatus::Failed);
        assert!(row.script.is_some());
        assert!(row.quiz.is_some());
    }

    #[tokio::test]
    async fn empty_video_url_fails() {
        let (store, id) = seeded_store().await;
        let video = FakeVideo { url: " ".to_string() };
        let err = pipeline(store, FakeText::ok(), video)
            .process(id)
            .await
            .unwrap_err();
        assert_matches!(err, PipelineError::VideoGenerationFailed(_));
    }

    #[tokio::test]
    async fn missing_record_is_fatal() {
        let store = Arc::new(MemoryGenerationStore::new());
        let err = pipeline(store.clone(), FakeText::ok(), FakeVideo::ok())
            .process(new_session_id())
            .await
            .unwrap_err();

        assert_matches!(err, PipelineError::RecordNotFound(_));
        assert!(!err.is_retryable());
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_text_call_times_out() {
        let (store, id) = seeded_store().await;
        let mut text = FakeText::ok();
        text.delay = Some(Duration::from_secs(300));
        let err = pipeline(store.clone(), text, FakeVideo::ok())
            .with_timeouts(Duration::from_secs(5), Duration::from_secs(5))
            .process(id)
            .await
            .unwrap_err();

        assert_matches!(err, PipelineError::ScriptGenerationFailed(msg) if msg.contains("timed out"));
        let row = store.find(id).await.unwrap().unwrap();
        assert_eq!(row.status, GenerationStatus::Failed);
    }
}
