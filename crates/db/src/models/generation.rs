//! Generation request models and client-facing projections.

use neurovid_core::content::{Quiz, Script};
use neurovid_core::generation::GenerationStatus;
use neurovid_core::types::{SessionId, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `generations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub session_id: SessionId,
    #[sqlx(rename = "user_id")]
    pub owner_id: String,
    pub topic: String,
    pub details: String,
    pub category: Option<String>,
    pub language: String,
    #[sqlx(rename = "duration")]
    #[serde(rename = "duration")]
    pub duration_minutes: i32,
    pub style: String,
    #[sqlx(try_from = "String")]
    pub status: GenerationStatus,
    pub progress: i16,
    pub script: Option<Json<Script>>,
    pub quiz: Option<Json<Quiz>>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Generation {
    pub fn script(&self) -> Option<&Script> {
        self.script.as_ref().map(|json| &json.0)
    }

    pub fn quiz(&self) -> Option<&Quiz> {
        self.quiz.as_ref().map(|json| &json.0)
    }
}

/// Insert DTO for a fresh request. Status and progress always start at
/// `CREATED` / 0.
#[derive(Debug, Clone)]
pub struct CreateGeneration {
    pub session_id: SessionId,
    pub owner_id: String,
    pub topic: String,
    pub details: String,
    pub category: Option<String>,
    pub language: String,
    pub duration_minutes: i32,
    pub style: String,
}

/// One worker-side mutation: a status (progress is derived from it) plus
/// any outputs that become available with it.
///
/// Outputs left as `None` keep whatever is already stored, so recording
/// `FAILED` never erases a script or quiz written earlier.
#[derive(Debug, Clone, PartialEq)]
pub struct StageUpdate {
    pub status: GenerationStatus,
    pub script: Option<Script>,
    pub quiz: Option<Quiz>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl StageUpdate {
    pub fn status(status: GenerationStatus) -> Self {
        Self {
            status,
            script: None,
            quiz: None,
            video_url: None,
            thumbnail_url: None,
        }
    }

    pub fn failed() -> Self {
        Self::status(GenerationStatus::Failed)
    }

    pub fn with_script(mut self, script: Script) -> Self {
        self.script = Some(script);
        self
    }

    pub fn with_quiz(mut self, quiz: Quiz) -> Self {
        self.quiz = Some(quiz);
        self
    }

    pub fn with_video(mut self, video_url: String, thumbnail_url: Option<String>) -> Self {
        self.video_url = Some(video_url);
        self.thumbnail_url = thumbnail_url;
        self
    }

    pub fn progress(&self) -> i16 {
        self.status.progress()
    }
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// Lightweight polling view: `{ status, progress, videoUrl }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatusView {
    pub status: GenerationStatus,
    pub progress: i16,
    pub video_url: Option<String>,
}

impl From<&Generation> for GenerationStatusView {
    fn from(g: &Generation) -> Self {
        Self {
            status: g.status,
            progress: g.progress,
            video_url: g.video_url.clone(),
        }
    }
}

/// Dashboard card for `GET /api/generate/recent`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentGeneration {
    pub id: SessionId,
    pub title: String,
    pub duration: i32,
    pub created_at: Timestamp,
    pub thumbnail: Option<String>,
    pub status: GenerationStatus,
}

impl From<&Generation> for RecentGeneration {
    fn from(g: &Generation) -> Self {
        Self {
            id: g.session_id,
            title: g.topic.clone(),
            duration: g.duration_minutes,
            created_at: g.created_at,
            thumbnail: g.thumbnail_url.clone(),
            status: g.status,
        }
    }
}
