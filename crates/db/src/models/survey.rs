//! Style survey models.

use neurovid_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `style_surveys` table.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    pub id: i64,
    #[sqlx(rename = "user_id")]
    pub owner_id: String,
    pub left_score: i32,
    pub right_score: i32,
    pub dominant_quadrant: String,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct CreateSurvey {
    pub owner_id: String,
    pub left_score: i32,
    pub right_score: i32,
    pub dominant_quadrant: String,
}
