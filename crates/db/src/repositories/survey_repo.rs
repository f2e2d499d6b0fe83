//! Repository for the `style_surveys` table.

use sqlx::PgPool;

use crate::models::survey::{CreateSurvey, Survey};

/// Column list for `style_surveys` queries.
const COLUMNS: &str = "\
    id, user_id, left_score, right_score, dominant_quadrant, completed_at, created_at";

/// Provides persistence for completed style surveys.
pub struct SurveyRepo;

impl SurveyRepo {
    pub async fn find_by_owner(pool: &PgPool, owner_id: &str) -> Result<Option<Survey>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM style_surveys WHERE user_id = $1");
        sqlx::query_as::<_, Survey>(&query)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// Record a completed survey.
    ///
    /// Returns `None` if the owner already has one; surveys are taken once.
    pub async fn create(pool: &PgPool, input: &CreateSurvey) -> Result<Option<Survey>, sqlx::Error> {
        let query = format!(
            "INSERT INTO style_surveys \
                 (user_id, left_score, right_score, dominant_quadrant, completed_at) \
             VALUES ($1, $2, $3, $4, NOW()) \
             ON CONFLICT (user_id) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Survey>(&query)
            .bind(&input.owner_id)
            .bind(input.left_score)
            .bind(input.right_score)
            .bind(&input.dominant_quadrant)
            .fetch_optional(pool)
            .await
    }
}
