//! Handlers for the `/survey` resource. All endpoints require authentication.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use neurovid_core::error::CoreError;
use neurovid_core::survey::SubmitSurvey;
use neurovid_db::models::survey::{CreateSurvey, Survey};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// GET /api/survey/surveyData
pub async fn get_survey(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Survey>> {
    let survey = state
        .surveys
        .find_by_owner(&auth.principal_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Survey",
                id: auth.principal_id.clone(),
            })
        })?;
    Ok(Json(survey))
}

/// POST /api/survey/submitSurvey
///
/// A principal completes the survey once; a second submission is a 409.
pub async fn submit_survey(
    auth: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<SubmitSurvey>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = body.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let survey = input.validate()?;

    let created = state
        .surveys
        .create(CreateSurvey {
            owner_id: auth.principal_id.clone(),
            left_score: survey.left_score,
            right_score: survey.right_score,
            dominant_quadrant: survey.dominant.as_str().to_string(),
        })
        .await?;

    if created.is_none() {
        return Err(AppError::Core(CoreError::Conflict(
            "Brain dominance survey already completed".into(),
        )));
    }

    tracing::info!(
        principal_id = %auth.principal_id,
        dominant = survey.dominant.as_str(),
        "Survey submitted",
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Survey submitted successfully" })),
    ))
}
