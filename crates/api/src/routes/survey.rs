use axum::routing::{get, post};
use axum::Router;

use crate::handlers::survey;
use crate::state::AppState;

/// Routes mounted at `/survey`.
///
/// ```text
/// GET    /surveyData     -> get_survey
/// POST   /submitSurvey   -> submit_survey
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/surveyData", get(survey::get_survey))
        .route("/submitSurvey", post(survey::submit_survey))
}
