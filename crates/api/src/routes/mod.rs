pub mod generation;
pub mod health;
pub mod survey;

use axum::Router;

use crate::state::AppState;

/// Routes mounted under `/api`.
///
/// ```text
/// /generate   generation submission and polling
/// /survey     style survey
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/generate", generation::router())
        .nest("/survey", survey::router())
}
