use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Routes mounted at `/generate`.
///
/// ```text
/// POST   /submitGeneration     -> submit_generation
/// GET    /status/{sessionId}   -> get_status      (no auth)
/// GET    /session/{sessionId}  -> get_session
/// GET    /recent               -> get_recent
/// GET    /getGeneration        -> get_latest
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/submitGeneration", post(generation::submit_generation))
        .route("/status/{session_id}", get(generation::get_status))
        .route("/session/{session_id}", get(generation::get_session))
        .route("/recent", get(generation::get_recent))
        .route("/getGeneration", get(generation::get_latest))
}
