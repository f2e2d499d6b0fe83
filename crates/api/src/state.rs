use std::sync::Arc;

use neurovid_db::DbPool;
use neurovid_pipeline::{GenerationStore, IntakeService, JobQueue, StatusService, SurveyStore};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Present when running against PostgreSQL; used by the health check.
    pub pool: Option<DbPool>,
    pub surveys: Arc<dyn SurveyStore>,
    pub queue: Arc<dyn JobQueue>,
    pub intake: Arc<IntakeService>,
    pub status: Arc<StatusService>,
}

impl AppState {
    /// Wire the services over the given storage and queue backends.
    pub fn new(
        config: ServerConfig,
        pool: Option<DbPool>,
        generations: Arc<dyn GenerationStore>,
        surveys: Arc<dyn SurveyStore>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        let intake = IntakeService::new(
            Arc::clone(&generations),
            Arc::clone(&surveys),
            Arc::clone(&queue),
            config.generation_quota,
        );
        let status = StatusService::new(generations);

        Self {
            config: Arc::new(config),
            pool,
            surveys,
            queue,
            intake: Arc::new(intake),
            status: Arc::new(status),
        }
    }
}
