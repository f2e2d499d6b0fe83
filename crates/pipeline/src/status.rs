//! Read-only projections of generation records for polling clients.

use std::sync::Arc;

use neurovid_core::error::CoreError;
use neurovid_core::types::SessionId;
use neurovid_db::models::generation::{Generation, GenerationStatusView, RecentGeneration};

use crate::error::ServiceError;
use crate::store::GenerationStore;

/// Default number of recent generations returned.
pub const DEFAULT_RECENT_LIMIT: i64 = 3;

/// Maximum number of recent generations returned.
pub const MAX_RECENT_LIMIT: i64 = 10;

/// Resolve a client-supplied `limit`: missing or non-positive values use the
/// default, larger values are capped.
pub fn clamp_recent_limit(limit: Option<i64>) -> i64 {
    limit
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .min(MAX_RECENT_LIMIT)
}

pub struct StatusService {
    generations: Arc<dyn GenerationStore>,
}

impl StatusService {
    pub fn new(generations: Arc<dyn GenerationStore>) -> Self {
        Self { generations }
    }

    /// Lightweight status for polling. Not ownership-checked.
    pub async fn status(&self, session_id: SessionId) -> Result<GenerationStatusView, ServiceError> {
        let generation = self.load(session_id).await?;
        Ok(GenerationStatusView::from(&generation))
    }

    /// Full record, visible to its owner only.
    pub async fn session(
        &self,
        owner_id: &str,
        session_id: SessionId,
    ) -> Result<Generation, ServiceError> {
        let generation = self.load(session_id).await?;
        if generation.owner_id != owner_id {
            return Err(CoreError::Forbidden("Forbidden".to_string()).into());
        }
        Ok(generation)
    }

    pub async fn recent(
        &self,
        owner_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<RecentGeneration>, ServiceError> {
        let rows = self
            .generations
            .list_recent(owner_id, clamp_recent_limit(limit))
            .await?;
        Ok(rows.iter().map(RecentGeneration::from).collect())
    }

    /// The owner's newest record.
    pub async fn latest(&self, owner_id: &str) -> Result<Generation, ServiceError> {
        self.generations
            .find_latest(owner_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "Generation",
                    id: owner_id.to_string(),
                }
                .into()
            })
    }

    async fn load(&self, session_id: SessionId) -> Result<Generation, ServiceError> {
        self.generations.find(session_id).await?.ok_or_else(|| {
            CoreError::NotFound {
                entity: "Generation",
                id: session_id.to_string(),
            }
            .into()
        })
    }
}
