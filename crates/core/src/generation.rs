//! Generation lifecycle: status values, the status→progress mapping, and the
//! transition rules the worker follows.
//!
//! ```text
//! CREATED -> QUEUED -> GENERATING_SCRIPT -> GENERATING_QUIZ -> GENERATING_VIDEO -> COMPLETED
//!     \________\______________\____________________\__________________\--> FAILED
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of one generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    Created,
    Queued,
    GeneratingScript,
    GeneratingQuiz,
    GeneratingVideo,
    Completed,
    Failed,
}

/// Every status, in pipeline order (FAILED last).
pub const ALL_STATUSES: [GenerationStatus; 7] = [
    GenerationStatus::Created,
    GenerationStatus::Queued,
    GenerationStatus::GeneratingScript,
    GenerationStatus::GeneratingQuiz,
    GenerationStatus::GeneratingVideo,
    GenerationStatus::Completed,
    GenerationStatus::Failed,
];

impl GenerationStatus {
    /// Wire / database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Queued => "QUEUED",
            Self::GeneratingScript => "GENERATING_SCRIPT",
            Self::GeneratingQuiz => "GENERATING_QUIZ",
            Self::GeneratingVideo => "GENERATING_VIDEO",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Progress percentage shown to polling clients for this status.
    ///
    /// `FAILED` reports 0 so clients stop watching.
    pub fn progress(self) -> i16 {
        match self {
            Self::Created => 0,
            Self::Queued => 10,
            Self::GeneratingScript => 20,
            Self::GeneratingQuiz => 40,
            Self::GeneratingVideo => 60,
            Self::Completed => 100,
            Self::Failed => 0,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position along the happy path. `FAILED` has no rank.
    fn rank(self) -> Option<u8> {
        match self {
            Self::Created => Some(0),
            Self::Queued => Some(1),
            Self::GeneratingScript => Some(2),
            Self::GeneratingQuiz => Some(3),
            Self::GeneratingVideo => Some(4),
            Self::Completed => Some(5),
            Self::Failed => None,
        }
    }

    /// Whether the worker may move a record from `self` to `next`.
    ///
    /// - Forward moves along the happy path are allowed (re-entering the
    ///   current state is an idempotent overwrite).
    /// - Any non-terminal state may move to `FAILED`.
    /// - `FAILED` may restart at `QUEUED` or `GENERATING_SCRIPT`: this is the
    ///   retry-from-scratch path taken when the queue redelivers the job.
    /// - `COMPLETED` is final.
    pub fn can_transition_to(self, next: GenerationStatus) -> bool {
        match (self, next) {
            (Self::Completed, _) => false,
            (Self::Failed, Self::Queued | Self::GeneratingScript | Self::Failed) => true,
            (Self::Failed, _) => false,
            (_, Self::Failed) => true,
            (from, to) => match (from.rank(), to.rank()) {
                (Some(a), Some(b)) => b >= a,
                _ => false,
            },
        }
    }

    /// Statuses a record may currently hold for a move to `self` to be
    /// accepted. Stores use this to guard every stage write.
    pub fn predecessors(self) -> Vec<GenerationStatus> {
        ALL_STATUSES
            .into_iter()
            .filter(|from| from.can_transition_to(self))
            .collect()
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_STATUSES
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown generation status '{s}'")))
    }
}

impl TryFrom<String> for GenerationStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
