//! Wire contract for generation jobs: job kind, payload and retry
//! options.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::SessionId;

/// Job kind for a full script → quiz → video run.
pub const GENERATION_JOB_KIND: &str = "generation-job";

/// Total attempts per job, including the first.
pub const DEFAULT_ATTEMPTS: i32 = 3;

/// Last error recorded on a job held because its final attempt's lease ran
/// out.
pub const LEASE_EXHAUSTED: &str = "Lease expired on final attempt";

/// Base delay of the exponential backoff between attempts.
pub const DEFAULT_BACKOFF_DELAY_MS: i64 = 8_000;

/// Payload carried by every generation job. Exactly `{ "sessionId": ... }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JobPayload {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

impl BackoffKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Exponential => "exponential",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fixed" => Some(Self::Fixed),
            "exponential" => Some(Self::Exponential),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backoff {
    #[serde(rename = "type")]
    pub kind: BackoffKind,
    /// Base delay in milliseconds.
    pub delay: i64,
}

impl Backoff {
    /// Delay before the next attempt after `attempts_made` attempts failed.
    ///
    /// Exponential backoff doubles per attempt: with an 8 s base the waits
    /// are 8 s, 16 s, 32 s, ...
    pub fn delay_for(&self, attempts_made: i32) -> Duration {
        let base = self.delay.max(0) as u64;
        let millis = match self.kind {
            BackoffKind::Fixed => base,
            BackoffKind::Exponential => {
                let exponent = attempts_made.saturating_sub(1).clamp(0, 20) as u32;
                base.saturating_mul(1u64 << exponent)
            }
        };
        Duration::from_millis(millis)
    }
}

/// Options attached to a job at enqueue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    pub attempts: i32,
    pub backoff: Backoff,
}

impl Default for JobOptions {
    /// `{ attempts: 3, backoff: { type: "exponential", delay: 8000 } }`
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff: Backoff {
                kind: BackoffKind::Exponential,
                delay: DEFAULT_BACKOFF_DELAY_MS,
            },
        }
    }
}
