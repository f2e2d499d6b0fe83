//! Intake rules: request validation and the per-principal quota.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Lifetime number of generation requests a principal may hold.
pub const GENERATION_QUOTA: i64 = 3;

pub const MIN_DURATION_MINUTES: i32 = 1;
pub const MAX_DURATION_MINUTES: i32 = 10;

pub const DEFAULT_LANGUAGE: &str = "en";

pub const MAX_TOPIC_LEN: usize = 200;
pub const MAX_DETAILS_LEN: usize = 2000;
pub const MAX_CATEGORY_LEN: usize = 100;
pub const MAX_LANGUAGE_LEN: usize = 10;

// ---------------------------------------------------------------------------
// Request DTO
// ---------------------------------------------------------------------------

/// Body of `POST /api/generate/submitGeneration`.
///
/// Every field is optional at the serde level so that missing fields are
/// reported as validation errors rather than deserialization rejections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitGeneration {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub duration: Option<i32>,
}

/// A submission that passed [`SubmitGeneration::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSubmission {
    pub topic: String,
    pub details: String,
    pub category: Option<String>,
    pub language: String,
    pub duration_minutes: i32,
}

impl SubmitGeneration {
    pub fn validate(self) -> Result<ValidatedSubmission, CoreError> {
        let topic = required_text("topic", self.topic, MAX_TOPIC_LEN)?;
        let details = required_text("details", self.details, MAX_DETAILS_LEN)?;

        let duration_minutes = self
            .duration
            .ok_or_else(|| CoreError::Validation("duration is required".to_string()))?;
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
            return Err(CoreError::Validation(format!(
                "duration must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES} minutes"
            )));
        }

        let category = optional_text("category", self.category, MAX_CATEGORY_LEN)?;
        let language = optional_text("language", self.language, MAX_LANGUAGE_LEN)?
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        Ok(ValidatedSubmission {
            topic,
            details,
            category,
            language,
            duration_minutes,
        })
    }
}

fn required_text(field: &str, value: Option<String>, max_len: usize) -> Result<String, CoreError> {
    optional_text(field, value, max_len)?
        .ok_or_else(|| CoreError::Validation(format!("{field} is required")))
}

/// Trim `value`; blank becomes `None`; over-long is an error.
fn optional_text(
    field: &str,
    value: Option<String>,
    max_len: usize,
) -> Result<Option<String>, CoreError> {
    let Some(trimmed) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if trimmed.chars().count() > max_len {
        return Err(CoreError::Validation(format!(
            "{field} must be at most {max_len} characters"
        )));
    }
    Ok(Some(trimmed))
}

// ---------------------------------------------------------------------------
// Quota
// ---------------------------------------------------------------------------

/// Quota state returned to clients on submit and on rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaSnapshot {
    pub limit: i64,
    pub used: i64,
    pub remaining: i64,
}

impl QuotaSnapshot {
    pub fn new(limit: i64, used: i64) -> Self {
        Self {
            limit,
            used,
            remaining: (limit - used).max(0),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
