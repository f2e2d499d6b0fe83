//! Style survey submission rules.

use serde::Deserialize;

use crate::error::CoreError;
use crate::style::TeachingStyle;

pub const MIN_SURVEY_SCORE: i32 = 0;
pub const MAX_SURVEY_SCORE: i32 = 100;

/// Body of `POST /api/survey/submitSurvey`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSurvey {
    pub left_score: Option<i32>,
    pub right_score: Option<i32>,
    pub dominant_quadrant: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedSurvey {
    pub left_score: i32,
    pub right_score: i32,
    pub dominant: TeachingStyle,
}

impl SubmitSurvey {
    pub fn validate(self) -> Result<ValidatedSurvey, CoreError> {
        let left_score = score("leftScore", self.left_score)?;
        let right_score = score("rightScore", self.right_score)?;
        let dominant = self
            .dominant_quadrant
            .as_deref()
            .and_then(TeachingStyle::parse)
            .ok_or_else(|| {
                CoreError::Validation(
                    "dominantQuadrant must be one of: left, right, balanced, none".to_string(),
                )
            })?;
        Ok(ValidatedSurvey {
            left_score,
            right_score,
            dominant,
        })
    }
}

fn score(field: &str, value: Option<i32>) -> Result<i32, CoreError> {
    match value {
        Some(v) if (MIN_SURVEY_SCORE..=MAX_SURVEY_SCORE).contains(&v) => Ok(v),
        _ => Err(CoreError::Validation(format!(
            "{field} must be a number between {MIN_SURVEY_SCORE} and {MAX_SURVEY_SCORE}"
        ))),
    }
}
