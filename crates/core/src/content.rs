//! Structured outputs produced by the text model: the narration script and
//! the comprehension quiz.

use serde::{Deserialize, Serialize};

/// Number of questions requested from the model for each quiz.
pub const QUIZ_QUESTION_COUNT: usize = 5;

/// Number of answer options per question.
pub const QUIZ_OPTION_COUNT: usize = 4;

// ---------------------------------------------------------------------------
// Script
// ---------------------------------------------------------------------------

/// Narration script: a title and ordered narration bullets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub bullets: Vec<String>,
}

impl Script {
    /// A usable script has a non-blank title and at least one bullet.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("script title is empty".to_string());
        }
        if self.bullets.is_empty() {
            return Err("script has no bullets".to_string());
        }
        Ok(())
    }

    /// Flat narration text handed to the video renderer.
    ///
    /// Bullets are joined with a blank line; with no bullets the title is
    /// used instead. The result may be blank and callers must check.
    pub fn narration(&self) -> String {
        if self.bullets.is_empty() {
            self.title.trim().to_string()
        } else {
            self.bullets.join("\n\n")
        }
    }
}

// ---------------------------------------------------------------------------
// Quiz
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Zero-based index into `options`.
    pub correct_answer: usize,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    /// A usable quiz has at least one question, and every question offers a
    /// choice whose `correct_answer` points at one of its options.
    pub fn validate(&self) -> Result<(), String> {
        if self.questions.is_empty() {
            return Err("quiz has no questions".to_string());
        }
        for (i, q) in self.questions.iter().enumerate() {
            if q.options.len() < 2 {
                return Err(format!("question {} has {} options", i + 1, q.options.len()));
            }
            if q.correct_answer >= q.options.len() {
                return Err(format!(
                    "question {} answer index {} is out of range for {} options",
                    i + 1,
                    q.correct_answer,
                    q.options.len()
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
