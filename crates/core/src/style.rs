//! Teaching styles derived from the style survey and the prompt instruction
//! each one maps to.

use serde::{Deserialize, Serialize};

/// Dominant quadrant reported by the style survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeachingStyle {
    Left,
    Right,
    Balanced,
    None,
}

/// Instruction used when the style tag is unknown or carries no preference.
pub const DEFAULT_STYLE_INSTRUCTION: &str = "clear, beginner-friendly explanation";

impl TeachingStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Balanced => "balanced",
            Self::None => "none",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "balanced" => Some(Self::Balanced),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            Self::Left => "structured, logical, step-by-step explanation",
            Self::Right => "story-driven, visual, emotional narration",
            Self::Balanced => "mixed logical and visual explanation",
            Self::None => DEFAULT_STYLE_INSTRUCTION,
        }
    }
}

/// Prompt instruction for a stored style tag, falling back to
/// [`DEFAULT_STYLE_INSTRUCTION`] for unknown or missing tags.
pub fn instruction_for(tag: &str) -> &'static str {
    TeachingStyle::parse(tag.trim())
        .map(TeachingStyle::instruction)
        .unwrap_or(DEFAULT_STYLE_INSTRUCTION)
}
