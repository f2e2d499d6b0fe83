//! Parsing of free-text model responses that are supposed to be JSON.
//!
//! Models frequently wrap JSON in prose or Markdown fences. [`parse_model_json`]
//! is the single entry point: it tries the raw text first, then the first
//! balanced `{...}` object, then the widest `{...}` span.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;

/// Number of characters of the raw response kept in error messages.
const PREVIEW_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum ModelOutputError {
    /// No candidate substring parsed as the expected JSON shape.
    #[error("Non-JSON model response: {preview}")]
    NotJson { preview: String },
}

/// Parse `raw` as `T`, recovering JSON embedded in surrounding text.
pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> Result<T, ModelOutputError> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Ok(value);
    }

    if let Some(candidate) = first_balanced_object(trimmed) {
        if let Ok(value) = serde_json::from_str::<T>(candidate) {
            return Ok(value);
        }
    }

    if let Some(candidate) = widest_brace_span(trimmed) {
        if let Ok(value) = serde_json::from_str::<T>(candidate) {
            return Ok(value);
        }
    }

    Err(ModelOutputError::NotJson {
        preview: trimmed.chars().take(PREVIEW_CHARS).collect(),
    })
}

/// Return the first `{...}` substring whose braces balance, ignoring braces
/// inside JSON string literals.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }

    None
}

/// From the first `{` to the last `}` (greedy, across lines).
fn widest_brace_span(text: &str) -> Option<&str> {
    static SPAN: OnceLock<Regex> = OnceLock::new();
    let re = SPAN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static regex is valid"));
    re.find(text).map(|m| m.as_str())
}
