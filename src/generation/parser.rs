//! JSON recovery from model text.
//!
//! Attempts, in order: the whole trimmed text, the first fenced block tagged
//! `json`, then the span from the first `{` to the last `}`.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```json[ \t]*\r?\n?(.*?)```").expect("valid regex"));

/// Model text that yields no JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Model returned no text content")]
    Empty,

    #[error("Could not extract a JSON object from model output: {0}")]
    NoJson(String),
}

/// Recover a JSON value from arbitrary model text.
pub fn extract_json(raw: &str) -> Result<Value, ParseError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let direct_error = match serde_json::from_str::<Value>(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let Some(body) = JSON_FENCE.captures(text).and_then(|c| c.get(1)) {
        if let Ok(value) = serde_json::from_str::<Value>(body.as_str().trim()) {
            return Ok(value);
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(ParseError::NoJson(direct_error.to_string()))
}
