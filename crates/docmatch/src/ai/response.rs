use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::AnalysisError;

static RE_JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```[ \t]*json[ \t]*\r?\n?(.*?)```").unwrap());
static RE_ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n`]*\n(.*?)```").unwrap());

/// Parses a model reply that should contain JSON.
///
/// A fenced block labelled `json` wins. Without one the whole reply must be
/// JSON, with an unlabelled fence accepted as a last resort. Anything else
/// is `MalformedResponse`.
pub fn parse_json_response(raw: &str) -> Result<Value, AnalysisError> {
    if let Some(block) = RE_JSON_FENCE.captures(raw).and_then(|c| c.get(1)) {
        return serde_json::from_str(block.as_str().trim()).map_err(|e| {
            AnalysisError::MalformedResponse(format!("fenced JSON block is invalid: {}", e))
        });
    }

    let trimmed = raw.trim();
    let whole_error = match serde_json::from_str(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let Some(block) = RE_ANY_FENCE.captures(raw).and_then(|c| c.get(1)) {
        if let Ok(value) = serde_json::from_str(block.as_str().trim()) {
            return Ok(value);
        }
    }

    Err(AnalysisError::MalformedResponse(format!(
        "response is not JSON ({}): {}",
        whole_error,
        preview(trimmed)
    )))
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{}...", cut)
    }
}
