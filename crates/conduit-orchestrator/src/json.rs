//! Structured output recovery from free-text model responses.
//!
//! Models asked for JSON still wrap it in Markdown fences or surround it with
//! prose. Everything that needs structured model output goes through
//! [`extract_json_object`].

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// Failure to recover a JSON object from model output.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JsonExtractError {
    /// No parseable `{...}` object in the text.
    #[error("no JSON object found in model response")]
    NotFound,

    /// An object was found but does not have the expected shape.
    #[error("unexpected JSON shape: {0}")]
    Shape(String),
}

/// Returns the body of the first fenced code block, or the trimmed input if
/// there is no fence.
///
/// An unterminated fence yields everything after the opening line.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };

    let after_marker = &trimmed[open + 3..];
    // Skip the info string ("json", "JSON", ...) on the opening line.
    let body = match after_marker.find('\n') {
        Some(newline) => &after_marker[newline + 1..],
        None => after_marker.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Extracts the first JSON object from a model response.
///
/// Tries the fence-stripped text as a whole first, then falls back to the
/// first balanced `{...}` span that parses.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, JsonExtractError> {
    let cleaned = strip_code_fences(text);

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(cleaned) {
        return Ok(map);
    }

    // Prose around the object, or a fence we could not make sense of.
    for candidate in [cleaned, text] {
        if let Some(map) = first_balanced_object(candidate) {
            return Ok(map);
        }
    }

    Err(JsonExtractError::NotFound)
}

/// Parses the fence-stripped response as a single JSON object.
///
/// Unlike [`extract_json_object`] this never looks inside prose, so a
/// sentence that merely contains braces is not mistaken for output.
pub fn parse_json_body(text: &str) -> Result<Map<String, Value>, JsonExtractError> {
    serde_json::from_str::<Map<String, Value>>(strip_code_fences(text)).map_err(|_| JsonExtractError::NotFound)
}

/// Extracts the first JSON object and deserializes it into `T`.
pub fn parse_json_as<T: DeserializeOwned>(text: &str) -> Result<T, JsonExtractError> {
    let map = extract_json_object(text)?;
    serde_json::from_value(Value::Object(map)).map_err(|e| JsonExtractError::Shape(e.to_string()))
}

fn first_balanced_object(text: &str) -> Option<Map<String, Value>> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = matching_brace(&bytes[start..]) {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&text[start..=start + end]) {
                return Some(map);
            }
        }
        search_from = start + 1;
    }

    None
}

/// Index of the brace closing the object that starts at `bytes[0]`.
fn matching_brace(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}
