//! Bounded repair loop for near-valid JSON.
//!
//! Judge models and upstream generators occasionally emit JSON with a missing
//! separator between adjacent blocks or trailing prose after the payload.
//! Each repair attempt applies one strict textual transformation and retries
//! the parse; the loop never revisits an attempt, so it always terminates.

use serde_json::Value;

use crate::error::ScoreError;

/// Parse attempts: raw, outermost slice, separator insertion, trailing trim.
const MAX_REPAIR_ATTEMPTS: usize = 4;

/// Parses `raw` as JSON, applying up to [`MAX_REPAIR_ATTEMPTS`] fix-ups
/// before giving up with [`ScoreError::Format`].
pub fn parse_lenient(raw: &str) -> Result<Value, ScoreError> {
    let mut text = raw.trim().to_string();
    let mut last_error = String::new();

    for attempt in 0..MAX_REPAIR_ATTEMPTS {
        match serde_json::from_str(&text) {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(attempt, "parsed JSON after repair");
                }
                return Ok(value);
            }
            Err(err) => last_error = err.to_string(),
        }
        text = match attempt {
            0 => slice_outermost(&text).unwrap_or(text),
            1 => insert_missing_separators(&text),
            2 => trim_trailing_garbage(&text),
            _ => break,
        };
    }

    Err(ScoreError::Format {
        attempts: MAX_REPAIR_ATTEMPTS,
        detail: last_error,
    })
}

/// Cuts the text down to its outermost bracket pair, dropping any prose the
/// producer wrapped around the payload.
fn slice_outermost(text: &str) -> Option<String> {
    let start = text.find(['{', '['])?;
    let end = text.rfind(['}', ']'])?;
    if end <= start {
        return None;
    }
    Some(text[start..=end].to_string())
}

/// Inserts the comma a producer dropped between two adjacent blocks:
/// after a closing brace/bracket whose next significant character opens a
/// new value. String contents are left untouched.
fn insert_missing_separators(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let chars: Vec<char> = text.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        out.push(c);
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '}' | ']' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if matches!(next, Some('{') | Some('[') | Some('"')) {
                    out.push(',');
                }
            }
            _ => {}
        }
    }
    out
}

/// Pops trailing characters until the text ends on a closing bracket.
fn trim_trailing_garbage(text: &str) -> String {
    let mut out = text.to_string();
    while !(out.is_empty() || out.ends_with('}') || out.ends_with(']')) {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_json_passes_through() {
        let value = parse_lenient(r#"{"a": 1}"#).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn strips_surrounding_prose() {
        let value = parse_lenient("Here is the result:\n{\"score\": 0.5}\nHope that helps!").unwrap();
        assert_eq!(value["score"], 0.5);
    }

    #[test]
    fn inserts_missing_separator_between_blocks() {
        let value = parse_lenient(r#"[{"heading": "A", "text": "x"} {"heading": "B", "text": "y"}]"#)
            .unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn braces_inside_strings_are_not_touched() {
        let value = parse_lenient(r#"{"text": "set {x} and {y}"}"#).unwrap();
        assert_eq!(value["text"], "set {x} and {y}");
    }

    #[test]
    fn hopeless_input_is_a_format_error() {
        let err = parse_lenient("not json at all").unwrap_err();
        assert!(matches!(err, ScoreError::Format { .. }));
    }
}
