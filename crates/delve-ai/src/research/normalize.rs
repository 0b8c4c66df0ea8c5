//! Turn a completed run's output into display text.
//!
//! Outputs come in three shapes: plain text, an object carrying a `content`
//! field, or any other JSON value.

use serde_json::Value;

/// Normalize a run output.
///
/// - text is returned unchanged
/// - an object with a truthy `content` field yields that field, pretty-printed
/// - anything else is pretty-printed whole
///
/// `content` counts as empty when it is `null`, `false`, `0` or `""`.
pub fn normalize(output: &Value) -> String {
    match output {
        Value::String(text) => text.clone(),
        Value::Object(map) => match map.get("content") {
            Some(content) if is_truthy(content) => pretty(content),
            _ => pretty(output),
        },
        other => pretty(other),
    }
}

/// Normalize an optional output; a missing output is empty text.
pub fn normalize_output(output: Option<&Value>) -> String {
    output.map(normalize).unwrap_or_default()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
