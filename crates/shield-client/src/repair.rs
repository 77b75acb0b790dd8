//! Turning model text into a JSON object.
//!
//! Models wrap JSON in code fences, add prose around it, leave trailing
//! commas and stop mid-object. [`parse_payload`] strips fences and tries a
//! direct parse; only when that fails does [`JsonRepair`] get a go.
//!
//! Repair is deliberately narrow. It never invents keys or values: when the
//! text is too broken to close with a couple of braces it gives up with
//! `repair_failed`.

use serde_json::Value;
use tracing::debug;

use crate::error::{InvocationError, Result};

/// Most closing braces repair will append to a truncated object.
pub const MAX_MISSING_BRACES: usize = 2;

/// Removes a surrounding ```` ```json ```` or ```` ``` ```` fence, if any.
///
/// ```rust
/// use shield_client::strip_code_fences;
///
/// assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
/// assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
/// ```
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let inner = match trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    {
        Some(rest) => rest,
        None => return trimmed,
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Conservative repair of almost-JSON object text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonRepair {
    max_missing_braces: usize,
}

impl JsonRepair {
    pub const fn new() -> Self {
        Self {
            max_missing_braces: MAX_MISSING_BRACES,
        }
    }

    #[must_use]
    pub const fn with_max_missing_braces(mut self, max: usize) -> Self {
        self.max_missing_braces = max;
        self
    }

    /// Repaired object text, not yet parsed.
    ///
    /// 1. Keep the span from the first `{` to the last `}`.
    /// 2. Drop commas directly before `}` or `]`, outside string literals.
    /// 3. Append up to `max_missing_braces` closing braces.
    ///
    /// # Errors
    ///
    /// [`InvocationError::RepairFailed`] when there is no `{`, no `}` after
    /// it, or more braces are missing than allowed.
    pub fn repair(&self, text: &str) -> Result<String> {
        let start = text
            .find('{')
            .ok_or_else(|| InvocationError::RepairFailed("no JSON object found".into()))?;
        let span = match text.rfind('}') {
            Some(end) if end > start => &text[start..=end],
            _ => {
                return Err(InvocationError::RepairFailed(
                    "no closing brace after the opening brace".into(),
                ))
            }
        };

        let mut repaired = remove_trailing_commas(span);

        let missing = unclosed_braces(&repaired);
        if missing > 0 {
            let missing = missing.unsigned_abs();
            if missing > self.max_missing_braces {
                return Err(InvocationError::RepairFailed(format!(
                    "{missing} unclosed braces exceeds limit of {}",
                    self.max_missing_braces
                )));
            }
            debug!("Appending {} closing braces", missing);
            repaired.extend(std::iter::repeat('}').take(missing));
        }

        Ok(repaired)
    }
}

impl Default for JsonRepair {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses model text as a JSON object, repairing it if needed.
///
/// # Errors
///
/// [`InvocationError::RepairFailed`] when neither the direct parse nor the
/// repaired text yields a JSON object.
pub fn parse_payload(text: &str) -> Result<Value> {
    parse_payload_with(&JsonRepair::new(), text)
}

pub fn parse_payload_with(repair: &JsonRepair, text: &str) -> Result<Value> {
    let stripped = strip_code_fences(text);

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(stripped) {
        return Ok(value);
    }

    let repaired = repair.repair(stripped)?;
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value @ Value::Object(_)) => {
            debug!("JSON repair succeeded");
            Ok(value)
        }
        Ok(_) => Err(InvocationError::RepairFailed(
            "repaired text is not a JSON object".into(),
        )),
        // Only position information; the parser message never quotes input
        Err(e) => Err(InvocationError::RepairFailed(format!(
            "repaired text does not parse (line {}, column {})",
            e.line(),
            e.column()
        ))),
    }
}

/// Drops commas followed (after optional whitespace) by `}` or `]`.
/// Commas inside string literals are left alone.
fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Count of `{` minus count of `}`, outside string literals.
fn unclosed_braces(text: &str) -> isize {
    let mut depth = 0isize;
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
    }

    depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trailing_comma_with_quoted_comma() {
        let value = parse_payload(r#"{"msg": "Hello, world", "x":1,}"#).unwrap();
        assert_eq!(value["msg"], "Hello, world");
        assert_eq!(value["x"], 1);
    }

    #[test]
    fn test_comma_before_bracket_in_string_kept() {
        let value = parse_payload(r#"{"s": "a,]", "list": [1, 2,],}"#).unwrap();
        assert_eq!(value, json!({"s": "a,]", "list": [1, 2]}));
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let repaired = remove_trailing_commas(r#"{"s": "say \"hi,}\"",}"#);
        assert_eq!(repaired, r#"{"s": "say \"hi,}\""}"#);
    }

    #[test]
    fn test_prose_around_object_discarded() {
        let value = parse_payload("Sure! Here you go: {\"a\": 1} Hope that helps.").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_code_fence_stripped_before_parse() {
        let value = parse_payload("```json\n{\"a\": [1, 2]}\n```").unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
    }

    #[test]
    fn test_truncated_object_closed() {
        let value = parse_payload(r#"{"a": {"b": 1}"#).unwrap();
        assert_eq!(value, json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_two_missing_braces_closed() {
        let value = parse_payload(r#"{"a": {"b": {"c": 1}"#).unwrap();
        assert_eq!(value, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn test_no_closing_brace_fails_closed() {
        for text in [
            r#"{"a": 1"#,
            r#"Sure: {"sentiment": "happy", "stress_score": 3"#,
        ] {
            let err = parse_payload(text).unwrap_err();
            assert!(matches!(err, InvocationError::RepairFailed(_)), "{text}");
        }
    }

    #[test]
    fn test_too_many_missing_braces() {
        let err = JsonRepair::new().repair(r#"{"a": {"b": {"c": 1"#).unwrap_err();
        assert!(matches!(err, InvocationError::RepairFailed(_)));
    }

    #[test]
    fn test_no_object_fails() {
        let err = parse_payload("I cannot help with that.").unwrap_err();
        assert!(matches!(err, InvocationError::RepairFailed(_)));
    }

    #[test]
    fn test_non_object_json_fails() {
        let err = parse_payload("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, InvocationError::RepairFailed(_)));
    }

    #[test]
    fn test_braces_in_strings_not_counted() {
        assert_eq!(unclosed_braces(r#"{"a": "{{{"}"#), 0);
        assert_eq!(unclosed_braces(r#"{"a": "}"#), 1);
    }

    #[test]
    fn test_strip_code_fences_variants() {
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
        assert_eq!(strip_code_fences("```json\n{}"), "{}");
    }
}
