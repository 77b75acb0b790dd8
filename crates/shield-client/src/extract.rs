//! Text extraction from provider responses.
//!
//! Provider SDKs disagree on where the generated text lives. The extractor
//! tries a fixed list of strategies in priority order and the first
//! non-empty string wins.

use serde_json::Value;
use tracing::debug;

use crate::error::{InvocationError, Result};
use crate::transport::ProviderResponse;

type Strategy = fn(&Value) -> Option<String>;

/// Strategies in priority order.
const STRATEGIES: [(&str, Strategy); 3] = [
    ("direct_text", direct_text),
    ("candidate", candidate_text),
    ("generic_output", generic_output),
];

/// Pulls generated text out of a [`ProviderResponse`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseExtractor;

impl ResponseExtractor {
    /// First non-empty, trimmed string produced by any strategy.
    ///
    /// # Errors
    ///
    /// [`InvocationError::ExtractionFailed`] when every strategy comes up
    /// empty.
    pub fn extract(response: &ProviderResponse) -> Result<String> {
        let value = response.as_value();
        for (name, strategy) in STRATEGIES {
            if let Some(text) = strategy(value) {
                debug!("Response text extracted via '{}' strategy", name);
                return Ok(text);
            }
        }
        Err(InvocationError::ExtractionFailed)
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// A bare string response, or a top-level `text` field.
fn direct_text(value: &Value) -> Option<String> {
    non_empty(Some(value)).or_else(|| non_empty(value.get("text")))
}

/// `candidates[0]` as `output`, `text`, string `content`, or the joined
/// `content.parts[*].text`.
fn candidate_text(value: &Value) -> Option<String> {
    let candidate = value.get("candidates")?.as_array()?.first()?;

    for key in ["output", "text", "content"] {
        if let Some(text) = non_empty(candidate.get(key)) {
            return Some(text);
        }
    }

    let parts = candidate.get("content")?.get("parts")?.as_array()?;
    let joined: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    non_empty(Some(&Value::String(joined)))
}

/// Top-level `output_text`, `output` or `content`.
fn generic_output(value: &Value) -> Option<String> {
    ["output_text", "output", "content"]
        .into_iter()
        .find_map(|key| non_empty(value.get(key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extract(value: Value) -> Result<String> {
        ResponseExtractor::extract(&ProviderResponse::new(value))
    }

    #[test]
    fn test_direct_text_field() {
        assert_eq!(extract(json!({"text": "  hello  "})).unwrap(), "hello");
    }

    #[test]
    fn test_bare_string_response() {
        assert_eq!(extract(json!("plain")).unwrap(), "plain");
    }

    #[test]
    fn test_candidate_output_only() {
        let value = json!({"candidates": [{"output": "{\"a\": 1}"}]});
        assert_eq!(extract(value).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_candidate_content_parts_joined() {
        let value = json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"a\":"}, {"text": " 1}"}]}
            }]
        });
        assert_eq!(extract(value).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_empty_direct_text_falls_through() {
        let value = json!({"text": "   ", "candidates": [{"text": "from candidate"}]});
        assert_eq!(extract(value).unwrap(), "from candidate");
    }

    #[test]
    fn test_generic_output_fields() {
        assert_eq!(extract(json!({"output_text": "x"})).unwrap(), "x");
        assert_eq!(extract(json!({"content": "y"})).unwrap(), "y");
    }

    #[test]
    fn test_priority_order() {
        let value = json!({
            "output_text": "generic",
            "candidates": [{"text": "candidate"}]
        });
        assert_eq!(extract(value).unwrap(), "candidate");
    }

    #[test]
    fn test_nothing_extractable() {
        for value in [
            json!({}),
            json!({"candidates": []}),
            json!({"text": 42}),
            json!({"candidates": [{"content": {"parts": []}}]}),
            json!(null),
        ] {
            assert_eq!(extract(value), Err(InvocationError::ExtractionFailed));
        }
    }
}
