//! Deterministic placeholder results.
//!
//! When an invocation cannot succeed and the caller allows it, the
//! [`FallbackSynthesizer`] returns a fixed payload with safe defaults for
//! every field. No I/O, no randomness.

use serde_json::{json, Value};
use tracing::info;

use crate::error::ErrorClass;
use crate::outcome::{InvocationOutcome, ModelDebug};

/// Model name recorded on fallback outcomes.
pub const FALLBACK_MODEL_NAME: &str = "fallback";

/// The neutral message-analysis payload.
pub fn neutral_analysis_payload() -> Value {
    json!({
        "sentiment": "neutral",
        "emotion": "neutral",
        "stress_score": 5,
        "category": "general",
        "key_phrases": [],
        "suggested_reply": "Thank you for your message. Let me review this and get back to you.",
        "action_items": ["Review message", "Follow up with sender"],
        "confidence_scores": {
            "sentiment": 0.5,
            "emotion": 0.5,
            "category": 0.5,
            "stress": 0.5
        },
        "urgency": false
    })
}

/// Builds fallback outcomes from a fixed template.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackSynthesizer {
    template: Value,
}

impl FallbackSynthesizer {
    /// Synthesizer using [`neutral_analysis_payload`].
    pub fn new() -> Self {
        Self::with_template(neutral_analysis_payload())
    }

    pub fn with_template(template: Value) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &Value {
        &self.template
    }

    /// A successful-shaped outcome flagged as fallback.
    pub fn synthesize(&self, error_kind: ErrorClass, latency_ms: u64, attempts: u32) -> InvocationOutcome {
        info!("Generated fallback response (error_kind={})", error_kind);
        self.placeholder(Some(error_kind), latency_ms, attempts)
    }

    /// Fallback-shaped outcome for callers that skip the model entirely,
    /// e.g. when input is blocked before invocation.
    pub fn placeholder(
        &self,
        error_kind: Option<ErrorClass>,
        latency_ms: u64,
        attempts: u32,
    ) -> InvocationOutcome {
        InvocationOutcome {
            success: true,
            payload: Some(self.template.clone()),
            model_debug: ModelDebug {
                model_name: FALLBACK_MODEL_NAME.to_owned(),
                latency_ms,
                fallback_used: true,
                error_kind,
                attempts,
            },
        }
    }
}

impl Default for FallbackSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_deterministic() {
        let synth = FallbackSynthesizer::new();
        let a = synth.synthesize(ErrorClass::RepairFailed, 0, 1);
        let b = synth.synthesize(ErrorClass::RepairFailed, 0, 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fallback_shape() {
        let outcome = FallbackSynthesizer::new().synthesize(ErrorClass::RetriableTransport, 12, 3);
        assert!(outcome.success);
        assert!(outcome.fallback_used());
        assert_eq!(outcome.error_kind(), Some(ErrorClass::RetriableTransport));
        assert_eq!(outcome.model_debug.model_name, FALLBACK_MODEL_NAME);

        let payload = outcome.payload.unwrap();
        assert_eq!(payload["sentiment"], "neutral");
        assert_eq!(payload["urgency"], false);
        assert!(payload.get("model_debug").is_none());
    }

    #[test]
    fn test_custom_template() {
        let synth = FallbackSynthesizer::with_template(json!({"answer": null}));
        let outcome = synth.synthesize(ErrorClass::ExtractionFailed, 0, 1);
        assert_eq!(outcome.payload, Some(json!({"answer": null})));
    }
}
