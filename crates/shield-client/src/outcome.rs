//! The value returned by a completed invocation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorClass;

/// Invocation metadata. Names, counts, durations and classified error kinds
/// only; never user text or provider payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDebug {
    pub model_name: String,
    /// Wall-clock time of the whole invocation, retries included.
    pub latency_ms: u64,
    pub fallback_used: bool,
    /// Set when the payload came from the fallback.
    pub error_kind: Option<ErrorClass>,
    /// Outbound calls started.
    pub attempts: u32,
}

/// Result of one invocation, including all of its retries.
///
/// Fallback outcomes have the same shape as real ones; only
/// `model_debug.fallback_used` tells them apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationOutcome {
    pub success: bool,
    pub payload: Option<Value>,
    pub model_debug: ModelDebug,
}

impl InvocationOutcome {
    /// Outcome carrying a validated model payload.
    pub fn from_model(payload: Value, model_name: &str, latency_ms: u64, attempts: u32) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            model_debug: ModelDebug {
                model_name: model_name.to_owned(),
                latency_ms,
                fallback_used: false,
                error_kind: None,
                attempts,
            },
        }
    }

    pub fn fallback_used(&self) -> bool {
        self.model_debug.fallback_used
    }

    pub fn error_kind(&self) -> Option<ErrorClass> {
        self.model_debug.error_kind
    }
}
