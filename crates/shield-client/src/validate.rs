//! Payload validation seam.
//!
//! The client parses model output into JSON but does not know the caller's
//! schema. A [`PayloadValidator`] checks (and may normalize) the parsed
//! payload; a rejection is a permanent failure and is never retried.

use serde_json::Value;

/// Checks a parsed payload before it is returned to the caller.
pub trait PayloadValidator: Send + Sync {
    /// The accepted (possibly normalized) payload, or a reason for rejection.
    ///
    /// Reasons end up in errors and logs, so they must not quote payload
    /// content.
    fn validate(&self, payload: Value) -> Result<Value, String>;
}

/// Accepts any JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectPayload;

impl PayloadValidator for ObjectPayload {
    fn validate(&self, payload: Value) -> Result<Value, String> {
        if payload.is_object() {
            Ok(payload)
        } else {
            Err("payload is not a JSON object".into())
        }
    }
}

/// Accepts objects that contain every named key.
#[derive(Debug, Clone, Default)]
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl PayloadValidator for RequiredFields {
    fn validate(&self, payload: Value) -> Result<Value, String> {
        let object = payload
            .as_object()
            .ok_or_else(|| String::from("payload is not a JSON object"))?;

        let missing: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| !object.contains_key(f.as_str()))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(payload)
        } else {
            Err(format!("missing required fields: {}", missing.join(", ")))
        }
    }
}
