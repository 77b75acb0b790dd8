//! Request and response types, and the transport seam.
//!
//! A [`ModelTransport`] performs exactly one outbound call per invocation. It
//! knows nothing about retries, deadlines or fallbacks; the
//! [`ResilientClient`](crate::ResilientClient) wraps it with all of that.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportError;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Section heading used when messages are flattened into one prompt.
    pub fn heading(&self) -> &'static str {
        match self {
            Role::System => "SYSTEM INSTRUCTIONS:",
            Role::User => "USER:",
            Role::Assistant => "ASSISTANT:",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        f.write_str(name)
    }
}

/// One message of a model request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// An ordered list of messages, built by a prompt-builder collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub messages: Vec<ChatMessage>,
}

impl ModelRequest {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Flattens the messages into one prompt for single-string providers.
    ///
    /// ```rust
    /// use shield_client::{ChatMessage, ModelRequest};
    ///
    /// let request = ModelRequest::new()
    ///     .with_message(ChatMessage::system("Reply in JSON."))
    ///     .with_message(ChatMessage::user("Hi"));
    /// assert_eq!(
    ///     request.render_prompt(),
    ///     "SYSTEM INSTRUCTIONS:\nReply in JSON.\n\nUSER:\nHi\n"
    /// );
    /// ```
    pub fn render_prompt(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}\n{}\n", m.role.heading(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Raw provider response. Its shape varies by provider and SDK version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderResponse(Value);

impl ProviderResponse {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for ProviderResponse {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// One outbound call to a model provider.
///
/// Implementations report failures as [`TransportError`] so the client can
/// classify them. They must not retry internally.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Model identifier recorded in `model_debug`.
    fn model_name(&self) -> &str;

    async fn send(&self, request: &ModelRequest) -> Result<ProviderResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prompt_all_roles() {
        let request = ModelRequest::new()
            .with_message(ChatMessage::system("rules"))
            .with_message(ChatMessage::user("question"))
            .with_message(ChatMessage::assistant("answer"));

        assert_eq!(
            request.render_prompt(),
            "SYSTEM INSTRUCTIONS:\nrules\n\nUSER:\nquestion\n\nASSISTANT:\nanswer\n"
        );
    }

    #[test]
    fn test_empty_request_renders_empty() {
        let request = ModelRequest::new();
        assert!(request.is_empty());
        assert_eq!(request.render_prompt(), "");
    }

    #[test]
    fn test_message_serializes_lowercase_role() {
        let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }
}
