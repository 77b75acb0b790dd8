//! Error types for model invocation.
//!
//! Two layers: [`TransportError`] is what a single outbound call can fail
//! with, and [`InvocationError`] is what a whole invocation (retries,
//! extraction, repair, validation) can fail with. Every invocation error
//! maps to exactly one [`ErrorClass`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for invocation operations.
pub type Result<T> = std::result::Result<T, InvocationError>;

/// Classified error kind, as reported in `model_debug.error_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Transient transport failure; the attempt or time budget ran out.
    RetriableTransport,
    /// Permanent failure; never retried.
    NonRetriableTransport,
    /// No strategy produced text from the provider response.
    ExtractionFailed,
    /// The extracted text could not be turned into a JSON object.
    RepairFailed,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::RetriableTransport => "retriable_transport",
            ErrorClass::NonRetriableTransport => "non_retriable_transport",
            ErrorClass::ExtractionFailed => "extraction_failed",
            ErrorClass::RepairFailed => "repair_failed",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one outbound call, reported by a transport.
///
/// Only [`Connection`](Self::Connection) and [`Timeout`](Self::Timeout) are
/// retriable. Everything else fails on first occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The provider could not be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The call did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// Credentials were rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The provider rejected the request as malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other non-success status from the provider.
    #[error("provider returned status {code}")]
    Status {
        /// Status code reported by the provider
        code: u16,
    },

    /// The provider answered with something that is not a response object.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Whether another attempt may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, TransportError::Connection(_) | TransportError::Timeout)
    }

    pub fn classify(&self) -> ErrorClass {
        if self.is_retriable() {
            ErrorClass::RetriableTransport
        } else {
            ErrorClass::NonRetriableTransport
        }
    }

    /// Short label safe to log; carries no provider text.
    pub fn label(&self) -> &'static str {
        match self {
            TransportError::Connection(_) => "connection",
            TransportError::Timeout => "timeout",
            TransportError::Auth(_) => "auth",
            TransportError::InvalidRequest(_) => "invalid_request",
            TransportError::Status { .. } => "status",
            TransportError::Malformed(_) => "malformed",
        }
    }
}

/// Failure of a whole invocation.
///
/// # Security Notes
///
/// Variants carry transport diagnostics and reasons only. Raw user text and
/// raw provider payloads never end up in an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    /// Every attempt failed with a retriable error.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Error from the final attempt
        last: TransportError,
    },

    /// The overall deadline passed during a call or before the next retry.
    #[error("deadline exceeded after {attempts} attempts")]
    DeadlineExceeded {
        /// Attempts started before the deadline
        attempts: u32,
    },

    /// The caller cancelled the invocation.
    #[error("invocation cancelled after {attempts} attempts")]
    Cancelled {
        /// Attempts started before cancellation
        attempts: u32,
    },

    /// A transport error that must not be retried.
    #[error("non-retriable transport error: {0}")]
    NonRetriable(TransportError),

    /// No extraction strategy produced non-empty text.
    #[error("unable to extract text from provider response")]
    ExtractionFailed,

    /// The extracted text could not be repaired into a JSON object.
    #[error("JSON repair failed: {0}")]
    RepairFailed(String),

    /// The parsed payload was rejected by the validator.
    #[error("payload validation failed: {0}")]
    Validation(String),
}

impl InvocationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            InvocationError::RetriesExhausted { .. }
            | InvocationError::DeadlineExceeded { .. }
            | InvocationError::Cancelled { .. } => ErrorClass::RetriableTransport,
            InvocationError::NonRetriable(_) | InvocationError::Validation(_) => {
                ErrorClass::NonRetriableTransport
            }
            InvocationError::ExtractionFailed => ErrorClass::ExtractionFailed,
            InvocationError::RepairFailed(_) => ErrorClass::RepairFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connection_and_timeout_retriable() {
        assert!(TransportError::Connection("refused".into()).is_retriable());
        assert!(TransportError::Timeout.is_retriable());
        assert!(!TransportError::Auth("bad key".into()).is_retriable());
        assert!(!TransportError::InvalidRequest("empty".into()).is_retriable());
        assert!(!TransportError::Status { code: 503 }.is_retriable());
        assert!(!TransportError::Malformed("html".into()).is_retriable());
    }

    #[test]
    fn test_invocation_error_classes() {
        let cases = [
            (
                InvocationError::RetriesExhausted {
                    attempts: 3,
                    last: TransportError::Timeout,
                },
                ErrorClass::RetriableTransport,
            ),
            (
                InvocationError::DeadlineExceeded { attempts: 1 },
                ErrorClass::RetriableTransport,
            ),
            (
                InvocationError::Cancelled { attempts: 1 },
                ErrorClass::RetriableTransport,
            ),
            (
                InvocationError::NonRetriable(TransportError::Auth("denied".into())),
                ErrorClass::NonRetriableTransport,
            ),
            (
                InvocationError::Validation("missing field".into()),
                ErrorClass::NonRetriableTransport,
            ),
            (InvocationError::ExtractionFailed, ErrorClass::ExtractionFailed),
            (
                InvocationError::RepairFailed("no object".into()),
                ErrorClass::RepairFailed,
            ),
        ];

        for (error, class) in cases {
            assert_eq!(error.class(), class, "{error}");
        }
    }

    #[test]
    fn test_error_class_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorClass::NonRetriableTransport).unwrap();
        assert_eq!(json, "\"non_retriable_transport\"");
        assert_eq!(ErrorClass::RepairFailed.to_string(), "repair_failed");
    }
}
