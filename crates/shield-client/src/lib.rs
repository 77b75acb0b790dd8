//! # Shield Client - Resilient Model Invocation
//!
//! Calls to a language model fail in two very different ways: transiently
//! (a dropped connection, a slow provider) and permanently (bad
//! credentials, a malformed request, output that is not the expected
//! shape). This crate retries only the first kind, and turns everything the
//! model says into a validated JSON payload or a typed error.
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`ModelTransport`] | One outbound call; the only suspension point |
//! | [`ResilientClient`] | Classification, backoff, deadline, cancellation |
//! | [`ResponseExtractor`] | Finds generated text in varied response shapes |
//! | [`JsonRepair`] | Fence stripping, trailing commas, missing braces |
//! | [`PayloadValidator`] | Caller-supplied schema check |
//! | [`FallbackSynthesizer`] | Deterministic placeholder on failure |
//!
//! ## Error Classification
//!
//! | Failure | Class | Retried |
//! |---------|-------|---------|
//! | Connection failure, timeout | `retriable_transport` | Yes, with backoff |
//! | Attempts, deadline or cancellation exhausted | `retriable_transport` | No further |
//! | Auth, invalid request, other status, malformed, validation | `non_retriable_transport` | Never |
//! | No text in response | `extraction_failed` | Never |
//! | Unrecoverable JSON | `repair_failed` | Never |
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use shield_client::{
//!     async_trait, ChatMessage, ClientConfig, ModelRequest, ModelTransport,
//!     ProviderResponse, ResilientClient, TransportError,
//! };
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl ModelTransport for Echo {
//!     fn model_name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     async fn send(&self, _request: &ModelRequest) -> Result<ProviderResponse, TransportError> {
//!         Ok(serde_json::json!({"text": "```json\n{\"ok\": true,}\n```"}).into())
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let client = ResilientClient::new(Arc::new(Echo), ClientConfig::default());
//! let request = ModelRequest::new().with_message(ChatMessage::user("hello"));
//! let outcome = client.invoke(&request, false).await.unwrap();
//! assert_eq!(outcome.payload.unwrap()["ok"], true);
//! assert!(!outcome.model_debug.fallback_used);
//! # });
//! ```

pub mod client;
pub mod error;
pub mod extract;
pub mod fallback;
pub mod outcome;
pub mod repair;
pub mod retry;
pub mod transport;
pub mod validate;

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

pub use client::{ClientConfig, InvokeOptions, ResilientClient, DEFAULT_ATTEMPT_TIMEOUT};
pub use error::{ErrorClass, InvocationError, Result, TransportError};
pub use extract::ResponseExtractor;
pub use fallback::{neutral_analysis_payload, FallbackSynthesizer, FALLBACK_MODEL_NAME};
pub use outcome::{InvocationOutcome, ModelDebug};
pub use repair::{parse_payload, parse_payload_with, strip_code_fences, JsonRepair, MAX_MISSING_BRACES};
pub use retry::RetryPolicy;
pub use transport::{ChatMessage, ModelRequest, ModelTransport, ProviderResponse, Role};
pub use validate::{ObjectPayload, PayloadValidator, RequiredFields};
