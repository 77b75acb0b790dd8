//! The resilient invocation loop.
//!
//! ```text
//! request ──▶ send ──ok──▶ extract ──▶ parse/repair ──▶ validate ──▶ outcome
//!              │                 │              │             │
//!              │ retriable       └──────────────┴─────────────┤
//!              ▼                                              ▼
//!        backoff + retry                            error ──▶ fallback?
//!        (attempts, deadline,                                 │
//!         cancellation)                              yes ─▶ synthesized outcome
//!                                                    no  ─▶ Err(InvocationError)
//! ```
//!
//! Each invocation owns its retry counter and deadline. Nothing is shared
//! between concurrent invocations except the immutable client itself.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{InvocationError, Result, TransportError};
use crate::extract::ResponseExtractor;
use crate::fallback::FallbackSynthesizer;
use crate::outcome::InvocationOutcome;
use crate::repair::{parse_payload_with, JsonRepair};
use crate::retry::RetryPolicy;
use crate::transport::{ModelRequest, ModelTransport, ProviderResponse};
use crate::validate::{ObjectPayload, PayloadValidator};

/// Default limit for a single outbound call.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client-wide defaults. Per-call overrides go in [`InvokeOptions`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub policy: RetryPolicy,
    /// Overall budget for one invocation, retries and backoff included.
    pub deadline: Option<Duration>,
    /// Budget for each outbound call. Expiry counts as a retriable timeout.
    pub attempt_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::new(),
            deadline: None,
            attempt_timeout: Some(DEFAULT_ATTEMPT_TIMEOUT),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-invocation switches.
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Convert failures into a fallback outcome instead of an error.
    pub fallback_on_error: bool,
    /// Replaces the client's retry policy for this call.
    pub policy: Option<RetryPolicy>,
    /// Replaces the client's overall deadline for this call.
    pub deadline: Option<Duration>,
    /// Aborts the in-flight call and any pending backoff when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl InvokeOptions {
    pub fn new(fallback_on_error: bool) -> Self {
        Self {
            fallback_on_error,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Why a wait ended early.
enum Interrupt {
    Deadline,
    Cancelled,
}

/// Wraps a [`ModelTransport`] with classification, bounded retries,
/// response extraction, JSON repair, validation and fallback.
///
/// Immutable after construction; share it behind an `Arc` or clone it.
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn ModelTransport>,
    config: ClientConfig,
    validator: Arc<dyn PayloadValidator>,
    repair: JsonRepair,
    fallback: FallbackSynthesizer,
}

impl ResilientClient {
    pub fn new(transport: Arc<dyn ModelTransport>, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            validator: Arc::new(ObjectPayload),
            repair: JsonRepair::new(),
            fallback: FallbackSynthesizer::new(),
        }
    }

    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn PayloadValidator>) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackSynthesizer) -> Self {
        self.fallback = fallback;
        self
    }

    #[must_use]
    pub fn with_repair(mut self, repair: JsonRepair) -> Self {
        self.repair = repair;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.transport.model_name()
    }

    pub fn fallback(&self) -> &FallbackSynthesizer {
        &self.fallback
    }

    /// Invokes the model with the client's default policy and deadline.
    ///
    /// # Errors
    ///
    /// Only when `fallback_on_error` is false; see [`invoke_with`](Self::invoke_with).
    pub async fn invoke(
        &self,
        request: &ModelRequest,
        fallback_on_error: bool,
    ) -> Result<InvocationOutcome> {
        self.invoke_with(request, InvokeOptions::new(fallback_on_error))
            .await
    }

    /// Invokes the model with per-call options.
    ///
    /// # Errors
    ///
    /// With `fallback_on_error` unset, the classified [`InvocationError`]:
    /// retriable exhaustion (attempts, deadline or cancellation), a
    /// non-retriable transport or validation failure, `extraction_failed` or
    /// `repair_failed`. With it set, never.
    pub async fn invoke_with(
        &self,
        request: &ModelRequest,
        options: InvokeOptions,
    ) -> Result<InvocationOutcome> {
        let started = Instant::now();
        let policy = options.policy.as_ref().unwrap_or(&self.config.policy);
        let deadline = options
            .deadline
            .or(self.config.deadline)
            .map(|budget| started + budget);
        let cancel = options.cancel.unwrap_or_default();

        let mut attempts = 0u32;
        let result = self
            .run(request, policy, deadline, &cancel, &mut attempts)
            .await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(payload) => {
                info!(
                    "Model call successful: latency={}ms, model={}, attempts={}",
                    latency_ms,
                    self.model_name(),
                    attempts
                );
                Ok(InvocationOutcome::from_model(
                    payload,
                    self.model_name(),
                    latency_ms,
                    attempts,
                ))
            }
            Err(err) => {
                let class = err.class();
                warn!(
                    "Model call failed: {} after {} attempts (fallback={})",
                    class, attempts, options.fallback_on_error
                );
                if options.fallback_on_error {
                    Ok(self.fallback.synthesize(class, latency_ms, attempts))
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn run(
        &self,
        request: &ModelRequest,
        policy: &RetryPolicy,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
        attempts: &mut u32,
    ) -> Result<Value> {
        let response = self
            .call_with_retry(request, policy, deadline, cancel, attempts)
            .await?;
        let text = ResponseExtractor::extract(&response)?;
        let payload = parse_payload_with(&self.repair, &text)?;
        self.validator
            .validate(payload)
            .map_err(InvocationError::Validation)
    }

    async fn call_with_retry(
        &self,
        request: &ModelRequest,
        policy: &RetryPolicy,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
        attempts: &mut u32,
    ) -> Result<ProviderResponse> {
        let max_attempts = policy.attempts();

        loop {
            *attempts += 1;
            let attempt = *attempts;

            let err = match self.send_once(request, deadline, cancel).await {
                Ok(Ok(response)) => {
                    if attempt > 1 {
                        debug!("Model call succeeded on attempt {}", attempt);
                    }
                    return Ok(response);
                }
                Ok(Err(err)) => err,
                Err(Interrupt::Deadline) => {
                    return Err(InvocationError::DeadlineExceeded { attempts: attempt })
                }
                Err(Interrupt::Cancelled) => {
                    return Err(InvocationError::Cancelled { attempts: attempt })
                }
            };

            if !err.is_retriable() {
                warn!("Non-retriable transport error ({}) on attempt {}", err.label(), attempt);
                return Err(InvocationError::NonRetriable(err));
            }
            if attempt >= max_attempts {
                return Err(InvocationError::RetriesExhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = policy.backoff(attempt);
            if deadline.is_some_and(|at| Instant::now() + delay >= at) {
                return Err(InvocationError::DeadlineExceeded { attempts: attempt });
            }
            warn!(
                "Retriable transport error ({}) on attempt {}/{}, retrying in {:?}",
                err.label(),
                attempt,
                max_attempts,
                delay
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(InvocationError::Cancelled { attempts: attempt });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One outbound call, raced against cancellation and the deadline.
    async fn send_once(
        &self,
        request: &ModelRequest,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> std::result::Result<std::result::Result<ProviderResponse, TransportError>, Interrupt> {
        let call = async {
            match self.config.attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, self.transport.send(request))
                    .await
                    .unwrap_or(Err(TransportError::Timeout)),
                None => self.transport.send(request).await,
            }
        };
        let expiry = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Interrupt::Cancelled),
            _ = expiry => Err(Interrupt::Deadline),
            result = call => Ok(result),
        }
    }
}

impl fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClient")
            .field("model", &self.model_name())
            .field("config", &self.config)
            .field("repair", &self.repair)
            .finish_non_exhaustive()
    }
}
