//! The analysis pipeline facade.
//!
//! [`Analyzer`] ties the components together: sanitize the message, build a
//! prompt from the sanitized text, invoke the model, report.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shield_client::{
    CancellationToken, FallbackSynthesizer, InvocationOutcome, InvokeOptions, ModelTransport,
    RequiredFields, ResilientClient,
};
use shield_sanitizer::{SanitizeOptions, Sanitizer, ThreatKind, ThreatLevel};
use tracing::{debug, info, warn};

use crate::config::ShieldConfig;
use crate::prompt::{InstructionPromptBuilder, PromptBuilder, PromptContext};
use crate::Result;

/// Everything the caller needs to assemble a response for one message.
///
/// Carries sanitization metadata and the invocation outcome; never the raw
/// input text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Model (or fallback) outcome.
    pub outcome: InvocationOutcome,

    /// Threat level assigned by the sanitizer.
    pub threat_level: ThreatLevel,

    /// Threat kinds detected by the sanitizer.
    pub detected_threats: BTreeSet<ThreatKind>,

    /// Whether the sanitizer changed the text.
    pub sanitization_applied: bool,

    /// Whether the payload came from the model.
    pub llm_used: bool,

    /// Whether the input was blocked before invocation.
    pub blocked: bool,

    /// Wall-clock time for the whole analysis.
    pub processing_time_ms: u64,
}

/// The Prompt Shield facade.
///
/// # Security Model
///
/// 1. Sanitization always runs first; only sanitized text reaches the prompt
/// 2. The analyzer does not reject unsafe input on its own. Deployments opt
///    in with `global.block_threat_level`
/// 3. Invocation failures follow `client.fallback_on_error`
///
/// # Example
///
/// ```rust,ignore
/// let analyzer = Analyzer::new(&ShieldConfig::default(), transport)?;
/// let report = analyzer.analyze("I have three deadlines this week").await?;
///
/// if report.outcome.model_debug.fallback_used {
///     // degraded answer
/// }
/// ```
pub struct Analyzer {
    sanitizer: Sanitizer,
    options: SanitizeOptions,
    prompt: Arc<dyn PromptBuilder>,
    client: ResilientClient,
    fallback: FallbackSynthesizer,
    fallback_on_error: bool,
    block_threat_level: Option<ThreatLevel>,
}

impl Analyzer {
    /// Create an analyzer from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(config: &ShieldConfig, transport: Arc<dyn ModelTransport>) -> Result<Self> {
        config.validate()?;

        let fallback = FallbackSynthesizer::new();
        let mut client = ResilientClient::new(transport, config.client_config())
            .with_fallback(fallback.clone());
        if !config.client.required_fields.is_empty() {
            client = client.with_validator(Arc::new(RequiredFields::new(
                config.client.required_fields.iter().cloned(),
            )));
        }

        info!(
            "Analyzer initialized: model={}, max_attempts={}, block_threat_level={:?}",
            client.model_name(),
            config.client.max_attempts,
            config.global.block_threat_level
        );

        Ok(Self {
            sanitizer: Sanitizer::with_config(config.sanitizer_config()),
            options: config.sanitize_options(),
            prompt: Arc::new(InstructionPromptBuilder::new()),
            client,
            fallback,
            fallback_on_error: config.client.fallback_on_error,
            block_threat_level: config.global.block_threat_level,
        })
    }

    #[must_use]
    pub fn with_prompt_builder(mut self, prompt: Arc<dyn PromptBuilder>) -> Self {
        self.prompt = prompt;
        self
    }

    /// Replaces the fallback used both for invocation failures and for
    /// blocked input.
    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackSynthesizer) -> Self {
        self.client = self.client.with_fallback(fallback.clone());
        self.fallback = fallback;
        self
    }

    pub fn client(&self) -> &ResilientClient {
        &self.client
    }

    /// Analyze one message.
    ///
    /// # Errors
    ///
    /// Only when `fallback_on_error` is disabled and the invocation fails.
    pub async fn analyze(&self, message: &str) -> Result<AnalysisReport> {
        self.analyze_with(message, None).await
    }

    /// Analyze one message, aborting the model call when `cancel` fires.
    pub async fn analyze_with(
        &self,
        message: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<AnalysisReport> {
        let started = std::time::Instant::now();
        let sanitized = self.sanitizer.sanitize(Some(message), &self.options);
        let threat_level = sanitized.threat_level();

        if !sanitized.detected_threats().is_empty() {
            warn!(
                "Threats detected: count={}, level={}",
                sanitized.detected_threats().len(),
                threat_level
            );
        }

        if let Some(limit) = self.block_threat_level {
            if threat_level >= limit {
                warn!("Blocking analysis: threat level {} >= {}", threat_level, limit);
                let outcome = self.fallback.placeholder(None, 0, 0);
                return Ok(AnalysisReport {
                    outcome,
                    threat_level,
                    detected_threats: sanitized.detected_threats().clone(),
                    sanitization_applied: sanitized.was_modified(),
                    llm_used: false,
                    blocked: true,
                    processing_time_ms: elapsed_ms(started),
                });
            }
        }

        let context = PromptContext {
            sanitized_text: sanitized.sanitized_text(),
            threat_level,
            detected_threats: sanitized.detected_threats(),
        };
        let request = self.prompt.build(&context);
        debug!("Prompt built with {} messages", request.messages.len());

        let mut options = InvokeOptions::new(self.fallback_on_error);
        if let Some(token) = cancel {
            options = options.with_cancellation(token);
        }
        let outcome = self.client.invoke_with(&request, options).await?;
        let llm_used = !outcome.fallback_used();

        let report = AnalysisReport {
            outcome,
            threat_level,
            detected_threats: sanitized.detected_threats().clone(),
            sanitization_applied: sanitized.was_modified(),
            llm_used,
            blocked: false,
            processing_time_ms: elapsed_ms(started),
        };
        info!(
            "Analysis complete: llm_used={}, threat_level={}, time={}ms",
            report.llm_used, report.threat_level, report.processing_time_ms
        );
        Ok(report)
    }

    /// Analyze several messages in order. One failure does not stop the rest.
    pub async fn analyze_batch<S: AsRef<str>>(&self, messages: &[S]) -> Vec<Result<AnalysisReport>> {
        let mut reports = Vec::with_capacity(messages.len());
        for message in messages {
            reports.push(self.analyze(message.as_ref()).await);
        }
        reports
    }
}

fn elapsed_ms(started: std::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
