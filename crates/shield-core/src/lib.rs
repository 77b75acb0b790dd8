//! # Prompt Shield Core
//!
//! Unified facade for analyzing untrusted chat messages with a language model.
//! Orchestrates the Sanitizer, the Prompt Builder and the Resilient Client.
//!
//! ## Defense Layers
//!
//! | Layer | Component | Guarantees |
//! |-------|-----------|------------|
//! | Input | Sanitizer | Injection and code removal, PII redaction, bounded output |
//! | Prompt | Prompt Builder | Only sanitized text reaches the model |
//! | Invocation | Resilient Client | Bounded retries, deadline, always-parseable payload |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      PROMPT SHIELD CORE                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   raw message                                                   │
//! │        │                                                        │
//! │        ▼                                                        │
//! │  ┌─────────────┐  blocked?  ┌─────────────┐                     │
//! │  │  Sanitizer  │ ─────────► │  Fallback   │ ──┐                 │
//! │  └──────┬──────┘            └─────────────┘   │                 │
//! │         ▼                                     │                 │
//! │  ┌─────────────┐    ┌─────────────┐           ▼                 │
//! │  │   Prompt    │ ─► │  Resilient  │ ──► AnalysisReport          │
//! │  │   Builder   │    │   Client    │                             │
//! │  └─────────────┘    └─────────────┘                             │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shield_core::{Analyzer, ShieldConfig};
//!
//! let mut config = ShieldConfig::from_file("shield.toml")?;
//! config.apply_env_overrides()?;
//! init_tracing(&config.logging)?;
//!
//! let analyzer = Analyzer::new(&config, transport)?;
//! let report = analyzer.analyze(&incoming_message).await?;
//! respond(report.outcome.payload);
//! ```
//!
//! ## Security Notes
//!
//! - Sanitization always precedes prompt construction
//! - Logs carry counts, kinds and levels, never message text
//! - With fallback enabled, `analyze` never fails: callers always get a payload
//! - Blocking on threat level is opt-in via `global.block_threat_level`

mod analyzer;
mod config;
mod error;
mod logging;
mod prompt;

pub use analyzer::{AnalysisReport, Analyzer};
pub use config::{
    ClientSettings, GlobalConfig, LogFormat, LoggingConfig, SanitizerSettings, ShieldConfig,
    LOG_LEVELS,
};
pub use error::ShieldError;
pub use logging::{init_tracing, loggable};
pub use prompt::{
    InstructionPromptBuilder, PromptBuilder, PromptContext, DEFAULT_SYSTEM_INSTRUCTIONS,
    MESSAGE_END, MESSAGE_START,
};

// Re-export component types for convenience
pub use shield_client::{
    async_trait, CancellationToken, ChatMessage, ErrorClass, FallbackSynthesizer,
    InvocationError, InvocationOutcome, ModelDebug, ModelRequest, ModelTransport,
    ProviderResponse, ResilientClient, TransportError,
};
pub use shield_sanitizer::{
    PiiGuard, SanitizationResult, SanitizeOptions, Sanitizer, ThreatKind, ThreatLevel,
};

/// Core result type for shield operations.
pub type Result<T> = std::result::Result<T, ShieldError>;

#[cfg(test)]
mod tests;
