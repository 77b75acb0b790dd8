//! # Shield Sanitizer - Untrusted Input Hygiene
//!
//! The sanitizer is the first stage of Prompt Shield. Every piece of
//! user-supplied text passes through it before it is embedded in a prompt
//! sent to a language model.
//!
//! ## Purpose
//!
//! This crate implements four capabilities:
//!
//! 1. **Pattern Table** - One process-wide set of compiled injection, code and
//!    PII patterns, built once and shared read-only by every caller.
//!
//! 2. **Sanitization Pipeline** - An ordered, total transform from raw text to
//!    a [`SanitizationResult`]: truncation, injection line removal, code
//!    removal, HTML escaping, PII redaction, whitespace and repetition
//!    normalization, line clamping and control character stripping.
//!
//! 3. **Threat Assessment** - Aggregation of per-stage signals into a single
//!    [`ThreatLevel`], with an [`EscalationPolicy`] for composite attacks.
//!
//! 4. **PII Guard** - Standalone detection and redaction of emails, phone
//!    numbers, card numbers and SSN-like sequences, for use on log lines.
//!
//! ## Threat Model
//!
//! | Threat | Example | Defense |
//! |--------|---------|---------|
//! | Instruction override | "Ignore previous instructions" | Line removal |
//! | Role injection | "system: you are now ..." | Line removal |
//! | Delimiter spoofing | `<|im_start|>`, `[INST]` | Line removal |
//! | Homoglyph evasion | Cyrillic `о` in "ignоre" | Canonical matching |
//! | Code smuggling | `<script>`, `javascript:` | Span removal (strict) |
//! | Markup injection | `<img onerror=...>` | `<` `>` escaping |
//! | Padding / DoS | 10 000 repeated characters | Truncation, run capping |
//! | Data leakage | Emails, card numbers | Placeholder redaction |
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     SANITIZER                             │
//! ├───────────────────────────────────────────────────────────┤
//! │                                                           │
//! │   raw ──▶ truncate ──▶ disarm ──▶ injection ──▶ code      │
//! │                                              │            │
//! │        ┌─────────────────────────────────────┘            │
//! │        ▼                                                  │
//! │   escape ──▶ PII ──▶ whitespace ──▶ repetition            │
//! │                                        │                  │
//! │        ┌───────────────────────────────┘                  │
//! │        ▼                                                  │
//! │   line clamp ──▶ control flag ──▶ ASSESSOR                │
//! │                                       │                   │
//! │                                       ▼                   │
//! │                           ┌─────────────────────┐         │
//! │                           │ SANITIZATION RESULT │         │
//! │                           │ None│Low│Medium│High│         │
//! │                           └─────────────────────┘         │
//! │                                                           │
//! │   PATTERN TABLE (shared, read-only) feeds every stage     │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use shield_sanitizer::{redact_pii, sanitize, ThreatKind};
//!
//! let result = sanitize(Some("Contact admin@example.com"), true, false);
//! assert_eq!(result.sanitized_text(), "Contact [EMAIL_REDACTED]");
//! assert!(result.detected_threats().contains(&ThreatKind::PiiDetected));
//!
//! assert_eq!(redact_pii("SSN 123-45-6789"), "SSN [SSN_REDACTED]");
//! ```

pub mod assessor;
pub mod cdr;
pub mod models;
pub mod patterns;
pub mod pii;
pub mod sanitizer;

pub use assessor::{baseline_severity, EscalationPolicy, ThreatAssessor, DEFAULT_ESCALATION_POLICY};
pub use models::{Modification, SanitizationResult, ThreatKind, ThreatLevel};
pub use patterns::{DetectionPattern, PatternTable, PiiPattern};
pub use pii::{is_safe_for_logging, redact_pii, PiiGuard, PiiKind};
pub use sanitizer::{
    sanitize, SanitizeOptions, Sanitizer, SanitizerConfig, MAX_CHAR_REPETITION, MAX_INPUT_LENGTH,
    MAX_LINE_LENGTH, MAX_WORD_REPETITION,
};
