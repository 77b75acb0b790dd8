//! Configuration types for Prompt Shield.
//!
//! Loaded from TOML, then overridden from `SHIELD_*` environment variables,
//! then validated. Every section has defaults, so a partial (or empty) file
//! is a valid configuration.
//!
//! ```toml
//! [sanitizer]
//! max_input_length = 5000
//! strict = true
//!
//! [client]
//! model = "gemini-2.0-flash"
//! max_attempts = 3
//! base_backoff_ms = 1000
//! deadline_ms = 60000
//!
//! [global]
//! block_threat_level = "high"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shield_client::{ClientConfig, RetryPolicy};
use shield_sanitizer::{
    EscalationPolicy, SanitizeOptions, SanitizerConfig, ThreatAssessor, ThreatLevel,
};

use crate::error::ShieldError;
use crate::Result;

/// Levels accepted by `logging.level`.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for the Prompt Shield facade.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    /// Sanitizer limits and switches.
    pub sanitizer: SanitizerSettings,

    /// Model invocation settings.
    pub client: ClientSettings,

    /// Global settings.
    pub global: GlobalConfig,

    /// Log output settings.
    pub logging: LoggingConfig,
}

/// Sanitizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerSettings {
    /// Maximum input length in characters.
    pub max_input_length: usize,

    /// Maximum line length in characters.
    pub max_line_length: usize,

    /// Longest run of one character kept.
    pub max_char_repetition: usize,

    /// Longest run of one token kept.
    pub max_word_repetition: usize,

    /// Remove code patterns.
    pub strict: bool,

    /// Keep line structure.
    pub preserve_formatting: bool,

    /// Escape `<` and `>`.
    pub html_escape: bool,

    /// Redact PII before the text reaches the model.
    pub redact_pii: bool,

    /// Composite-threat escalation rule.
    pub escalation: EscalationPolicy,
}

impl Default for SanitizerSettings {
    fn default() -> Self {
        let options = SanitizeOptions::default();
        Self {
            max_input_length: shield_sanitizer::MAX_INPUT_LENGTH,
            max_line_length: shield_sanitizer::MAX_LINE_LENGTH,
            max_char_repetition: shield_sanitizer::MAX_CHAR_REPETITION,
            max_word_repetition: shield_sanitizer::MAX_WORD_REPETITION,
            strict: options.strict,
            preserve_formatting: options.preserve_formatting,
            html_escape: options.html_escape,
            redact_pii: options.redact_pii,
            escalation: EscalationPolicy::default(),
        }
    }
}

/// Model invocation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Model identifier handed to the transport.
    pub model: String,

    /// Attempts per invocation, the first call included.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub base_backoff_ms: u64,

    /// Ceiling for any single delay.
    pub max_backoff_ms: u64,

    /// Jitter as a fraction of the delay (0.0 - 1.0).
    pub jitter: f64,

    /// Overall budget per invocation. 0 disables it.
    pub deadline_ms: u64,

    /// Budget per outbound call. 0 disables it.
    pub attempt_timeout_ms: u64,

    /// Return the fallback payload instead of an error.
    pub fallback_on_error: bool,

    /// Keys the model payload must contain.
    pub required_fields: Vec<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            max_attempts: 3,
            base_backoff_ms: 1_000,
            max_backoff_ms: 10_000,
            jitter: 0.1,
            deadline_ms: 60_000,
            attempt_timeout_ms: 30_000,
            fallback_on_error: true,
            required_fields: Vec::new(),
        }
    }
}

/// Global Prompt Shield settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Skip the model and return the fallback payload for input at or above
    /// this level. Unset: never block.
    pub block_threat_level: Option<ThreatLevel>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ShieldError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ShieldError::Config(format!(
                "unknown log format '{other}' (expected text or json)"
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level; `RUST_LOG` takes precedence when set.
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl ShieldConfig {
    /// Loads a TOML file. Missing sections and keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ShieldError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Applies `SHIELD_*` environment variables on top of the current values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key lookup.
    ///
    /// | Key | Field |
    /// |-----|-------|
    /// | `SHIELD_MODEL` | `client.model` |
    /// | `SHIELD_MAX_ATTEMPTS` | `client.max_attempts` |
    /// | `SHIELD_BASE_BACKOFF_MS` | `client.base_backoff_ms` |
    /// | `SHIELD_DEADLINE_MS` | `client.deadline_ms` |
    /// | `SHIELD_FALLBACK_ON_ERROR` | `client.fallback_on_error` |
    /// | `SHIELD_LOG_LEVEL` | `logging.level` |
    /// | `SHIELD_LOG_FORMAT` | `logging.format` |
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("SHIELD_MODEL") {
            self.client.model = model;
        }
        if let Some(raw) = lookup("SHIELD_MAX_ATTEMPTS") {
            self.client.max_attempts = parse_var("SHIELD_MAX_ATTEMPTS", &raw)?;
        }
        if let Some(raw) = lookup("SHIELD_BASE_BACKOFF_MS") {
            self.client.base_backoff_ms = parse_var("SHIELD_BASE_BACKOFF_MS", &raw)?;
        }
        if let Some(raw) = lookup("SHIELD_DEADLINE_MS") {
            self.client.deadline_ms = parse_var("SHIELD_DEADLINE_MS", &raw)?;
        }
        if let Some(raw) = lookup("SHIELD_FALLBACK_ON_ERROR") {
            self.client.fallback_on_error = parse_bool("SHIELD_FALLBACK_ON_ERROR", &raw)?;
        }
        if let Some(level) = lookup("SHIELD_LOG_LEVEL") {
            self.logging.level = level.trim().to_ascii_lowercase();
        }
        if let Some(raw) = lookup("SHIELD_LOG_FORMAT") {
            self.logging.format = raw.parse()?;
        }
        Ok(())
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.sanitizer;
        for (name, value) in [
            ("sanitizer.max_input_length", s.max_input_length),
            ("sanitizer.max_line_length", s.max_line_length),
            ("sanitizer.max_char_repetition", s.max_char_repetition),
            ("sanitizer.max_word_repetition", s.max_word_repetition),
        ] {
            if value == 0 {
                return Err(ShieldError::Config(format!("{name} must be greater than 0")));
            }
        }

        let c = &self.client;
        if c.max_attempts == 0 {
            return Err(ShieldError::Config(
                "client.max_attempts must be at least 1".into(),
            ));
        }
        if c.max_backoff_ms < c.base_backoff_ms {
            return Err(ShieldError::Config(format!(
                "client.max_backoff_ms ({}) is below client.base_backoff_ms ({})",
                c.max_backoff_ms, c.base_backoff_ms
            )));
        }
        if !(0.0..=1.0).contains(&c.jitter) {
            return Err(ShieldError::Config(format!(
                "client.jitter must be within 0.0 - 1.0, got {}",
                c.jitter
            )));
        }
        if c.deadline_ms != 0 && c.deadline_ms < c.base_backoff_ms {
            return Err(ShieldError::Config(format!(
                "client.deadline_ms ({}) is shorter than client.base_backoff_ms ({})",
                c.deadline_ms, c.base_backoff_ms
            )));
        }
        if c.model.trim().is_empty() {
            return Err(ShieldError::Config("client.model must not be empty".into()));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ShieldError::Config(format!(
                "unknown log level '{}' (expected one of {})",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    pub fn sanitizer_config(&self) -> SanitizerConfig {
        let s = &self.sanitizer;
        SanitizerConfig::new()
            .with_max_input_length(s.max_input_length)
            .with_max_line_length(s.max_line_length)
            .with_max_char_repetition(s.max_char_repetition)
            .with_max_word_repetition(s.max_word_repetition)
            .with_assessor(ThreatAssessor::new().with_policy(s.escalation))
    }

    pub fn sanitize_options(&self) -> SanitizeOptions {
        let s = &self.sanitizer;
        SanitizeOptions::default()
            .strict(s.strict)
            .preserve_formatting(s.preserve_formatting)
            .html_escape(s.html_escape)
            .redact_pii(s.redact_pii)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let c = &self.client;
        RetryPolicy::new()
            .with_max_attempts(c.max_attempts)
            .with_base_backoff(Duration::from_millis(c.base_backoff_ms))
            .with_max_backoff(Duration::from_millis(c.max_backoff_ms))
            .with_jitter(c.jitter)
    }

    pub fn client_config(&self) -> ClientConfig {
        let c = &self.client;
        let config = ClientConfig::new()
            .with_policy(self.retry_policy())
            .with_attempt_timeout(non_zero_millis(c.attempt_timeout_ms));
        match non_zero_millis(c.deadline_ms) {
            Some(deadline) => config.with_deadline(deadline),
            None => config,
        }
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| ShieldError::Config(format!("{key} has invalid value '{raw}'")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ShieldError::Config(format!(
            "{key} has invalid value '{raw}' (expected true or false)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ShieldConfig::default();
        assert_eq!(config.sanitizer.max_input_length, 5000);
        assert_eq!(config.sanitizer.max_line_length, 500);
        assert_eq!(config.sanitizer.max_char_repetition, 50);
        assert_eq!(config.sanitizer.max_word_repetition, 10);
        assert_eq!(config.client.max_attempts, 3);
        assert!(config.client.fallback_on_error);
        assert_eq!(config.global.block_threat_level, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = ShieldConfig::default();
        let raw = toml::to_string(&config).unwrap();
        let parsed = ShieldConfig::from_toml_str(&raw).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml() {
        let config = ShieldConfig::from_toml_str(
            r#"
            [client]
            max_attempts = 5

            [global]
            block_threat_level = "high"
            "#,
        )
        .unwrap();
        assert_eq!(config.client.max_attempts, 5);
        assert_eq!(config.client.base_backoff_ms, 1_000);
        assert_eq!(config.global.block_threat_level, Some(ThreatLevel::High));
        assert_eq!(config.sanitizer.max_input_length, 5000);
    }

    #[test]
    fn test_partial_escalation_table() {
        let config = ShieldConfig::from_toml_str(
            r#"
            [sanitizer.escalation]
            enabled = false
            "#,
        )
        .unwrap();
        assert!(!config.sanitizer.escalation.enabled);
        assert_eq!(config.sanitizer.escalation.min_distinct_kinds, 2);
        assert_eq!(config.sanitizer.escalation.escalate_to, ThreatLevel::High);
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let err = ShieldConfig::from_toml_str("[client]\nmax_attempts = \"many\"").unwrap_err();
        assert!(matches!(err, ShieldError::ConfigParse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ShieldConfig::default();
        config
            .apply_overrides_from(lookup(&[
                ("SHIELD_MODEL", "gemini-2.0-pro"),
                ("SHIELD_MAX_ATTEMPTS", "4"),
                ("SHIELD_BASE_BACKOFF_MS", "250"),
                ("SHIELD_DEADLINE_MS", "0"),
                ("SHIELD_FALLBACK_ON_ERROR", "false"),
                ("SHIELD_LOG_LEVEL", "DEBUG"),
                ("SHIELD_LOG_FORMAT", "json"),
            ]))
            .unwrap();

        assert_eq!(config.client.model, "gemini-2.0-pro");
        assert_eq!(config.client.max_attempts, 4);
        assert_eq!(config.client.base_backoff_ms, 250);
        assert_eq!(config.client.deadline_ms, 0);
        assert!(!config.client.fallback_on_error);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override_bad_number() {
        let mut config = ShieldConfig::default();
        let err = config
            .apply_overrides_from(lookup(&[("SHIELD_MAX_ATTEMPTS", "three")]))
            .unwrap_err();
        assert!(err.to_string().contains("SHIELD_MAX_ATTEMPTS"));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = ShieldConfig::default();
        config.sanitizer.max_line_length = 0;
        assert!(config.validate().is_err());

        let mut config = ShieldConfig::default();
        config.client.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_short_deadline() {
        let mut config = ShieldConfig::default();
        config.client.base_backoff_ms = 2_000;
        config.client.deadline_ms = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut config = ShieldConfig::default();
        config.logging.level = "verbose".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_client_config_conversion() {
        let mut config = ShieldConfig::default();
        config.client.deadline_ms = 0;
        config.client.attempt_timeout_ms = 1_500;

        let client = config.client_config();
        assert_eq!(client.deadline, None);
        assert_eq!(client.attempt_timeout, Some(Duration::from_millis(1_500)));
        assert_eq!(client.policy.max_attempts, 3);
        assert_eq!(client.policy.base_backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_sanitizer_config_conversion() {
        let mut config = ShieldConfig::default();
        config.sanitizer.max_input_length = 100;
        config.sanitizer.escalation = EscalationPolicy::disabled();

        let sanitizer = config.sanitizer_config();
        assert_eq!(sanitizer.max_input_length, 100);
        assert!(!sanitizer.assessor.policy().enabled);
    }
}
