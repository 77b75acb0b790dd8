//! Tracing subscriber setup.
//!
//! Library crates only emit events; binaries call [`init_tracing`] once at
//! startup. Output goes to stderr so stdout stays free for command results.

use std::borrow::Cow;

use shield_sanitizer::PiiGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ShieldError;
use crate::Result;

/// Installs the global `fmt` subscriber.
///
/// `RUST_LOG`, when set, overrides `config.level`.
///
/// # Errors
///
/// Returns [`ShieldError::Logging`] if the level is not a valid filter or a
/// global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| ShieldError::Logging(format!("invalid level '{}': {e}", config.level)))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| ShieldError::Logging(e.to_string()))
}

/// Free text made safe to log: unchanged when it holds no PII, otherwise
/// redacted.
pub fn loggable(text: &str) -> Cow<'_, str> {
    PiiGuard::new().loggable(text)
}
