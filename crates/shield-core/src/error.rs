//! Error types for Prompt Shield Core.

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for shield operations.
#[derive(Debug, Error)]
pub enum ShieldError {
    /// Configuration values are invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        /// Path that was requested
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for [`ShieldConfig`](crate::ShieldConfig).
    #[error("Invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Tracing subscriber could not be installed.
    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// Model invocation error passthrough.
    #[error("Invocation error: {0}")]
    Invocation(#[from] shield_client::InvocationError),
}
