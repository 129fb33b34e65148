//! Structured error types for seedpoll-core.
//!
//! Configuration problems are fatal at startup, before any connection
//! attempt is made. The binary wraps these in `anyhow` with context.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for seedpoll-core operations
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Required environment variable is not set (or is blank)
    #[error("Missing required environment variable '{var}'")]
    MissingEnv { var: String },

    /// A value was present but could not be used
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// Settings file could not be read
    #[error("Failed to read settings file {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },

    /// Settings file is not valid TOML for the expected shape
    #[error("Failed to parse settings file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Result type alias for seedpoll-core operations
pub type Result<T> = std::result::Result<T, ConfigError>;

impl ConfigError {
    /// Create a missing environment variable error
    pub fn missing_env(var: impl Into<String>) -> Self {
        Self::MissingEnv { var: var.into() }
    }

    /// Create an invalid value error
    pub fn invalid_value(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
