//! Error types for Turnstile.

use thiserror::Error;

/// Main error type for Turnstile operations.
///
/// Every variant is a load-time failure. The admission hot path has no
/// failure mode and never returns this type.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Configuration parsing or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A `regexp:` whitelist rule failed to compile
    #[error("Failed to compile regex for whitelist rule '{rule}': {source}")]
    Pattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for TurnstileError {
    fn from(err: ::config::ConfigError) -> Self {
        TurnstileError::Config(err.to_string())
    }
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
