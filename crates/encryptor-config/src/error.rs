//! Configuration loading error types.

use thiserror::Error;

/// Errors encountered while resolving process configuration from the
/// environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    /// An environment variable was set but could not be parsed into its
    /// expected type.
    #[error("invalid value for environment variable {name}: {reason}")]
    InvalidValue {
        /// The variable name.
        name: &'static str,
        /// Why parsing failed.
        reason: String,
    },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
