//! Telemetry setup error types.

use thiserror::Error;

/// Errors that can occur while setting up logging.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured directive string was not valid `EnvFilter` syntax.
    #[error("invalid log directive: {0}")]
    InvalidDirective(String),

    /// A global tracing subscriber was already installed for this process.
    #[error("a tracing subscriber is already installed")]
    AlreadyInitialized,

    /// The configured file target could not be opened.
    #[error("failed to open log file: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for telemetry setup.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
