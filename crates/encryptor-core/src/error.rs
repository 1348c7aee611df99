//! Validation error types shared by every entity in this crate.

use thiserror::Error;

/// A field-level validation failure.
///
/// Carries enough structured context (`field`, `message`) that callers at
/// the REST and IPC boundaries can build their own error envelopes without
/// re-deriving it from a formatted string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was missing or empty.
    #[error("{field} is required")]
    Required {
        /// The field that was missing.
        field: &'static str,
    },

    /// A field's value was syntactically invalid.
    #[error("{field} is invalid: {reason}")]
    Invalid {
        /// The field that failed validation.
        field: &'static str,
        /// Human-readable reason, safe to surface in an RFC 7807 `detail`.
        reason: String,
    },

    /// A field's value was outside its allowed numeric range.
    #[error("{field} must be between {min} and {max}, got {actual}")]
    OutOfRange {
        /// The field that was out of range.
        field: &'static str,
        /// Minimum allowed value (inclusive).
        min: i64,
        /// Maximum allowed value (inclusive).
        max: i64,
        /// The value that was rejected.
        actual: i64,
    },

    /// Two fields that must satisfy a relative ordering did not.
    #[error("{field} ({actual}) must be greater than {other_field} ({other})")]
    MustExceed {
        /// The field that failed the comparison.
        field: &'static str,
        /// Its value.
        actual: i64,
        /// The field it must exceed.
        other_field: &'static str,
        /// The other field's value.
        other: i64,
    },
}

/// Result type for validation and normalisation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;
