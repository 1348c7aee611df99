//! API-boundary error type and its RFC 7807 rendering (§7, §11).
//!
//! Every handler returns `Result<_, ApiError>` rather than reaching for
//! `anyhow` at this layer: the REST surface needs to pattern-match a kind to
//! a status code, not string-sniff a message. Each variant carries the
//! request path so `instance` is always the path that actually failed (§8
//! scenario 4), rather than a placeholder filled in after the fact.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use encryptor_core::error::ValidationError;
use serde::Serialize;

/// RFC 7807 "problem details" body.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub type_: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
}

/// Concrete, enumerable API error kinds (§7, §11). Every handler-visible
/// failure fits one of these; there is no opaque catch-all variant at this
/// boundary.
#[derive(Debug)]
pub enum ApiError {
    /// Entity validation failed (§3 rules). 422.
    Validation { source: ValidationError, instance: String },
    /// A free-form 422, for cross-field checks that are not one
    /// [`ValidationError`] (password complexity/reuse).
    UnprocessableEntity { detail: String, instance: String },
    /// Resource not found. 404.
    NotFound { resource: &'static str, instance: String },
    /// Unique-name collision, or peer not ready for initiation. 409.
    Conflict { detail: String, instance: String },
    /// Missing, malformed, or expired credentials/token. 401. The message is
    /// always the fixed generic string so login failure does not leak
    /// whether the username existed (§7).
    Unauthorized { instance: String },
    /// Daemon could not complete an operation the caller needs synchronously
    /// (currently only `initiate_peer`). 503.
    DaemonUnavailable { detail: String, instance: String },
    /// The daemon reported an isolation-check failure after
    /// `configure_interface`; the caller has already rolled the database
    /// back to its previous values. 500.
    IsolationRollback { detail: String, instance: String },
    /// A lower-layer store/crypto/IPC failure with no more specific
    /// handling above. 500.
    Internal { source: anyhow::Error, instance: String },
}

impl ApiError {
    /// Build a [`ApiError::Validation`] anchored at `instance`.
    #[must_use]
    pub fn validation(source: ValidationError, instance: impl Into<String>) -> Self {
        ApiError::Validation { source, instance: instance.into() }
    }

    /// Build a [`ApiError::UnprocessableEntity`] anchored at `instance`.
    #[must_use]
    pub fn unprocessable(detail: impl Into<String>, instance: impl Into<String>) -> Self {
        ApiError::UnprocessableEntity { detail: detail.into(), instance: instance.into() }
    }

    /// Build a [`ApiError::NotFound`] anchored at `instance`.
    #[must_use]
    pub fn not_found(resource: &'static str, instance: impl Into<String>) -> Self {
        ApiError::NotFound { resource, instance: instance.into() }
    }

    /// Build a [`ApiError::Conflict`] anchored at `instance`.
    #[must_use]
    pub fn conflict(detail: impl Into<String>, instance: impl Into<String>) -> Self {
        ApiError::Conflict { detail: detail.into(), instance: instance.into() }
    }

    /// Build a [`ApiError::Unauthorized`] anchored at `instance`.
    #[must_use]
    pub fn unauthorized(instance: impl Into<String>) -> Self {
        ApiError::Unauthorized { instance: instance.into() }
    }

    /// Build a [`ApiError::DaemonUnavailable`] anchored at `instance`.
    #[must_use]
    pub fn daemon_unavailable(detail: impl Into<String>, instance: impl Into<String>) -> Self {
        ApiError::DaemonUnavailable { detail: detail.into(), instance: instance.into() }
    }

    /// Build a [`ApiError::IsolationRollback`] anchored at `instance`.
    #[must_use]
    pub fn isolation_rollback(detail: impl Into<String>, instance: impl Into<String>) -> Self {
        ApiError::IsolationRollback { detail: detail.into(), instance: instance.into() }
    }

    /// Build a [`ApiError::Internal`] anchored at `instance`.
    #[must_use]
    pub fn internal(source: impl Into<anyhow::Error>, instance: impl Into<String>) -> Self {
        ApiError::Internal { source: source.into(), instance: instance.into() }
    }

    /// Convert a lower-layer [`StorageError`](encryptor_storage::StorageError)
    /// into an `ApiError` anchored at `instance`, mapping not-found and
    /// duplicate-name into their dedicated variants rather than a blanket 500.
    #[must_use]
    pub fn from_storage(e: encryptor_storage::StorageError, instance: impl Into<String>) -> Self {
        let instance = instance.into();
        match e {
            encryptor_storage::StorageError::NotFound { entity, .. } => {
                ApiError::not_found(entity, instance)
            }
            encryptor_storage::StorageError::DuplicateName { entity, name } => {
                ApiError::conflict(format!("{entity} named {name:?} already exists"), instance)
            }
            other => ApiError::internal(other, instance),
        }
    }

    fn problem(&self) -> (StatusCode, ProblemDetails) {
        match self {
            ApiError::Validation { source, instance } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ProblemDetails {
                    type_: "about:blank".to_string(),
                    title: "Validation failed".to_string(),
                    status: 422,
                    detail: source.to_string(),
                    instance: instance.clone(),
                },
            ),
            ApiError::UnprocessableEntity { detail, instance } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ProblemDetails {
                    type_: "about:blank".to_string(),
                    title: "Validation failed".to_string(),
                    status: 422,
                    detail: detail.clone(),
                    instance: instance.clone(),
                },
            ),
            ApiError::NotFound { resource, instance } => (
                StatusCode::NOT_FOUND,
                ProblemDetails {
                    type_: "about:blank".to_string(),
                    title: "Not found".to_string(),
                    status: 404,
                    detail: format!("{resource} not found"),
                    instance: instance.clone(),
                },
            ),
            ApiError::Conflict { detail, instance } => (
                StatusCode::CONFLICT,
                ProblemDetails {
                    type_: "about:blank".to_string(),
                    title: "Conflict".to_string(),
                    status: 409,
                    detail: detail.clone(),
                    instance: instance.clone(),
                },
            ),
            ApiError::Unauthorized { instance } => (
                StatusCode::UNAUTHORIZED,
                ProblemDetails {
                    type_: "about:blank".to_string(),
                    title: "Unauthorized".to_string(),
                    status: 401,
                    detail: "invalid credentials or token".to_string(),
                    instance: instance.clone(),
                },
            ),
            ApiError::DaemonUnavailable { detail, instance } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ProblemDetails {
                    type_: "about:blank".to_string(),
                    title: "Daemon unavailable".to_string(),
                    status: 503,
                    detail: detail.clone(),
                    instance: instance.clone(),
                },
            ),
            ApiError::IsolationRollback { detail, instance } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ProblemDetails {
                    type_: "about:blank".to_string(),
                    title: "Isolation check failed".to_string(),
                    status: 500,
                    detail: detail.clone(),
                    instance: instance.clone(),
                },
            ),
            ApiError::Internal { source, instance } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ProblemDetails {
                    type_: "about:blank".to_string(),
                    title: "Internal error".to_string(),
                    status: 500,
                    detail: source.to_string(),
                    instance: instance.clone(),
                },
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.problem();
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_renders_as_422_with_instance() {
        let err = ApiError::validation(
            ValidationError::Required { field: "name" },
            "/api/v1/peers",
        );
        let (status, body) = err.problem();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.instance, "/api/v1/peers");
        assert_eq!(body.status, 422);
    }

    #[test]
    fn unauthorized_never_varies_its_detail() {
        let unknown_user = ApiError::unauthorized("/api/v1/auth/login");
        let wrong_password = ApiError::unauthorized("/api/v1/auth/login");
        let (_, a) = unknown_user.problem();
        let (_, b) = wrong_password.problem();
        assert_eq!(a.detail, b.detail);
    }
}
