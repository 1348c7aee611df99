//! The `{data, meta}` success envelope shared by every REST endpoint (§6).

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Per-mutation metadata: whether the daemon was reachable and completed the
/// requested operation, and an optional human-readable detail.
///
/// `daemon_available` is `None` when the daemon was intentionally not
/// contacted (e.g. a route mutation on a disabled peer).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daemon_available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl Meta {
    /// No daemon involvement and nothing to warn about (plain reads).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The daemon was contacted and fully completed the operation.
    #[must_use]
    pub fn daemon_ok() -> Self {
        Self { daemon_available: Some(true), warning: None }
    }

    /// The daemon was contacted but failed or could not be reached; the
    /// persisted state still stands (§4.9 step 3).
    #[must_use]
    pub fn daemon_soft_failure(warning: impl Into<String>) -> Self {
        Self { daemon_available: Some(false), warning: Some(warning.into()) }
    }

    /// The daemon was deliberately not contacted (disabled peer route CRUD).
    #[must_use]
    pub fn daemon_skipped(warning: impl Into<String>) -> Self {
        Self { daemon_available: None, warning: Some(warning.into()) }
    }
}

/// `{"data": ..., "meta": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    pub meta: Meta,
}

impl<T> Envelope<T> {
    #[must_use]
    pub fn new(data: T, meta: Meta) -> Self {
        Self { data, meta }
    }

    /// An envelope for a plain read with no daemon involvement.
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self { data, meta: Meta::empty() }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
