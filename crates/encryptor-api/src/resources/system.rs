//! `/system/health` and `/system/isolation-status` (§4.11, §6).

use std::sync::Arc;

use axum::extract::State;
use chrono::{DateTime, Utc};
use encryptor_core::entities::{IsolationCheck, IsolationValidationResult};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::health;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolationCheckDto {
    pub name: String,
    pub status: String,
    pub details: Option<String>,
}

impl From<&IsolationCheck> for IsolationCheckDto {
    fn from(c: &IsolationCheck) -> Self {
        Self { name: c.name.clone(), status: c.status.clone(), details: c.details.clone() }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolationResultDto {
    pub result_id: i64,
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub checks: Vec<IsolationCheckDto>,
    pub failures: Vec<String>,
    pub duration_seconds: f64,
}

impl From<&IsolationValidationResult> for IsolationResultDto {
    fn from(r: &IsolationValidationResult) -> Self {
        Self {
            result_id: r.result_id,
            status: r.status.clone(),
            timestamp: r.timestamp,
            checks: r.checks.iter().map(IsolationCheckDto::from).collect(),
            failures: r.failures.clone(),
            duration_seconds: r.duration_seconds,
        }
    }
}

/// `GET /api/v1/system/isolation-status`.
pub async fn isolation_status(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<Envelope<IsolationResultDto>, ApiError> {
    const INSTANCE: &str = "/api/v1/system/isolation-status";
    let result = state
        .store
        .latest_isolation_result()
        .await
        .map_err(|e| ApiError::from_storage(e, INSTANCE))?
        .ok_or_else(|| ApiError::not_found("IsolationValidationResult", INSTANCE))?;
    Ok(Envelope::ok(IsolationResultDto::from(&result)))
}

/// `GET /api/v1/system/health`.
pub async fn health(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<Envelope<health::HealthReport>, ApiError> {
    Ok(Envelope::ok(health::build_report(&state).await))
}
