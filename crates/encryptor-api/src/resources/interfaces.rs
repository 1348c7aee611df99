//! `/interfaces` endpoints: list, detail, and address configuration with the
//! isolation-failure rollback exception to the "DB first, daemon
//! best-effort" rule (§4.7, §4.9, §8 scenario 4).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use encryptor_core::entities::{Interface, InterfaceName};
use encryptor_core::validate::validate_interface_config;
use encryptor_ipc::protocol::{Command, ConfigureInterfacePayload, ConfigureInterfaceResult, IsolationCheckStatus};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::envelope::{Envelope, Meta};
use crate::error::ApiError;
use crate::state::AppState;
use crate::telemetry::events;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDto {
    pub interface_id: i64,
    pub name: &'static str,
    pub namespace: &'static str,
    pub device: &'static str,
    pub ip_address: Option<String>,
    pub netmask: Option<String>,
    pub gateway: Option<String>,
}

impl From<Interface> for InterfaceDto {
    fn from(i: Interface) -> Self {
        Self {
            interface_id: i.interface_id,
            name: i.name.as_str(),
            namespace: i.name.namespace(),
            device: i.name.device(),
            ip_address: i.ip_address,
            netmask: i.netmask,
            gateway: i.gateway,
        }
    }
}

fn parse_name(raw: &str, instance: &str) -> Result<InterfaceName, ApiError> {
    InterfaceName::parse(raw).ok_or_else(|| ApiError::not_found("Interface", instance))
}

/// `GET /api/v1/interfaces`.
pub async fn list(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<Envelope<Vec<InterfaceDto>>, ApiError> {
    let interfaces = state
        .store
        .list_interfaces()
        .await
        .map_err(|e| ApiError::from_storage(e, "/api/v1/interfaces"))?;
    Ok(Envelope::ok(interfaces.into_iter().map(InterfaceDto::from).collect()))
}

/// `GET /api/v1/interfaces/{name}`.
pub async fn get(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(name): Path<String>,
) -> Result<Envelope<InterfaceDto>, ApiError> {
    let instance = format!("/api/v1/interfaces/{name}");
    let parsed = parse_name(&name, &instance)?;
    let interface = state
        .store
        .get_interface(parsed)
        .await
        .map_err(|e| ApiError::from_storage(e, &instance))?;
    Ok(Envelope::ok(interface.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureInterfaceRequest {
    pub ip_address: String,
    pub netmask: String,
    pub gateway: String,
}

/// `POST /api/v1/interfaces/{name}/configure`.
pub async fn configure(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(name): Path<String>,
    Json(body): Json<ConfigureInterfaceRequest>,
) -> Result<axum::response::Response, ApiError> {
    use axum::response::IntoResponse;

    let instance = format!("/api/v1/interfaces/{name}/configure");
    let parsed = parse_name(&name, &instance)?;

    validate_interface_config(&body.ip_address, &body.netmask, &body.gateway)
        .map_err(|e| ApiError::validation(e, &instance))?;

    let previous = state
        .store
        .get_interface(parsed)
        .await
        .map_err(|e| ApiError::from_storage(e, &instance))?;

    let updated = state
        .store
        .update_interface_config(parsed, &body.ip_address, &body.netmask, &body.gateway)
        .await
        .map_err(|e| ApiError::from_storage(e, &instance))?;

    let payload = ConfigureInterfacePayload {
        name: parsed.as_str().to_string(),
        ip_address: body.ip_address.clone(),
        netmask: body.netmask.clone(),
        gateway: body.gateway.clone(),
    };

    let daemon_result = state
        .daemon
        .call_typed::<_, ConfigureInterfaceResult>(Command::ConfigureInterface, &payload)
        .await;

    let meta = match daemon_result {
        Ok(result) if result.isolation.status == IsolationCheckStatus::Fail => {
            tracing::error!(
                interface = %name,
                message = %result.isolation.message,
                "isolation check failed after interface reconfiguration, rolling back"
            );
            if let Err(e) = state
                .store
                .rollback_interface_config(
                    parsed,
                    previous.ip_address.as_deref(),
                    previous.netmask.as_deref(),
                    previous.gateway.as_deref(),
                )
                .await
            {
                tracing::error!(error = %e, "failed to roll back interface config after isolation failure");
            }
            return Ok(ApiError::isolation_rollback(result.isolation.message, instance).into_response());
        }
        Ok(_) => Meta::daemon_ok(),
        Err(e) => {
            tracing::warn!(interface = %name, error = %e, "daemon unreachable while configuring interface");
            Meta::daemon_soft_failure(e.to_string())
        }
    };

    state
        .connections
        .broadcast(events::interface_config_changed("updated", parsed.as_str()))
        .await;

    Ok(Envelope::new(InterfaceDto::from(updated), meta).into_response())
}
