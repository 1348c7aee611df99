//! `/peers` CRUD, `/peers/{id}/initiate`, and the enable/disable transition
//! logic the daemon needs re-derived on every mutation (§4.9).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use encryptor_core::entities::{DpdAction, IkeVersion, OperationalStatus, Peer};
use encryptor_core::error::ValidationError;
use encryptor_core::validate;
use encryptor_ipc::protocol::{Command, ConfigurePeerPayload, OpStatus, PeerRefPayload, UpdateRoutesPayload};
use encryptor_storage::peers::{NewPeer, PeerUpdate};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::envelope::{Envelope, Meta};
use crate::error::ApiError;
use crate::state::AppState;
use crate::telemetry::events;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerDto {
    pub peer_id: i64,
    pub name: String,
    pub remote_ip: String,
    pub ike_version: &'static str,
    pub enabled: bool,
    pub dpd_action: &'static str,
    pub dpd_delay: i64,
    pub dpd_timeout: i64,
    pub rekey_time: i64,
    pub operational_status: &'static str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn operational_status_str(status: OperationalStatus) -> &'static str {
    match status {
        OperationalStatus::Ready => "ready",
        OperationalStatus::Incomplete => "incomplete",
    }
}

impl From<&Peer> for PeerDto {
    fn from(p: &Peer) -> Self {
        Self {
            peer_id: p.peer_id,
            name: p.name.clone(),
            remote_ip: p.remote_ip.clone(),
            ike_version: p.ike_version.as_str(),
            enabled: p.enabled,
            dpd_action: p.dpd_action.as_str(),
            dpd_delay: p.dpd_delay,
            dpd_timeout: p.dpd_timeout,
            rekey_time: p.rekey_time,
            operational_status: operational_status_str(p.operational_status()),
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

fn decrypt_psk(state: &AppState, peer: &Peer, instance: &str) -> Result<String, ApiError> {
    let plaintext = state
        .psk_vault
        .decrypt(&peer.psk_encrypted, &peer.psk_nonce)
        .map_err(|e| ApiError::internal(e, instance))?;
    String::from_utf8(plaintext).map_err(|e| ApiError::internal(e, instance))
}

async fn current_routes(state: &AppState, peer_id: i64, instance: &str) -> Result<Vec<String>, ApiError> {
    Ok(state
        .store
        .list_routes_for_peer(peer_id)
        .await
        .map_err(|e| ApiError::from_storage(e, instance))?
        .into_iter()
        .map(|r| r.destination_cidr)
        .collect())
}

async fn configure_peer_on_daemon(state: &AppState, peer: &Peer, instance: &str) -> Meta {
    let psk = match decrypt_psk(state, peer, instance) {
        Ok(psk) => psk,
        Err(e) => {
            tracing::warn!(peer_id = peer.peer_id, error = ?e, "failed to decrypt PSK for configure_peer");
            return Meta::daemon_soft_failure("failed to decrypt PSK");
        }
    };
    let routes = current_routes(state, peer.peer_id, instance).await.unwrap_or_default();

    let payload = ConfigurePeerPayload {
        peer_id: peer.peer_id,
        name: peer.name.clone(),
        remote_ip: peer.remote_ip.clone(),
        psk,
        ike_version: peer.ike_version.as_str().to_string(),
        dpd_action: peer.dpd_action.as_str().to_string(),
        dpd_delay: peer.dpd_delay,
        dpd_timeout: peer.dpd_timeout,
        rekey_time: peer.rekey_time,
        routes,
    };

    match state.daemon.call_typed::<_, encryptor_ipc::protocol::OpResult>(Command::ConfigurePeer, &payload).await {
        Ok(_) => Meta::daemon_ok(),
        Err(e) => {
            tracing::warn!(peer_id = peer.peer_id, error = %e, "daemon unreachable while configuring peer");
            Meta::daemon_soft_failure(e.to_string())
        }
    }
}

async fn update_routes_on_daemon(state: &AppState, peer: &Peer, instance: &str) -> Meta {
    let routes = current_routes(state, peer.peer_id, instance).await.unwrap_or_default();
    let payload = UpdateRoutesPayload { peer_id: peer.peer_id, name: peer.name.clone(), routes };
    match state.daemon.call_typed::<_, encryptor_ipc::protocol::OpResult>(Command::UpdateRoutes, &payload).await {
        Ok(_) => Meta::daemon_ok(),
        Err(e) => {
            tracing::warn!(peer_id = peer.peer_id, error = %e, "daemon unreachable while updating routes");
            Meta::daemon_soft_failure(e.to_string())
        }
    }
}

async fn teardown_and_remove(state: &AppState, peer: &Peer) -> Meta {
    let ref_payload = PeerRefPayload { peer_id: peer.peer_id, name: peer.name.clone() };

    let teardown = state
        .daemon
        .call_typed::<_, encryptor_ipc::protocol::OpResult>(Command::TeardownPeer, &ref_payload)
        .await;
    let remove = state
        .daemon
        .call_typed::<_, encryptor_ipc::protocol::OpResult>(Command::RemovePeerConfig, &ref_payload)
        .await;

    match (teardown, remove) {
        (Ok(_), Ok(_)) => Meta::daemon_ok(),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(peer_id = peer.peer_id, error = %e, "daemon unreachable while tearing down peer");
            Meta::daemon_soft_failure(e.to_string())
        }
    }
}

/// `GET /api/v1/peers`.
pub async fn list(State(state): State<Arc<AppState>>, _user: AuthUser) -> Result<Envelope<Vec<PeerDto>>, ApiError> {
    let peers = state.store.list_peers().await.map_err(|e| ApiError::from_storage(e, "/api/v1/peers"))?;
    Ok(Envelope::ok(peers.iter().map(PeerDto::from).collect()))
}

/// `GET /api/v1/peers/{id}`.
pub async fn get(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(peer_id): Path<i64>,
) -> Result<Envelope<PeerDto>, ApiError> {
    let instance = format!("/api/v1/peers/{peer_id}");
    let peer = state.store.get_peer(peer_id).await.map_err(|e| ApiError::from_storage(e, &instance))?;
    Ok(Envelope::ok(PeerDto::from(&peer)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerRequest {
    pub name: String,
    pub remote_ip: String,
    #[serde(default)]
    pub psk: Option<String>,
    pub ike_version: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_dpd_action")]
    pub dpd_action: String,
    #[serde(default = "default_dpd_delay")]
    pub dpd_delay: i64,
    #[serde(default = "default_dpd_timeout")]
    pub dpd_timeout: i64,
    #[serde(default = "default_rekey_time")]
    pub rekey_time: i64,
}

fn default_enabled() -> bool {
    true
}
fn default_dpd_action() -> String {
    "restart".to_string()
}
fn default_dpd_delay() -> i64 {
    30
}
fn default_dpd_timeout() -> i64 {
    150
}
fn default_rekey_time() -> i64 {
    3600
}

fn validate_peer_fields(
    req: &PeerRequest,
    instance: &str,
) -> Result<(IkeVersion, DpdAction), ApiError> {
    validate::validate_peer_name(&req.name).map_err(|e| ApiError::validation(e, instance))?;
    validate::validate_remote_ip(&req.remote_ip).map_err(|e| ApiError::validation(e, instance))?;
    let ike_version =
        validate::validate_ike_version(&req.ike_version).map_err(|e| ApiError::validation(e, instance))?;
    let dpd_action =
        validate::validate_dpd_action(&req.dpd_action).map_err(|e| ApiError::validation(e, instance))?;
    validate::validate_dpd_params(req.dpd_delay, req.dpd_timeout)
        .map_err(|e| ApiError::validation(e, instance))?;
    validate::validate_rekey_time(req.rekey_time).map_err(|e| ApiError::validation(e, instance))?;
    Ok((ike_version, dpd_action))
}

/// `POST /api/v1/peers`.
pub async fn create(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Json(body): Json<PeerRequest>,
) -> Result<Envelope<PeerDto>, ApiError> {
    const INSTANCE: &str = "/api/v1/peers";

    let (ike_version, dpd_action) = validate_peer_fields(&body, INSTANCE)?;
    let psk = body.psk.clone().filter(|p| !p.is_empty()).ok_or_else(|| {
        ApiError::validation(ValidationError::Required { field: "psk" }, INSTANCE)
    })?;

    let wrapped = state.psk_vault.encrypt(psk.as_bytes()).map_err(|e| ApiError::internal(e, INSTANCE))?;

    let created = state
        .store
        .create_peer(NewPeer {
            name: body.name,
            remote_ip: body.remote_ip,
            psk_encrypted: wrapped.ciphertext,
            psk_nonce: wrapped.nonce,
            ike_version,
            enabled: body.enabled,
            dpd_action,
            dpd_delay: body.dpd_delay,
            dpd_timeout: body.dpd_timeout,
            rekey_time: body.rekey_time,
        })
        .await
        .map_err(|e| ApiError::from_storage(e, INSTANCE))?;

    let meta = if created.enabled {
        configure_peer_on_daemon(&state, &created, INSTANCE).await
    } else {
        Meta::empty()
    };

    state.connections.broadcast(events::peer_config_changed("created", created.peer_id)).await;

    Ok(Envelope::new(PeerDto::from(&created), meta))
}

/// `PUT /api/v1/peers/{id}`.
pub async fn update(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(peer_id): Path<i64>,
    Json(body): Json<PeerRequest>,
) -> Result<Envelope<PeerDto>, ApiError> {
    let instance = format!("/api/v1/peers/{peer_id}");

    let (ike_version, dpd_action) = validate_peer_fields(&body, &instance)?;

    let before = state.store.get_peer(peer_id).await.map_err(|e| ApiError::from_storage(e, &instance))?;

    let psk = match body.psk.filter(|p| !p.is_empty()) {
        Some(plaintext) => {
            let wrapped =
                state.psk_vault.encrypt(plaintext.as_bytes()).map_err(|e| ApiError::internal(e, &instance))?;
            Some((wrapped.ciphertext, wrapped.nonce))
        }
        None => None,
    };

    let updated = state
        .store
        .update_peer(
            peer_id,
            PeerUpdate {
                name: Some(body.name),
                remote_ip: Some(body.remote_ip),
                psk,
                ike_version: Some(ike_version),
                enabled: Some(body.enabled),
                dpd_action: Some(dpd_action),
                dpd_delay: Some(body.dpd_delay),
                dpd_timeout: Some(body.dpd_timeout),
                rekey_time: Some(body.rekey_time),
            },
        )
        .await
        .map_err(|e| ApiError::from_storage(e, &instance))?;

    let meta = if !before.enabled && updated.enabled {
        let configure = configure_peer_on_daemon(&state, &updated, &instance).await;
        let routes = update_routes_on_daemon(&state, &updated, &instance).await;
        if configure.daemon_available == Some(false) {
            configure
        } else {
            routes
        }
    } else if before.enabled && !updated.enabled {
        let meta = teardown_and_remove(&state, &updated).await;
        state
            .connections
            .broadcast(events::tunnel_status_changed(
                updated.peer_id,
                &updated.name,
                encryptor_ipc::protocol::TunnelState::Down,
                None,
                0,
                0,
                0,
                0,
                false,
                None,
            ))
            .await;
        meta
    } else if updated.enabled {
        configure_peer_on_daemon(&state, &updated, &instance).await
    } else {
        Meta::empty()
    };

    state.connections.broadcast(events::peer_config_changed("updated", updated.peer_id)).await;

    Ok(Envelope::new(PeerDto::from(&updated), meta))
}

/// `DELETE /api/v1/peers/{id}`.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(peer_id): Path<i64>,
) -> Result<Envelope<PeerDto>, ApiError> {
    let instance = format!("/api/v1/peers/{peer_id}");

    let peer = state.store.get_peer(peer_id).await.map_err(|e| ApiError::from_storage(e, &instance))?;

    let meta = teardown_and_remove(&state, &peer).await;

    state.store.delete_peer(peer_id).await.map_err(|e| ApiError::from_storage(e, &instance))?;

    state
        .connections
        .broadcast(events::tunnel_status_changed(
            peer.peer_id,
            &peer.name,
            encryptor_ipc::protocol::TunnelState::Down,
            None,
            0,
            0,
            0,
            0,
            false,
            None,
        ))
        .await;
    state.connections.broadcast(events::peer_config_changed("deleted", peer.peer_id)).await;

    Ok(Envelope::new(PeerDto::from(&peer), meta))
}

/// `POST /api/v1/peers/{id}/initiate`.
pub async fn initiate(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(peer_id): Path<i64>,
) -> Result<Envelope<serde_json::Value>, ApiError> {
    let instance = format!("/api/v1/peers/{peer_id}/initiate");

    let peer = state.store.get_peer(peer_id).await.map_err(|e| ApiError::from_storage(e, &instance))?;
    if peer.operational_status() != OperationalStatus::Ready {
        return Err(ApiError::conflict("peer is not ready for initiation", instance));
    }

    let payload = PeerRefPayload { peer_id: peer.peer_id, name: peer.name.clone() };
    let result = state
        .daemon
        .call_typed::<_, encryptor_ipc::protocol::OpResult>(Command::InitiatePeer, &payload)
        .await
        .map_err(|e| ApiError::daemon_unavailable(e.to_string(), instance.clone()))?;

    if result.status == OpStatus::Warning {
        return Err(ApiError::daemon_unavailable(result.message, instance));
    }

    let already_up = result.message.to_ascii_lowercase().contains("already");
    if !already_up {
        state
            .connections
            .broadcast(events::tunnel_status_changed(
                peer.peer_id,
                &peer.name,
                encryptor_ipc::protocol::TunnelState::Negotiating,
                None,
                0,
                0,
                0,
                0,
                false,
                None,
            ))
            .await;
    }

    Ok(Envelope::new(serde_json::json!({ "message": result.message }), Meta::daemon_ok()))
}
