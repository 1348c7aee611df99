//! `/routes` CRUD, including the `?peerId=` filter and the disabled-peer
//! daemon-skip rule (§4.9 "Route endpoints").

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use encryptor_core::cidr::normalize_cidr;
use encryptor_ipc::protocol::{Command, OpResult, UpdateRoutesPayload};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::envelope::{Envelope, Meta};
use crate::error::ApiError;
use crate::state::AppState;
use crate::telemetry::events;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDto {
    pub route_id: i64,
    pub peer_id: i64,
    pub destination_cidr: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&encryptor_core::entities::Route> for RouteDto {
    fn from(r: &encryptor_core::entities::Route) -> Self {
        Self {
            route_id: r.route_id,
            peer_id: r.peer_id,
            destination_cidr: r.destination_cidr.clone(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "peerId")]
    pub peer_id: Option<i64>,
}

/// `GET /api/v1/routes` (optionally filtered by `?peerId=`).
pub async fn list(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Envelope<Vec<RouteDto>>, ApiError> {
    const INSTANCE: &str = "/api/v1/routes";

    let routes = match query.peer_id {
        Some(peer_id) => {
            // Confirm the peer exists so an unknown `peerId` 404s rather than
            // silently returning an empty list.
            state.store.get_peer(peer_id).await.map_err(|e| ApiError::from_storage(e, INSTANCE))?;
            state.store.list_routes_for_peer(peer_id).await.map_err(|e| ApiError::from_storage(e, INSTANCE))?
        }
        None => state.store.list_all_routes().await.map_err(|e| ApiError::from_storage(e, INSTANCE))?,
    };

    Ok(Envelope::ok(routes.iter().map(RouteDto::from).collect()))
}

/// `GET /api/v1/routes/{id}`.
pub async fn get(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(route_id): Path<i64>,
) -> Result<Envelope<RouteDto>, ApiError> {
    let instance = format!("/api/v1/routes/{route_id}");
    let route = state.store.get_route(route_id).await.map_err(|e| ApiError::from_storage(e, &instance))?;
    Ok(Envelope::ok(RouteDto::from(&route)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    pub peer_id: i64,
    pub destination_cidr: String,
}

/// Push the peer's full route set (not a delta) to the daemon, unless the
/// peer is currently disabled, in which case the daemon is not contacted at
/// all and the caller gets `meta.warning` explaining why (§4.9).
async fn sync_routes_to_daemon(state: &AppState, peer_id: i64, instance: &str) -> Meta {
    let peer = match state.store.get_peer(peer_id).await {
        Ok(peer) => peer,
        Err(e) => return Meta::daemon_soft_failure(format!("failed to reload peer: {e}")),
    };
    if !peer.enabled {
        return Meta::daemon_skipped("Peer is disabled - daemon not updated");
    }

    let routes = match state.store.list_routes_for_peer(peer_id).await {
        Ok(routes) => routes.into_iter().map(|r| r.destination_cidr).collect(),
        Err(e) => return Meta::daemon_soft_failure(format!("failed to reload routes: {e}")),
    };

    let payload = UpdateRoutesPayload { peer_id: peer.peer_id, name: peer.name.clone(), routes };
    match state.daemon.call_typed::<_, OpResult>(Command::UpdateRoutes, &payload).await {
        Ok(_) => Meta::daemon_ok(),
        Err(e) => {
            tracing::warn!(peer_id, error = %e, instance, "daemon unreachable while syncing routes");
            Meta::daemon_soft_failure(e.to_string())
        }
    }
}

/// `POST /api/v1/routes`.
pub async fn create(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Json(body): Json<RouteRequest>,
) -> Result<Envelope<RouteDto>, ApiError> {
    const INSTANCE: &str = "/api/v1/routes";

    let normalized = normalize_cidr(&body.destination_cidr).map_err(|e| ApiError::validation(e, INSTANCE))?;

    let route =
        state.store.create_route(body.peer_id, &normalized).await.map_err(|e| ApiError::from_storage(e, INSTANCE))?;

    let meta = sync_routes_to_daemon(&state, body.peer_id, INSTANCE).await;

    state.connections.broadcast(events::route_config_changed("created", route.route_id, route.peer_id)).await;

    Ok(Envelope::new(RouteDto::from(&route), meta))
}

/// `PUT /api/v1/routes/{id}`. Re-normalises and replaces the CIDR in place;
/// the route keeps its id and owning peer.
pub async fn update(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(route_id): Path<i64>,
    Json(body): Json<RouteRequest>,
) -> Result<Envelope<RouteDto>, ApiError> {
    let instance = format!("/api/v1/routes/{route_id}");

    let normalized = normalize_cidr(&body.destination_cidr).map_err(|e| ApiError::validation(e, &instance))?;

    let route = state
        .store
        .update_route(route_id, &normalized)
        .await
        .map_err(|e| ApiError::from_storage(e, &instance))?;

    let meta = sync_routes_to_daemon(&state, route.peer_id, &instance).await;

    state.connections.broadcast(events::route_config_changed("updated", route.route_id, route.peer_id)).await;

    Ok(Envelope::new(RouteDto::from(&route), meta))
}

/// `DELETE /api/v1/routes/{id}`.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(route_id): Path<i64>,
) -> Result<Envelope<RouteDto>, ApiError> {
    let instance = format!("/api/v1/routes/{route_id}");

    let route = state.store.get_route(route_id).await.map_err(|e| ApiError::from_storage(e, &instance))?;
    state.store.delete_route(route_id).await.map_err(|e| ApiError::from_storage(e, &instance))?;

    let meta = sync_routes_to_daemon(&state, route.peer_id, &instance).await;

    state.connections.broadcast(events::route_config_changed("deleted", route.route_id, route.peer_id)).await;

    Ok(Envelope::new(RouteDto::from(&route), meta))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_dto_carries_normalised_cidr() {
        let route = encryptor_core::entities::Route {
            route_id: 1,
            peer_id: 2,
            destination_cidr: "10.0.0.0/8".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let dto = RouteDto::from(&route);
        assert_eq!(dto.destination_cidr, "10.0.0.0/8");
    }
}
