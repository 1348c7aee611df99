//! `/monitoring/tunnels` and `/monitoring/interfaces`: on-demand REST
//! snapshots of the same daemon telemetry the pollers fan out over
//! WebSocket (§6). Always 200 — a daemon that cannot be reached simply
//! yields zeroed/absent counters rather than an error.

use std::sync::Arc;

use axum::extract::State;
use encryptor_core::entities::InterfaceName;
use encryptor_ipc::protocol::{InterfaceStats, TunnelState};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::state::AppState;
use crate::telemetry::{interface_poller, tunnel_poller};

fn wire_status(state: TunnelState) -> &'static str {
    match state {
        TunnelState::Up => "up",
        TunnelState::Negotiating => "negotiating",
        TunnelState::Down => "down",
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelSnapshotDto {
    pub peer_id: i64,
    pub peer_name: String,
    pub status: &'static str,
    pub established_sec: Option<u64>,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub packets_in: u64,
    pub packets_out: u64,
}

/// `GET /api/v1/monitoring/tunnels`.
pub async fn tunnels(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<Envelope<Vec<TunnelSnapshotDto>>, ApiError> {
    let peers = state.store.list_peers().await.map_err(|e| ApiError::from_storage(e, "/api/v1/monitoring/tunnels"))?;
    let telemetry = tunnel_poller::fetch_telemetry(&state).await;

    let snapshots = peers
        .iter()
        .map(|peer| {
            let entry = telemetry.get(&peer.peer_id.to_string()).copied().unwrap_or_default();
            TunnelSnapshotDto {
                peer_id: peer.peer_id,
                peer_name: peer.name.clone(),
                status: wire_status(entry.status),
                established_sec: entry.established_sec,
                bytes_in: entry.bytes_in,
                bytes_out: entry.bytes_out,
                packets_in: entry.packets_in,
                packets_out: entry.packets_out,
            }
        })
        .collect();

    Ok(Envelope::ok(snapshots))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceSnapshotDto {
    pub interface: &'static str,
    pub bytes_rx: u64,
    pub bytes_tx: u64,
    pub packets_rx: u64,
    pub packets_tx: u64,
    pub errors_rx: u64,
    pub errors_tx: u64,
}

/// `GET /api/v1/monitoring/interfaces`.
pub async fn interfaces(State(state): State<Arc<AppState>>, _user: AuthUser) -> Envelope<Vec<InterfaceSnapshotDto>> {
    let stats = interface_poller::fetch_stats(&state).await;

    let snapshots = InterfaceName::ALL
        .iter()
        .map(|name| {
            let s = stats.get(name.as_str()).copied().unwrap_or(InterfaceStats::default());
            InterfaceSnapshotDto {
                interface: name.as_str(),
                bytes_rx: s.bytes_rx,
                bytes_tx: s.bytes_tx,
                packets_rx: s.packets_rx,
                packets_tx: s.packets_tx,
                errors_rx: s.errors_rx,
                errors_tx: s.errors_tx,
            }
        })
        .collect();

    Envelope::ok(snapshots)
}
