//! Background task that polls the daemon for per-peer tunnel state,
//! computes traffic-flow deltas, and broadcasts `tunnel.status_changed`
//! transitions (§4.10, §5).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use encryptor_ipc::protocol::{
    Command, EmptyPayload, TunnelState, TunnelStatusResult, TunnelTelemetry, TunnelTelemetryResult,
};
use tokio_util::sync::CancellationToken;

use crate::state::AppState;
use crate::telemetry::events;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
struct PrevPeerState {
    status: TunnelState,
    is_passing_traffic: bool,
    bytes_in: u64,
    bytes_out: u64,
    packets_in: u64,
    packets_out: u64,
    last_traffic_at: Option<DateTime<Utc>>,
}

/// Call `get_tunnel_telemetry`; on any daemon failure fall back to
/// `get_tunnel_status` with zeroed counters (§4.10 step 2).
pub(crate) async fn fetch_telemetry(state: &AppState) -> TunnelTelemetryResult {
    match state.daemon.call_typed::<_, TunnelTelemetryResult>(Command::GetTunnelTelemetry, &EmptyPayload {}).await {
        Ok(result) if !result.is_empty() => result,
        _ => match state.daemon.call_typed::<_, TunnelStatusResult>(Command::GetTunnelStatus, &EmptyPayload {}).await
        {
            Ok(statuses) => statuses
                .into_iter()
                .map(|(id, status)| (id, TunnelTelemetry { status: status.status, ..Default::default() }))
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "daemon unreachable for both tunnel telemetry and status");
                TunnelTelemetryResult::new()
            }
        },
    }
}

/// Run one poll cycle: load peers, fetch telemetry, compute deltas and
/// transitions against `previous`, broadcast any changed peers, and return
/// the updated cache.
async fn poll_once(
    state: &AppState,
    previous: &HashMap<i64, PrevPeerState>,
) -> HashMap<i64, PrevPeerState> {
    let peers = match state.store.list_peers().await {
        Ok(peers) => peers,
        Err(e) => {
            tracing::warn!(error = %e, "tunnel poller failed to load peer set");
            return previous.clone();
        }
    };

    let telemetry = fetch_telemetry(state).await;
    let mut next = HashMap::with_capacity(peers.len());

    for peer in &peers {
        let key = peer.peer_id.to_string();
        let entry = telemetry.get(&key).copied().unwrap_or_default();
        let prev = previous.get(&peer.peer_id).copied();

        let bytes_delta = prev.map_or(0, |p| entry.bytes_in.saturating_sub(p.bytes_in))
            + prev.map_or(0, |p| entry.bytes_out.saturating_sub(p.bytes_out));
        let packets_delta = prev.map_or(0, |p| entry.packets_in.saturating_sub(p.packets_in))
            + prev.map_or(0, |p| entry.packets_out.saturating_sub(p.packets_out));
        let is_passing_traffic = prev.is_some() && (bytes_delta > 0 || packets_delta > 0);

        let last_traffic_at =
            if is_passing_traffic { Some(Utc::now()) } else { prev.and_then(|p| p.last_traffic_at) };

        let transitioned = match prev {
            None => true,
            Some(p) => p.status != entry.status || p.is_passing_traffic != is_passing_traffic,
        };

        if transitioned {
            state
                .connections
                .broadcast(events::tunnel_status_changed(
                    peer.peer_id,
                    &peer.name,
                    entry.status,
                    entry.established_sec,
                    entry.bytes_in,
                    entry.bytes_out,
                    entry.packets_in,
                    entry.packets_out,
                    is_passing_traffic,
                    last_traffic_at,
                ))
                .await;
        }

        next.insert(
            peer.peer_id,
            PrevPeerState {
                status: entry.status,
                is_passing_traffic,
                bytes_in: entry.bytes_in,
                bytes_out: entry.bytes_out,
                packets_in: entry.packets_in,
                packets_out: entry.packets_out,
                last_traffic_at,
            },
        );
    }

    next
}

/// Run the tunnel poller loop until `shutdown` is cancelled. Poller panics
/// and transport errors never escape a single cycle (§7 "Poller exception").
pub async fn run(state: Arc<AppState>, shutdown: CancellationToken) {
    let mut previous: HashMap<i64, PrevPeerState> = HashMap::new();
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                tracing::info!("tunnel poller shutting down");
                return;
            }
            _ = ticker.tick() => {
                previous = poll_once(&state, &previous).await;
            }
        }
    }
}

/// Build the initial WebSocket snapshot: one `tunnel.status_changed` event
/// per known peer, with `isPassingTraffic: false` and `lastTrafficAt: null`
/// since no prior poll exists yet for a freshly connected client (§4.10
/// "WebSocket connect").
pub async fn snapshot_events(state: &AppState) -> Vec<crate::telemetry::events::EventEnvelope> {
    let peers = match state.store.list_peers().await {
        Ok(peers) => peers,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load peers for websocket snapshot");
            return Vec::new();
        }
    };

    let telemetry = fetch_telemetry(state).await;
    peers
        .iter()
        .map(|peer| {
            let key = peer.peer_id.to_string();
            let entry = telemetry.get(&key).copied().unwrap_or_default();
            events::tunnel_status_changed(
                peer.peer_id,
                &peer.name,
                entry.status,
                entry.established_sec,
                entry.bytes_in,
                entry.bytes_out,
                entry.packets_in,
                entry.packets_out,
                false,
                None,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prev_peer_state_is_copy() {
        let a = PrevPeerState {
            status: TunnelState::Up,
            is_passing_traffic: true,
            bytes_in: 1,
            bytes_out: 2,
            packets_in: 3,
            packets_out: 4,
            last_traffic_at: Some(Utc::now()),
        };
        let b = a;
        assert_eq!(a.bytes_in, b.bytes_in);
    }
}
