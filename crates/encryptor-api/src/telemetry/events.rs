//! Event envelope and per-event-type constructors broadcast to WebSocket
//! subscribers (§4.10).

use chrono::{DateTime, Utc};
use encryptor_ipc::protocol::TunnelState;
use serde::Serialize;
use serde_json::Value;

use crate::resources::system::IsolationResultDto;

/// `{type, data}`, serialised verbatim onto the wire.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub data: Value,
}

fn envelope(type_: &'static str, data: impl Serialize) -> EventEnvelope {
    EventEnvelope {
        type_,
        data: serde_json::to_value(data).expect("event payloads always serialise"),
    }
}

fn wire_status(state: TunnelState) -> &'static str {
    match state {
        TunnelState::Up => "up",
        TunnelState::Negotiating => "negotiating",
        TunnelState::Down => "down",
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TunnelStatusChangedData {
    peer_id: i64,
    peer_name: String,
    status: &'static str,
    established_sec: Option<u64>,
    bytes_in: u64,
    bytes_out: u64,
    packets_in: u64,
    packets_out: u64,
    is_passing_traffic: bool,
    last_traffic_at: Option<DateTime<Utc>>,
    timestamp: DateTime<Utc>,
}

/// `tunnel.status_changed`.
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn tunnel_status_changed(
    peer_id: i64,
    peer_name: &str,
    status: TunnelState,
    established_sec: Option<u64>,
    bytes_in: u64,
    bytes_out: u64,
    packets_in: u64,
    packets_out: u64,
    is_passing_traffic: bool,
    last_traffic_at: Option<DateTime<Utc>>,
) -> EventEnvelope {
    envelope(
        "tunnel.status_changed",
        TunnelStatusChangedData {
            peer_id,
            peer_name: peer_name.to_string(),
            status: wire_status(status),
            established_sec,
            bytes_in,
            bytes_out,
            packets_in,
            packets_out,
            is_passing_traffic,
            last_traffic_at,
            timestamp: Utc::now(),
        },
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InterfaceStatsUpdatedData {
    interface: String,
    bytes_rx: u64,
    bytes_tx: u64,
    packets_rx: u64,
    packets_tx: u64,
    errors_rx: u64,
    errors_tx: u64,
    timestamp: DateTime<Utc>,
}

/// `interface.stats_updated`.
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn interface_stats_updated(
    interface: &str,
    bytes_rx: u64,
    bytes_tx: u64,
    packets_rx: u64,
    packets_tx: u64,
    errors_rx: u64,
    errors_tx: u64,
) -> EventEnvelope {
    envelope(
        "interface.stats_updated",
        InterfaceStatsUpdatedData {
            interface: interface.to_string(),
            bytes_rx,
            bytes_tx,
            packets_rx,
            packets_tx,
            errors_rx,
            errors_tx,
            timestamp: Utc::now(),
        },
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PeerConfigChangedData {
    action: &'static str,
    peer_id: i64,
}

/// `peer.config_changed`.
#[must_use]
pub fn peer_config_changed(action: &'static str, peer_id: i64) -> EventEnvelope {
    envelope("peer.config_changed", PeerConfigChangedData { action, peer_id })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteConfigChangedData {
    action: &'static str,
    route_id: i64,
    peer_id: i64,
}

/// `route.config_changed`.
#[must_use]
pub fn route_config_changed(action: &'static str, route_id: i64, peer_id: i64) -> EventEnvelope {
    envelope("route.config_changed", RouteConfigChangedData { action, route_id, peer_id })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InterfaceConfigChangedData {
    action: &'static str,
    interface: String,
}

/// `interface.config_changed`.
#[must_use]
pub fn interface_config_changed(action: &'static str, interface: &str) -> EventEnvelope {
    envelope(
        "interface.config_changed",
        InterfaceConfigChangedData { action, interface: interface.to_string() },
    )
}

/// `system.isolation_status_updated` — carries the full latest isolation result.
#[must_use]
pub fn isolation_status_updated(result: &IsolationResultDto) -> EventEnvelope {
    envelope("system.isolation_status_updated", result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_is_the_dotted_name() {
        let e = peer_config_changed("created", 7);
        assert_eq!(e.type_, "peer.config_changed");
        assert_eq!(e.data["action"], "created");
        assert_eq!(e.data["peerId"], 7);
    }
}
