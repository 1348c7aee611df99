//! Wire types for the daemon IPC protocol (§4.5).
//!
//! A request is one newline-terminated JSON object; a response is one
//! newline-terminated JSON object. There is no length prefix: the reader
//! accumulates bytes until the first `\n` and discards anything after it,
//! since exactly one request/response is exchanged per connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of commands the daemon understands. Any other string in
/// a request's `command` field fails with `error: "Unknown command"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Apply (or no-op, for disallowed namespaces) the isolation ruleset.
    EnforceIsolation,
    /// Return the in-memory latest isolation self-test result.
    GetValidationResult,
    /// Program a physical interface's address/route and verify isolation held.
    ConfigureInterface,
    /// Read `/proc/net/dev` counters for the three physical interfaces.
    GetInterfaceStats,
    /// Write a peer's strongSwan config/secrets and load the connection.
    ConfigurePeer,
    /// Delete a peer's strongSwan config file.
    RemovePeerConfig,
    /// Terminate a peer's CHILD_SA.
    TeardownPeer,
    /// Load and initiate a peer's CHILD_SA.
    InitiatePeer,
    /// Rewrite a peer's traffic selectors and reload.
    UpdateRoutes,
    /// Return per-peer IKE SA state only.
    GetTunnelStatus,
    /// Return per-peer IKE SA state plus CHILD SA counters.
    GetTunnelTelemetry,
}

impl Command {
    /// The wire string for this command, as used in `Request.command`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Command::EnforceIsolation => "enforce_isolation",
            Command::GetValidationResult => "get_validation_result",
            Command::ConfigureInterface => "configure_interface",
            Command::GetInterfaceStats => "get_interface_stats",
            Command::ConfigurePeer => "configure_peer",
            Command::RemovePeerConfig => "remove_peer_config",
            Command::TeardownPeer => "teardown_peer",
            Command::InitiatePeer => "initiate_peer",
            Command::UpdateRoutes => "update_routes",
            Command::GetTunnelStatus => "get_tunnel_status",
            Command::GetTunnelTelemetry => "get_tunnel_telemetry",
        }
    }

    /// Parse the wire string. Returns `None` for an unrecognised command,
    /// which the daemon turns into `error: "Unknown command"`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "enforce_isolation" => Command::EnforceIsolation,
            "get_validation_result" => Command::GetValidationResult,
            "configure_interface" => Command::ConfigureInterface,
            "get_interface_stats" => Command::GetInterfaceStats,
            "configure_peer" => Command::ConfigurePeer,
            "remove_peer_config" => Command::RemovePeerConfig,
            "teardown_peer" => Command::TeardownPeer,
            "initiate_peer" => Command::InitiatePeer,
            "update_routes" => Command::UpdateRoutes,
            "get_tunnel_status" => Command::GetTunnelStatus,
            "get_tunnel_telemetry" => Command::GetTunnelTelemetry,
            _ => return None,
        })
    }
}

/// A framed request: `{"command": <string>, "payload": <object>}\n`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Wire command name.
    pub command: String,
    /// Command-specific payload, decoded by the handler for that command.
    pub payload: Value,
}

impl Request {
    /// Build a request from a typed payload.
    ///
    /// # Panics
    ///
    /// Panics if `payload` fails to serialise to JSON, which only happens
    /// for payload types with a custom non-infallible `Serialize` impl —
    /// none of the payload types in this crate have one.
    #[must_use]
    pub fn new<P: Serialize>(command: Command, payload: &P) -> Self {
        Self {
            command: command.as_str().to_string(),
            payload: serde_json::to_value(payload).expect("payload types always serialise"),
        }
    }
}

/// A framed response: either a success envelope carrying an arbitrary
/// result, or an error envelope carrying a human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    /// The command succeeded.
    Ok {
        /// Command-specific result payload.
        result: Value,
    },
    /// The command failed; `error` is safe to surface to an API caller.
    Error {
        /// Human-readable failure reason.
        error: String,
    },
}

impl Response {
    /// Build a success response from a typed result.
    #[must_use]
    pub fn ok<R: Serialize>(result: &R) -> Self {
        Self::Ok {
            result: serde_json::to_value(result).expect("result types always serialise"),
        }
    }

    /// Build an error response.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }
}

/// `status ∈ {success, warning, error}` for daemon-side orchestration
/// operations (§4.7, §4.8). Distinct from the IPC-transport-level
/// [`Response`] envelope: this is a *result* a successfully-delivered
/// command can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpStatus {
    /// The operation completed as requested.
    Success,
    /// The operation did not fully complete but the caller should not treat
    /// it as fatal (e.g. a `swanctl` timeout where the SA may still land).
    Warning,
    /// The operation failed outright.
    Error,
}

/// Generic `{status, message}` result shared by the orchestrator lifecycle
/// operations (`configure_peer`, `initiate_peer`, `teardown_peer`,
/// `remove_peer_config`, `update_routes`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpResult {
    /// Outcome of the operation.
    pub status: OpStatus,
    /// Human-readable detail, safe to surface in `meta.warning`.
    pub message: String,
}

impl OpResult {
    /// Build a [`OpStatus::Success`] result.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: OpStatus::Success,
            message: message.into(),
        }
    }

    /// Build a [`OpStatus::Warning`] result.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: OpStatus::Warning,
            message: message.into(),
        }
    }

    /// Build a [`OpStatus::Error`] result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: OpStatus::Error,
            message: message.into(),
        }
    }
}

/// `pass`/`fail` outcome of [`Command::ConfigureInterface`]'s post-write
/// isolation re-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationCheckStatus {
    /// The isolation ruleset was still in place after the address change.
    Pass,
    /// The isolation ruleset was missing or malformed; the caller must roll back.
    Fail,
}

/// Payload for [`Command::ConfigureInterface`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureInterfacePayload {
    /// `CT`, `PT`, or `MGMT`.
    pub name: String,
    /// New IPv4 address.
    pub ip_address: String,
    /// New netmask, dotted notation.
    pub netmask: String,
    /// New default gateway.
    pub gateway: String,
}

/// Result of [`Command::ConfigureInterface`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureInterfaceResult {
    /// Whether the address/route programming itself succeeded.
    pub status: OpStatus,
    /// Human-readable detail.
    pub message: String,
    /// Outcome of the post-write isolation re-check (§4.7).
    pub isolation: IsolationCheckOutcome,
}

/// Outcome of the post-`configure_interface` isolation re-check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationCheckOutcome {
    /// `pass` or `fail`.
    pub status: IsolationCheckStatus,
    /// Human-readable detail, populated on `fail`.
    pub message: String,
}

/// Payload for [`Command::GetInterfaceStats`]. Empty: the daemon always
/// reports all three physical interfaces in one call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyPayload {}

/// Per-interface counters extracted from `/proc/net/dev` (§4.7).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InterfaceStats {
    /// Received bytes.
    pub bytes_rx: u64,
    /// Transmitted bytes.
    pub bytes_tx: u64,
    /// Received packets.
    pub packets_rx: u64,
    /// Transmitted packets.
    pub packets_tx: u64,
    /// Receive errors.
    pub errors_rx: u64,
    /// Transmit errors.
    pub errors_tx: u64,
}

/// Result of [`Command::GetInterfaceStats`]: one entry per physical interface,
/// keyed by uppercase interface name (`"CT"`, `"PT"`, `"MGMT"`).
pub type InterfaceStatsResult = std::collections::BTreeMap<String, InterfaceStats>;

/// Payload shared by every per-peer orchestrator command (`configure_peer`
/// carries additional fields; see [`ConfigurePeerPayload`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerRefPayload {
    /// Surrogate peer id, used as the XFRM `if_id` and as the telemetry key.
    pub peer_id: i64,
    /// Original (unsanitised) display name.
    pub name: String,
}

/// Payload for [`Command::ConfigurePeer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurePeerPayload {
    /// Surrogate peer id.
    pub peer_id: i64,
    /// Original (unsanitised) display name.
    pub name: String,
    /// Remote IPv4 address.
    pub remote_ip: String,
    /// Freshly decrypted PSK plaintext. Never logged (§10).
    pub psk: String,
    /// `"ikev1"` or `"ikev2"`.
    pub ike_version: String,
    /// `"clear"`, `"hold"`, or `"restart"`.
    pub dpd_action: String,
    /// Seconds.
    pub dpd_delay: i64,
    /// Seconds.
    pub dpd_timeout: i64,
    /// Seconds.
    pub rekey_time: i64,
    /// Current route set, normalised CIDRs.
    pub routes: Vec<String>,
}

/// Payload for [`Command::UpdateRoutes`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRoutesPayload {
    /// Surrogate peer id.
    pub peer_id: i64,
    /// Original (unsanitised) display name.
    pub name: String,
    /// The peer's full route set after the mutation (not a delta).
    pub routes: Vec<String>,
}

/// `up`/`negotiating`/`down`, mapped from the `swanctl --list-sas` IKE SA
/// state keyword (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelState {
    /// IKE SA `ESTABLISHED`.
    Up,
    /// IKE SA `CONNECTING` or `REKEYING`.
    Negotiating,
    /// IKE SA `DELETING`, absent, or unrecognised.
    Down,
}

/// Result entry for [`Command::GetTunnelStatus`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TunnelStatus {
    /// Mapped IKE SA state.
    pub status: TunnelState,
}

/// Result entry for [`Command::GetTunnelTelemetry`]: IKE SA state plus CHILD
/// SA counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TunnelTelemetry {
    /// Mapped IKE SA state. `Down` by default (serde default requires
    /// `TunnelState: Default`; see the manual `Default` impl below).
    pub status: TunnelState,
    /// Seconds since the CHILD SA was established, if known.
    pub established_sec: Option<u64>,
    /// Cumulative bytes received.
    pub bytes_in: u64,
    /// Cumulative bytes sent.
    pub bytes_out: u64,
    /// Cumulative packets received.
    pub packets_in: u64,
    /// Cumulative packets sent.
    pub packets_out: u64,
}

impl Default for TunnelState {
    fn default() -> Self {
        TunnelState::Down
    }
}

/// Result of [`Command::GetTunnelStatus`]: keyed by surrogate peer id
/// (decimal string, since JSON object keys are always strings).
pub type TunnelStatusResult = std::collections::BTreeMap<String, TunnelStatus>;

/// Result of [`Command::GetTunnelTelemetry`]: keyed by surrogate peer id.
pub type TunnelTelemetryResult = std::collections::BTreeMap<String, TunnelTelemetry>;

/// Payload for [`Command::EnforceIsolation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforceIsolationPayload {
    /// Target namespace, e.g. `"ns_ct"`, `"ns_pt"`, or `"ns_mgmt"`.
    pub namespace: String,
}

/// Result of [`Command::EnforceIsolation`].
///
/// Per the preserved open question (§4.6), a `namespace` outside
/// `{ns_ct, ns_pt}` yields `status: success` with an empty `actions` list
/// rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforceIsolationResult {
    /// Always `success` — enforcement failures are reported via `actions`.
    pub status: OpStatus,
    /// Per-step actions taken; empty when `namespace` is outside the allowlist.
    pub actions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_wire_strings_round_trip() {
        for cmd in [
            Command::EnforceIsolation,
            Command::GetValidationResult,
            Command::ConfigureInterface,
            Command::GetInterfaceStats,
            Command::ConfigurePeer,
            Command::RemovePeerConfig,
            Command::TeardownPeer,
            Command::InitiatePeer,
            Command::UpdateRoutes,
            Command::GetTunnelStatus,
            Command::GetTunnelTelemetry,
        ] {
            assert_eq!(Command::parse(cmd.as_str()), Some(cmd));
        }
        assert_eq!(Command::parse("bogus_command"), None);
    }

    #[test]
    fn response_serialises_with_tagged_status() {
        let ok = Response::ok(&OpResult::success("done"));
        let json = serde_json::to_string(&ok).unwrap();
        assert!(json.contains("\"status\":\"ok\""));

        let err = Response::error("boom");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"status\":\"error\""));
        assert!(json.contains("\"error\":\"boom\""));
    }

    #[test]
    fn request_round_trips_through_json() {
        let payload = PeerRefPayload {
            peer_id: 7,
            name: "site-a".to_string(),
        };
        let req = Request::new(Command::InitiatePeer, &payload);
        let wire = serde_json::to_string(&req).unwrap();
        let decoded: Request = serde_json::from_str(&wire).unwrap();
        assert_eq!(decoded.command, "initiate_peer");
        let decoded_payload: PeerRefPayload = serde_json::from_value(decoded.payload).unwrap();
        assert_eq!(decoded_payload.peer_id, 7);
    }
}
