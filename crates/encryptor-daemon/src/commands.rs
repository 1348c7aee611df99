//! Dispatches decoded IPC requests to the namespace policy engine, network
//! programmer, and IPsec orchestrator, and shapes their results into the
//! wire [`Response`] envelope.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use encryptor_core::entities::{DpdAction, IkeVersion, InterfaceName};
use encryptor_ipc::protocol::{
    Command, ConfigureInterfacePayload, ConfigureInterfaceResult, ConfigurePeerPayload,
    EnforceIsolationPayload, EnforceIsolationResult, InterfaceStats, InterfaceStatsResult,
    IsolationCheckOutcome as WireIsolationCheckOutcome, IsolationCheckStatus, OpStatus,
    PeerRefPayload, Response, TunnelState as WireTunnelState, TunnelStatus, TunnelStatusResult,
    TunnelTelemetry as WireTunnelTelemetry, TunnelTelemetryResult, UpdateRoutesPayload,
};
use encryptor_ipc::server::CommandHandler;

use crate::ipsec::{self, PeerConnectionSpec, TunnelState};
use crate::netprog::{self, IsolationCheckOutcome};
use crate::nspolicy;
use crate::state::IsolationState;

/// Daemon-side dispatcher wired to the orchestration modules (§4.5-§4.8).
pub struct DaemonHandler {
    swanctl_conf_dir: PathBuf,
    netns_config_dir: PathBuf,
    isolation_state: IsolationState,
}

impl DaemonHandler {
    /// Build a handler rooted at the given config directories.
    #[must_use]
    pub fn new(
        swanctl_conf_dir: PathBuf,
        netns_config_dir: PathBuf,
        isolation_state: IsolationState,
    ) -> Self {
        Self { swanctl_conf_dir, netns_config_dir, isolation_state }
    }

    async fn handle_enforce_isolation(&self, payload: serde_json::Value) -> Response {
        let payload: EnforceIsolationPayload = match serde_json::from_value(payload) {
            Ok(p) => p,
            Err(e) => return Response::error(format!("invalid payload: {e}")),
        };
        match nspolicy::enforce_isolation(&[payload.namespace]).await {
            Ok(actions) => {
                let result = EnforceIsolationResult {
                    status: OpStatus::Success,
                    actions: actions.into_iter().map(|a| format!("{}: {}", a.namespace, a.detail)).collect(),
                };
                Response::ok(&result)
            }
            Err(e) => Response::error(e.to_string()),
        }
    }

    async fn handle_get_validation_result(&self) -> Response {
        match self.isolation_state.get().await {
            Some(result) => Response::ok(&result),
            None => Response::error("no isolation self-test has run yet"),
        }
    }

    /// Run the isolation self-test and record it, used both at startup and
    /// on an explicit request for a fresh run.
    pub async fn run_and_record_self_test(&self) {
        match nspolicy::run_self_test().await {
            Ok(result) => {
                let status = result.status.clone();
                self.isolation_state.set(result).await;
                tracing::info!(status = %status, "isolation self-test complete");
            }
            Err(e) => tracing::warn!(error = %e, "isolation self-test failed to run"),
        }
    }

    async fn handle_configure_interface(&self, payload: serde_json::Value) -> Response {
        let payload: ConfigureInterfacePayload = match serde_json::from_value(payload) {
            Ok(p) => p,
            Err(e) => return Response::error(format!("invalid payload: {e}")),
        };
        let Some(name) = InterfaceName::parse(&payload.name) else {
            return Response::error(format!("unknown interface {:?}", payload.name));
        };

        match netprog::configure_interface(
            name,
            &payload.ip_address,
            &payload.netmask,
            &payload.gateway,
            &self.netns_config_dir,
        )
        .await
        {
            Ok(outcome) => {
                let isolation = match outcome.isolation {
                    IsolationCheckOutcome::Pass => {
                        WireIsolationCheckOutcome { status: IsolationCheckStatus::Pass, message: String::new() }
                    }
                    IsolationCheckOutcome::Fail(message) => {
                        WireIsolationCheckOutcome { status: IsolationCheckStatus::Fail, message }
                    }
                };
                Response::ok(&ConfigureInterfaceResult {
                    status: OpStatus::Success,
                    message: "interface configured".to_string(),
                    isolation,
                })
            }
            Err(e) => Response::error(e.to_string()),
        }
    }

    async fn handle_get_interface_stats(&self) -> Response {
        let mut result: InterfaceStatsResult = BTreeMap::new();
        for name in InterfaceName::ALL {
            let counters = netprog::read_interface_stats(name).await;
            result.insert(
                name.as_str().to_string(),
                InterfaceStats {
                    bytes_rx: counters.bytes_rx,
                    bytes_tx: counters.bytes_tx,
                    packets_rx: counters.packets_rx,
                    packets_tx: counters.packets_tx,
                    errors_rx: counters.errors_rx,
                    errors_tx: counters.errors_tx,
                },
            );
        }
        Response::ok(&result)
    }

    async fn handle_configure_peer(&self, payload: serde_json::Value) -> Response {
        let payload: ConfigurePeerPayload = match serde_json::from_value(payload) {
            Ok(p) => p,
            Err(e) => return Response::error(format!("invalid payload: {e}")),
        };
        let Some(ike_version) = IkeVersion::parse(&payload.ike_version) else {
            return Response::error(format!("unknown ike version {:?}", payload.ike_version));
        };
        let Some(dpd_action) = DpdAction::parse(&payload.dpd_action) else {
            return Response::error(format!("unknown dpd action {:?}", payload.dpd_action));
        };

        let spec = PeerConnectionSpec {
            name: payload.name,
            remote_ip: payload.remote_ip,
            psk: payload.psk,
            ike_version,
            dpd_action,
            dpd_delay: payload.dpd_delay,
            dpd_timeout: payload.dpd_timeout,
            rekey_time: payload.rekey_time,
            routes: payload.routes.clone(),
        };

        match ipsec::configure_peer(&self.swanctl_conf_dir, &spec).await {
            Ok(result) => {
                if matches!(result.status, OpStatus::Success) {
                    if let Err(e) = netprog::create_xfrm_interface(payload.peer_id, &payload.routes).await {
                        tracing::warn!(peer_id = payload.peer_id, error = %e, "failed to program xfrm interface");
                    }
                }
                Response::ok(&result)
            }
            Err(e) => Response::error(e.to_string()),
        }
    }

    async fn handle_remove_peer_config(&self, payload: serde_json::Value) -> Response {
        let payload: PeerRefPayload = match serde_json::from_value(payload) {
            Ok(p) => p,
            Err(e) => return Response::error(format!("invalid payload: {e}")),
        };
        let result = ipsec::remove_peer_config(&self.swanctl_conf_dir, &payload.name).await;
        let _ = netprog::delete_xfrm_interface(payload.peer_id).await;
        Response::ok(&result)
    }

    async fn handle_teardown_peer(&self, payload: serde_json::Value) -> Response {
        let payload: PeerRefPayload = match serde_json::from_value(payload) {
            Ok(p) => p,
            Err(e) => return Response::error(format!("invalid payload: {e}")),
        };
        let result = ipsec::teardown_peer(&payload.name).await;
        Response::ok(&result)
    }

    async fn handle_initiate_peer(&self, payload: serde_json::Value) -> Response {
        let payload: PeerRefPayload = match serde_json::from_value(payload) {
            Ok(p) => p,
            Err(e) => return Response::error(format!("invalid payload: {e}")),
        };
        let result = ipsec::initiate_peer(&payload.name).await;
        Response::ok(&result)
    }

    async fn handle_update_routes(&self, payload: serde_json::Value) -> Response {
        let payload: UpdateRoutesPayload = match serde_json::from_value(payload) {
            Ok(p) => p,
            Err(e) => return Response::error(format!("invalid payload: {e}")),
        };
        match ipsec::update_routes(&self.swanctl_conf_dir, &payload.name, &payload.routes).await {
            Ok(result) => {
                if let Err(e) = netprog::create_xfrm_interface(payload.peer_id, &payload.routes).await {
                    tracing::warn!(peer_id = payload.peer_id, error = %e, "failed to reprogram routes on xfrm interface");
                }
                Response::ok(&result)
            }
            Err(e) => Response::error(e.to_string()),
        }
    }

    async fn handle_get_tunnel_status(&self) -> Response {
        match ipsec::list_sas().await {
            Ok(sas) => {
                let result: TunnelStatusResult = sas
                    .into_iter()
                    .map(|(name, (state, _))| (name, TunnelStatus { status: wire_state(state) }))
                    .collect();
                Response::ok(&result)
            }
            Err(e) => Response::error(e.to_string()),
        }
    }

    async fn handle_get_tunnel_telemetry(&self) -> Response {
        match ipsec::list_sas().await {
            Ok(sas) => {
                let result: TunnelTelemetryResult = sas
                    .into_iter()
                    .map(|(name, (state, telemetry))| {
                        (
                            name,
                            WireTunnelTelemetry {
                                status: wire_state(state),
                                established_sec: (telemetry.established_sec > 0)
                                    .then_some(telemetry.established_sec),
                                bytes_in: telemetry.bytes_in,
                                bytes_out: telemetry.bytes_out,
                                packets_in: telemetry.packets_in,
                                packets_out: telemetry.packets_out,
                            },
                        )
                    })
                    .collect();
                Response::ok(&result)
            }
            Err(e) => Response::error(e.to_string()),
        }
    }
}

fn wire_state(state: TunnelState) -> WireTunnelState {
    match state {
        TunnelState::Up => WireTunnelState::Up,
        TunnelState::Negotiating => WireTunnelState::Negotiating,
        TunnelState::Down => WireTunnelState::Down,
    }
}

#[async_trait]
impl CommandHandler for DaemonHandler {
    async fn handle(&self, command: Command, payload: serde_json::Value) -> Response {
        match command {
            Command::EnforceIsolation => self.handle_enforce_isolation(payload).await,
            Command::GetValidationResult => self.handle_get_validation_result().await,
            Command::ConfigureInterface => self.handle_configure_interface(payload).await,
            Command::GetInterfaceStats => self.handle_get_interface_stats().await,
            Command::ConfigurePeer => self.handle_configure_peer(payload).await,
            Command::RemovePeerConfig => self.handle_remove_peer_config(payload).await,
            Command::TeardownPeer => self.handle_teardown_peer(payload).await,
            Command::InitiatePeer => self.handle_initiate_peer(payload).await,
            Command::UpdateRoutes => self.handle_update_routes(payload).await,
            Command::GetTunnelStatus => self.handle_get_tunnel_status().await,
            Command::GetTunnelTelemetry => self.handle_get_tunnel_telemetry().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_validation_result_errors_before_any_self_test_has_run() {
        let handler = DaemonHandler::new(
            PathBuf::from("/tmp/encryptor-sim-test/swanctl"),
            PathBuf::from("/tmp/encryptor-sim-test/netns"),
            IsolationState::default(),
        );
        let response = handler.handle(Command::GetValidationResult, serde_json::json!({})).await;
        assert!(matches!(response, Response::Error { .. }));
    }

    #[tokio::test]
    async fn unparseable_interface_name_is_rejected_before_touching_the_network() {
        let handler = DaemonHandler::new(
            PathBuf::from("/tmp/encryptor-sim-test/swanctl"),
            PathBuf::from("/tmp/encryptor-sim-test/netns"),
            IsolationState::default(),
        );
        let payload = serde_json::json!({
            "name": "bogus",
            "ip_address": "10.0.0.1",
            "netmask": "255.255.255.0",
            "gateway": "10.0.0.254",
        });
        let response = handler.handle(Command::ConfigureInterface, payload).await;
        assert!(matches!(response, Response::Error { .. }));
    }
}
