//! Service probes and boot metrics backing `GET /system/health` (§4.11).
//!
//! Each of the six services is probed with the same two-tier pattern: try an
//! OpenRC-style `rc-service <name> status` invocation first (authoritative
//! when it runs at all), and only fall back to a cheaper direct probe when
//! `rc-service` itself is absent or fails to execute.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::Command;

use crate::state::AppState;

const BOOT_TARGET_SECS: f64 = 30.0;

async fn rc_service_status(name: &str) -> Option<bool> {
    let output = Command::new("rc-service").arg(name).arg("status").output().await.ok()?;
    Some(output.status.success())
}

/// Probe `name` via `rc-service`, falling back to `fallback` when `rc-service`
/// itself could not be run (missing binary, non-OpenRC system).
async fn probe(name: &str, fallback: impl Future<Output = bool>) -> bool {
    match rc_service_status(name).await {
        Some(result) => result,
        None => fallback.await,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub running: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Services {
    pub namespaces: ServiceStatus,
    pub daemon: ServiceStatus,
    pub api: ServiceStatus,
    pub database: ServiceStatus,
    pub isolation: ServiceStatus,
    pub web_ui: ServiceStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootMetrics {
    pub duration_seconds: Option<f64>,
    pub boot_target: f64,
    pub boot_within_target: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MgmtSnapshot {
    pub device: &'static str,
    pub ip_address: Option<String>,
    pub netmask: Option<String>,
    pub gateway: Option<String>,
    pub configuration_method: &'static str,
    pub lease_status: &'static str,
    pub link_status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub services: Services,
    pub boot: BootMetrics,
    pub mgmt: MgmtSnapshot,
    pub timestamp: DateTime<Utc>,
}

async fn read_timing_file(path: &std::path::Path) -> Option<f64> {
    let contents = tokio::fs::read_to_string(path).await.ok()?;
    contents.trim().parse().ok()
}

async fn boot_metrics(state: &AppState) -> BootMetrics {
    let start = read_timing_file(&state.settings.boot_timing_dir.join("boot-start")).await;
    let complete = read_timing_file(&state.settings.boot_timing_dir.join("boot-complete")).await;

    let duration_seconds = match (start, complete) {
        (Some(start), Some(complete)) => Some(((complete - start) * 10.0).round() / 10.0),
        _ => None,
    };

    BootMetrics {
        duration_seconds,
        boot_target: BOOT_TARGET_SECS,
        boot_within_target: duration_seconds.map(|d| d < BOOT_TARGET_SECS),
    }
}

async fn mgmt_snapshot(state: &AppState) -> MgmtSnapshot {
    use encryptor_core::entities::InterfaceName;

    let interface = state.store.get_interface(InterfaceName::Mgmt).await.ok();
    let (ip_address, netmask, gateway) = interface
        .map(|i| (i.ip_address, i.netmask, i.gateway))
        .unwrap_or((None, None, None));

    let mode = tokio::fs::read_to_string(&state.settings.network_mode_flag_path)
        .await
        .ok()
        .map(|contents| {
            if contents.contains("mode=dhcp") {
                "dhcp"
            } else if contents.contains("mode=static") {
                "static"
            } else {
                "unknown"
            }
        })
        .unwrap_or("unknown");

    let lease_status = match (mode, ip_address.is_some()) {
        ("dhcp", true) => "obtained",
        ("dhcp", false) => "failed",
        ("static", _) => "static",
        _ => "unknown",
    };
    let link_status = if ip_address.is_some() { "up" } else { "down" };

    MgmtSnapshot {
        device: InterfaceName::Mgmt.device(),
        ip_address,
        netmask,
        gateway,
        configuration_method: mode,
        lease_status,
        link_status,
    }
}

/// Build the full health report. Never fails: every probe degrades to
/// `false`/`unknown` rather than propagating an error, since a broken probe
/// should read as "degraded", not crash the health endpoint.
pub async fn build_report(state: &AppState) -> HealthReport {
    let namespaces = probe("net.ns_ct", async { tokio::fs::metadata("/var/run/netns/ns_ct").await.is_ok() }).await;
    let daemon = probe("encryptor-simd", async {
        tokio::fs::metadata(&state.settings.daemon_socket_path).await.is_ok()
    })
    .await;
    let api = probe("encryptor-api", async { true }).await;
    let database = probe("encryptor-api", async { state.store.ping().await.is_ok() }).await;
    let isolation = probe("encryptor-simd", async {
        state
            .store
            .latest_isolation_result()
            .await
            .ok()
            .flatten()
            .is_some_and(|r| r.status == "pass")
    })
    .await;
    let web_ui = probe("nginx", async {
        tokio::fs::metadata(&state.settings.tls_cert_path).await.is_ok()
            && tokio::fs::metadata(&state.settings.tls_key_path).await.is_ok()
    })
    .await;

    let status = if namespaces && daemon && api { "healthy" } else { "degraded" };

    HealthReport {
        status,
        services: Services {
            namespaces: ServiceStatus { running: namespaces },
            daemon: ServiceStatus { running: daemon },
            api: ServiceStatus { running: api },
            database: ServiceStatus { running: database },
            isolation: ServiceStatus { running: isolation },
            web_ui: ServiceStatus { running: web_ui },
        },
        boot: boot_metrics(state).await,
        mgmt: mgmt_snapshot(state).await,
        timestamp: Utc::now(),
    }
}
