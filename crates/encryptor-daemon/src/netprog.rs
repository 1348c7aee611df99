//! Interface addressing, XFRM tunnel lifecycle, traffic counters, and the
//! persistent netns config files that make interface configuration
//! survive a daemon restart (§4.7).

use std::time::Duration;

use encryptor_core::entities::InterfaceName;

use crate::error::{DaemonError, DaemonResult};
use crate::shell;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of an isolation re-check performed after [`configure_interface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsolationCheckOutcome {
    /// The isolation chain is still present with its default-drop policy.
    Pass,
    /// The chain was missing or its policy was not `drop`; callers must
    /// roll the database back to the previous interface values.
    Fail(String),
}

/// Result of applying a new IPv4 configuration to a physical interface.
#[derive(Debug, Clone)]
pub struct ConfigureInterfaceOutcome {
    /// Whether isolation still holds after the change.
    pub isolation: IsolationCheckOutcome,
}

/// Flush `name`'s addresses, add the new `ip/prefix_len`, bring the link
/// up, replace the default route, persist a netns stanza, and verify
/// isolation still holds.
///
/// # Errors
///
/// Returns a [`DaemonError`] if any step other than "delete the existing
/// default route" fails (that step's failure is ignored — there may be no
/// prior default route).
pub async fn configure_interface(
    name: InterfaceName,
    ip_address: &str,
    netmask: &str,
    gateway: &str,
    netns_config_dir: &std::path::Path,
) -> DaemonResult<ConfigureInterfaceOutcome> {
    let ns = name.namespace();
    let device = name.device();
    let prefix_len = netmask_to_prefix_len(netmask);
    let cidr = format!("{ip_address}/{prefix_len}");

    shell::run_checked("ip", &["addr", "flush", "dev", device], Some(ns), COMMAND_TIMEOUT).await?;
    shell::run_checked("ip", &["addr", "add", &cidr, "dev", device], Some(ns), COMMAND_TIMEOUT).await?;
    shell::run_checked("ip", &["link", "set", device, "up"], Some(ns), COMMAND_TIMEOUT).await?;

    // Deleting a possibly-absent default route is allowed to fail.
    let _ = shell::run("ip", &["route", "del", "default"], Some(ns), COMMAND_TIMEOUT).await;

    shell::run_checked(
        "ip",
        &["route", "add", "default", "via", gateway],
        Some(ns),
        COMMAND_TIMEOUT,
    )
    .await?;

    write_netns_stanza(netns_config_dir, ns, device, ip_address, netmask, gateway).await?;

    let isolation = if matches!(name, InterfaceName::Mgmt) {
        // MGMT carries no isolation chain; nothing to re-check.
        IsolationCheckOutcome::Pass
    } else {
        match crate::nspolicy::apply_isolation_ruleset(ns).await {
            Ok(()) => IsolationCheckOutcome::Pass,
            Err(e) => IsolationCheckOutcome::Fail(e.to_string()),
        }
    };

    Ok(ConfigureInterfaceOutcome { isolation })
}

/// Write `<dir>/<namespace>/network/<device>` as an ifupdown-compatible
/// stanza, then read it back and byte-compare against what was written.
///
/// # Errors
///
/// Returns [`DaemonError::Io`] if the write, parent-directory creation, or
/// read-back fails, or if the read-back content does not match.
pub async fn write_netns_stanza(
    netns_config_dir: &std::path::Path,
    namespace: &str,
    device: &str,
    ip_address: &str,
    netmask: &str,
    gateway: &str,
) -> DaemonResult<()> {
    let dir = netns_config_dir.join(namespace).join("network");
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|source| DaemonError::Io { path: dir.display().to_string(), source })?;
    let path = dir.join(device);

    let stanza = render_stanza(device, ip_address, netmask, gateway);
    tokio::fs::write(&path, &stanza)
        .await
        .map_err(|source| DaemonError::Io { path: path.display().to_string(), source })?;

    let read_back = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| DaemonError::Io { path: path.display().to_string(), source })?;
    if read_back != stanza {
        return Err(DaemonError::Io {
            path: path.display().to_string(),
            source: std::io::Error::other("netns stanza read-back did not match what was written"),
        });
    }
    Ok(())
}

fn render_stanza(device: &str, ip_address: &str, netmask: &str, gateway: &str) -> String {
    format!(
        "auto {device}\n\
         iface {device} inet static\n\
         \taddress {ip_address}\n\
         \tnetmask {netmask}\n\
         \tgateway {gateway}\n"
    )
}

/// Re-apply every persisted netns stanza found under `netns_config_dir` at
/// startup, before any IPC request is served, so a daemon restart does not
/// require the API to resend `configure_interface`. Best-effort: failures
/// are logged and do not prevent the daemon from starting.
pub async fn replay_persisted_interfaces(netns_config_dir: &std::path::Path) {
    for name in InterfaceName::ALL {
        let path = netns_config_dir.join(name.namespace()).join("network").join(name.device());
        let Ok(contents) = tokio::fs::read_to_string(&path).await else {
            continue;
        };
        match parse_stanza(&contents) {
            Some((ip, netmask, gateway)) => {
                match configure_interface(name, &ip, &netmask, &gateway, netns_config_dir).await {
                    Ok(_) => tracing::info!(interface = %name.as_str(), "replayed persisted interface config"),
                    Err(e) => tracing::warn!(interface = %name.as_str(), error = %e, "failed to replay persisted interface config"),
                }
            }
            None => tracing::warn!(interface = %name.as_str(), "persisted netns stanza was unparseable, skipping"),
        }
    }
}

fn parse_stanza(contents: &str) -> Option<(String, String, String)> {
    let mut address = None;
    let mut netmask = None;
    let mut gateway = None;
    for line in contents.lines() {
        let line = line.trim();
        if let Some(v) = line.strip_prefix("address ") {
            address = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("netmask ") {
            netmask = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("gateway ") {
            gateway = Some(v.trim().to_string());
        }
    }
    Some((address?, netmask?, gateway?))
}

fn netmask_to_prefix_len(netmask: &str) -> u32 {
    netmask
        .parse::<std::net::Ipv4Addr>()
        .map(|m| u32::from(m).count_ones())
        .unwrap_or(24)
}

/// Create, configure, and bring up `xfrm<peer_id>` for an enabled peer: the
/// interface is created inside `ns_ct` bound to `eth1` with `if_id =
/// peer_id` (so it matches SAs strongSwan installs inside `ns_ct`), then
/// moved to the root namespace where the link-netns association persists.
///
/// # Errors
///
/// Returns a [`DaemonError`] if any `ip` invocation fails.
pub async fn create_xfrm_interface(peer_id: i64, routes: &[String]) -> DaemonResult<()> {
    let xfrm_name = format!("xfrm{peer_id}");
    let if_id = peer_id.to_string();

    shell::run_checked(
        "ip",
        &[
            "link", "add", &xfrm_name, "type", "xfrm", "dev", "eth1", "if_id", &if_id,
        ],
        Some(InterfaceName::Ct.namespace()),
        COMMAND_TIMEOUT,
    )
    .await?;
    shell::run_checked(
        "ip",
        &["link", "set", &xfrm_name, "netns", "1"],
        Some(InterfaceName::Ct.namespace()),
        COMMAND_TIMEOUT,
    )
    .await?;
    shell::run_checked("ip", &["link", "set", &xfrm_name, "mtu", "1400"], None, COMMAND_TIMEOUT).await?;
    shell::run_checked("ip", &["link", "set", &xfrm_name, "up"], None, COMMAND_TIMEOUT).await?;

    for cidr in routes {
        shell::run_checked(
            "ip",
            &["route", "replace", cidr, "dev", &xfrm_name],
            None,
            COMMAND_TIMEOUT,
        )
        .await?;
        shell::run_checked(
            "ip",
            &["route", "replace", cidr, "via", "169.254.0.1"],
            Some(InterfaceName::Pt.namespace()),
            COMMAND_TIMEOUT,
        )
        .await?;
    }
    Ok(())
}

/// Remove `xfrm<peer_id>` from the root namespace. Idempotent: a missing
/// interface is not an error.
pub async fn delete_xfrm_interface(peer_id: i64) -> DaemonResult<()> {
    let xfrm_name = format!("xfrm{peer_id}");
    let _ = shell::run("ip", &["link", "del", &xfrm_name], None, COMMAND_TIMEOUT).await;
    Ok(())
}

/// Per-interface `/proc/net/dev` counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterfaceCounters {
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

/// Read `/proc/net/dev` inside `name`'s namespace and extract counters for
/// its device. On any failure (namespace absent, timeout, parse), returns
/// all-zero counters rather than propagating an error.
pub async fn read_interface_stats(name: InterfaceName) -> InterfaceCounters {
    let ns = name.namespace();
    let device = name.device();
    match shell::run("cat", &["/proc/net/dev"], Some(ns), Duration::from_secs(2)).await {
        Ok(output) if output.success => parse_proc_net_dev(&output.stdout, device).unwrap_or_default(),
        _ => InterfaceCounters::default(),
    }
}

fn parse_proc_net_dev(contents: &str, device: &str) -> Option<InterfaceCounters> {
    for line in contents.lines() {
        let Some((iface, rest)) = line.split_once(':') else { continue };
        if iface.trim() != device {
            continue;
        }
        let fields: Vec<u64> = rest.split_whitespace().filter_map(|f| f.parse().ok()).collect();
        // /proc/net/dev field order: rx_bytes rx_packets rx_errs ... tx_bytes tx_packets tx_errs ...
        if fields.len() < 16 {
            return None;
        }
        return Some(InterfaceCounters {
            bytes_rx: fields[0],
            packets_rx: fields[1],
            errors_rx: fields[2],
            bytes_tx: fields[8],
            packets_tx: fields[9],
            errors_tx: fields[10],
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netmask_to_prefix_len_handles_common_masks() {
        assert_eq!(netmask_to_prefix_len("255.255.255.0"), 24);
        assert_eq!(netmask_to_prefix_len("255.255.0.0"), 16);
        assert_eq!(netmask_to_prefix_len("255.255.255.252"), 30);
    }

    #[test]
    fn parse_proc_net_dev_extracts_named_device() {
        let sample = "Inter-|   Receive                                                |  Transmit\n \
             face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed\n\
             eth1: 1024       8    0    0    0     0          0         0     2048      16    0    0    0     0       0          0\n";
        let counters = parse_proc_net_dev(sample, "eth1").unwrap();
        assert_eq!(counters.bytes_rx, 1024);
        assert_eq!(counters.packets_rx, 8);
        assert_eq!(counters.bytes_tx, 2048);
        assert_eq!(counters.packets_tx, 16);
    }

    #[test]
    fn parse_proc_net_dev_returns_none_for_unknown_device() {
        let sample = "eth1: 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16\n";
        assert!(parse_proc_net_dev(sample, "eth2").is_none());
    }

    #[test]
    fn stanza_round_trips_through_parse() {
        let rendered = render_stanza("eth0", "192.168.1.5", "255.255.255.0", "192.168.1.1");
        let (ip, netmask, gateway) = parse_stanza(&rendered).unwrap();
        assert_eq!(ip, "192.168.1.5");
        assert_eq!(netmask, "255.255.255.0");
        assert_eq!(gateway, "192.168.1.1");
    }
}
