//! strongSwan connection/secret file generation and `swanctl` lifecycle
//! operations (§4.8).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use encryptor_core::entities::{DpdAction, IkeVersion};
use encryptor_core::sanitize::sanitize_name;
use encryptor_ipc::protocol::{OpResult, OpStatus};

use crate::error::{DaemonError, DaemonResult};
use crate::shell;

const SWANCTL_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything needed to render a peer's strongSwan connection file.
#[derive(Debug, Clone)]
pub struct PeerConnectionSpec {
    /// Original, unsanitised display name (kept in a leading comment).
    pub name: String,
    /// Remote IPv4 address.
    pub remote_ip: String,
    /// Plaintext PSK, held only for the duration of file generation.
    pub psk: String,
    /// Negotiated IKE version.
    pub ike_version: IkeVersion,
    /// DPD action on timeout.
    pub dpd_action: DpdAction,
    /// DPD delay, seconds.
    pub dpd_delay: i64,
    /// DPD timeout, seconds.
    pub dpd_timeout: i64,
    /// Rekey interval, seconds.
    pub rekey_time: i64,
    /// Routed destination CIDRs; empty means `0.0.0.0/0`.
    pub routes: Vec<String>,
}

/// Apply [`sanitize_name`] to `name` — any character outside
/// `[A-Za-z0-9_-]` becomes `_`. All `swanctl` identifiers (filenames,
/// connection names, CHILD_SA names) use this form; the original name is
/// preserved in a comment and in the database.
#[must_use]
pub fn sanitized(name: &str) -> String {
    sanitize_name(name)
}

fn conf_path(conf_dir: &Path, sanitised_name: &str) -> PathBuf {
    conf_dir.join(format!("{sanitised_name}.conf"))
}

fn render_local_ts(routes: &[String]) -> String {
    if routes.is_empty() {
        "0.0.0.0/0".to_string()
    } else {
        routes.join(",")
    }
}

fn render_conf(spec: &PeerConnectionSpec) -> String {
    let n = sanitized(&spec.name);
    let local_ts = render_local_ts(&spec.routes);
    format!(
        "# {original_name}\n\
         connections {{\n\
         \t{n} {{\n\
         \t\tversion={version}\n\
         \t\tremote_addrs={remote_ip}\n\
         \t\tdpd_delay={dpd_delay}\n\
         \t\tdpd_timeout={dpd_timeout}\n\
         \t\tchildren {{\n\
         \t\t\t{n}-child {{\n\
         \t\t\t\tmode=tunnel\n\
         \t\t\t\tdpd_action={dpd_action}\n\
         \t\t\t\trekey_time={rekey_time}\n\
         \t\t\t\tlocal_ts={local_ts}\n\
         \t\t\t}}\n\
         \t\t}}\n\
         \t}}\n\
         }}\n\
         secrets {{\n\
         \tike-{n} {{\n\
         \t\tid={remote_ip}\n\
         \t\tsecret=\"{psk}\"\n\
         \t}}\n\
         }}\n",
        original_name = spec.name,
        version = spec.ike_version.as_numeric(),
        remote_ip = spec.remote_ip,
        dpd_delay = spec.dpd_delay,
        dpd_timeout = spec.dpd_timeout,
        dpd_action = spec.dpd_action.as_str(),
        rekey_time = spec.rekey_time,
        local_ts = local_ts,
        psk = spec.psk,
    )
}

/// Brace-balance and block-presence check performed before writing a
/// generated config to disk.
///
/// # Errors
///
/// Returns [`DaemonError::MalformedConfig`] if braces are unbalanced or the
/// `connections {` block is missing.
fn check_syntax(rendered: &str) -> DaemonResult<()> {
    let opens = rendered.matches('{').count();
    let closes = rendered.matches('}').count();
    if opens != closes {
        return Err(DaemonError::MalformedConfig(format!(
            "unbalanced braces: {opens} open vs {closes} close"
        )));
    }
    if !rendered.contains("connections {") {
        return Err(DaemonError::MalformedConfig("missing connections block".to_string()));
    }
    Ok(())
}

/// Write a peer's strongSwan config file after a syntax guard.
///
/// # Errors
///
/// Returns [`DaemonError::MalformedConfig`] if the rendered content fails
/// the syntax guard, or [`DaemonError::Io`] if the file cannot be written.
pub async fn write_peer_config(conf_dir: &Path, spec: &PeerConnectionSpec) -> DaemonResult<()> {
    let rendered = render_conf(spec);
    check_syntax(&rendered)?;

    tokio::fs::create_dir_all(conf_dir)
        .await
        .map_err(|source| DaemonError::Io { path: conf_dir.display().to_string(), source })?;
    let path = conf_path(conf_dir, &sanitized(&spec.name));
    tokio::fs::write(&path, rendered)
        .await
        .map_err(|source| DaemonError::Io { path: path.display().to_string(), source })?;
    Ok(())
}

async fn load_conns() -> OpResult {
    match shell::run("swanctl", &["--load-conns"], None, SWANCTL_TIMEOUT).await {
        Ok(out) if out.success => OpResult::success("connections loaded"),
        Ok(out) => OpResult::error(format!("swanctl --load-conns failed: {}", out.stderr)),
        Err(DaemonError::Timeout { .. }) => OpResult::warning("swanctl --load-conns timed out"),
        Err(e) => OpResult::error(e.to_string()),
    }
}

/// `configure_peer` — write the config file, then load it.
///
/// # Errors
///
/// Returns a [`DaemonError`] only if the config could not be written; a
/// failed `swanctl --load-conns` is reported in the returned [`OpResult`],
/// not as an `Err`.
pub async fn configure_peer(conf_dir: &Path, spec: &PeerConnectionSpec) -> DaemonResult<OpResult> {
    write_peer_config(conf_dir, spec).await?;
    Ok(load_conns().await)
}

/// `initiate_peer` — load connections, then initiate the named CHILD_SA.
/// Output mentioning `already INSTALLED` or `already established` is
/// treated as success regardless of exit code (idempotence). A timeout is
/// a warning, not an error, since the SA may still complete negotiation.
pub async fn initiate_peer(name: &str) -> OpResult {
    let load = load_conns().await;
    if load.status == OpStatus::Error {
        return load;
    }

    let child = format!("{}-child", sanitized(name));
    match shell::run("swanctl", &["--initiate", "--child", &child], None, SWANCTL_TIMEOUT).await {
        Ok(out) if out.success => OpResult::success("initiate requested"),
        Ok(out) if out.stdout.contains("already INSTALLED") || out.stdout.contains("already established") => {
            OpResult::success("tunnel already established")
        }
        Ok(out) => OpResult::error(format!("swanctl --initiate failed: {}", out.stderr)),
        Err(DaemonError::Timeout { .. }) => {
            OpResult::warning("initiate timed out, negotiation may still complete")
        }
        Err(e) => OpResult::error(e.to_string()),
    }
}

/// `teardown_peer` — terminate the named CHILD_SA. "no matching
/// connection" is success; a timeout is treated as success since the
/// tunnel is presumed already gone.
pub async fn teardown_peer(name: &str) -> OpResult {
    let child = format!("{}-child", sanitized(name));
    match shell::run("swanctl", &["--terminate", "--child", &child], None, SWANCTL_TIMEOUT).await {
        Ok(out) if out.success => OpResult::success("tunnel terminated"),
        Ok(out) if out.stderr.contains("no matching") || out.stdout.contains("no matching") => {
            OpResult::success("no matching connection, already down")
        }
        Ok(out) => OpResult::error(format!("swanctl --terminate failed: {}", out.stderr)),
        Err(DaemonError::Timeout { .. }) => OpResult::success("terminate timed out, presumed already down"),
        Err(e) => OpResult::error(e.to_string()),
    }
}

/// `remove_peer_config` — delete the config file. A missing file is
/// success; a permission error is an error.
pub async fn remove_peer_config(conf_dir: &Path, name: &str) -> OpResult {
    let path = conf_path(conf_dir, &sanitized(name));
    match tokio::fs::remove_file(&path).await {
        Ok(()) => OpResult::success("config file removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => OpResult::success("config file already absent"),
        Err(e) => OpResult::error(format!("failed to remove config file: {e}")),
    }
}

/// `update_routes` — rewrite the `local_ts = …` line of the named
/// connection's child block, then reload. An absent file is success; an
/// empty route list yields `local_ts = 0.0.0.0/0`.
pub async fn update_routes(conf_dir: &Path, name: &str, routes: &[String]) -> DaemonResult<OpResult> {
    let path = conf_path(conf_dir, &sanitized(name));
    let contents = match tokio::fs::read_to_string(&path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(OpResult::success("config file absent, nothing to update"));
        }
        Err(source) => return Err(DaemonError::Io { path: path.display().to_string(), source }),
    };

    let local_ts = render_local_ts(routes);
    let rewritten = rewrite_local_ts_line(&contents, &local_ts);
    check_syntax(&rewritten)?;
    tokio::fs::write(&path, rewritten)
        .await
        .map_err(|source| DaemonError::Io { path: path.display().to_string(), source })?;

    Ok(reload_peer_config().await)
}

fn rewrite_local_ts_line(contents: &str, new_local_ts: &str) -> String {
    let mut out = String::with_capacity(contents.len());
    for line in contents.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("local_ts=") || trimmed.starts_with("local_ts =") {
            let indent = &line[..line.len() - trimmed.len()];
            out.push_str(indent);
            out.push_str("local_ts=");
            out.push_str(new_local_ts);
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

/// Thin `--load-conns` wrapper used after rewriting a route set.
async fn reload_peer_config() -> OpResult {
    load_conns().await
}

/// Telemetry observed for a single tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    /// `ESTABLISHED`.
    Up,
    /// `CONNECTING` or `REKEYING`.
    Negotiating,
    /// `DELETING`, or the state keyword was absent/unrecognised.
    Down,
}

/// Parsed per-tunnel telemetry.
#[derive(Debug, Clone, Copy, Default)]
pub struct TunnelTelemetry {
    /// Seconds since the CHILD SA was established, if present.
    pub established_sec: u64,
    /// Cumulative received bytes.
    pub bytes_in: u64,
    /// Cumulative transmitted bytes.
    pub bytes_out: u64,
    /// Cumulative received packets.
    pub packets_in: u64,
    /// Cumulative transmitted packets.
    pub packets_out: u64,
}

/// Run `swanctl --list-sas` and parse per-peer telemetry, keyed by
/// sanitised connection name (resolve back to peer id via `name_by_sanitised`).
///
/// # Errors
///
/// Returns a [`DaemonError`] only if the `swanctl` process itself could not
/// be run; malformed or unrecognised output never produces an error — it
/// degrades to a `Down` state with zeroed counters for that connection.
pub async fn list_sas() -> DaemonResult<BTreeMap<String, (TunnelState, TunnelTelemetry)>> {
    let output = shell::run("swanctl", &["--list-sas"], None, SWANCTL_TIMEOUT).await?;
    Ok(parse_list_sas(&output.stdout))
}

fn parse_list_sas(stdout: &str) -> BTreeMap<String, (TunnelState, TunnelTelemetry)> {
    let mut result = BTreeMap::new();
    let mut current_name: Option<String> = None;
    let mut current_state = TunnelState::Down;
    let mut current_telemetry = TunnelTelemetry::default();

    for line in stdout.lines() {
        let trimmed = line.trim();
        let is_top_level = !line.starts_with(' ') && !line.starts_with('\t');
        if let Some(name) = is_top_level.then(|| parse_connection_header(trimmed)).flatten() {
            if let Some(prev) = current_name.take() {
                result.insert(prev, (current_state, current_telemetry));
            }
            current_name = Some(name);
            current_state = TunnelState::Down;
            current_telemetry = TunnelTelemetry::default();
            if let Some(keyword) = extract_state_keyword(trimmed) {
                current_state = map_state_keyword(keyword);
            }
            continue;
        }

        if current_name.is_none() {
            continue;
        }

        if let Some(bytes) = extract_counter(trimmed, "bytes_i") {
            current_telemetry.bytes_in = bytes;
        }
        if let Some(bytes) = extract_counter(trimmed, "bytes_o") {
            current_telemetry.bytes_out = bytes;
        }
        if let Some(packets) = extract_counter(trimmed, "packets_i") {
            current_telemetry.packets_in = packets;
        }
        if let Some(packets) = extract_counter(trimmed, "packets_o") {
            current_telemetry.packets_out = packets;
        }
        if let Some(secs) = extract_established_seconds(trimmed) {
            current_telemetry.established_sec = secs;
        }
    }
    if let Some(prev) = current_name.take() {
        result.insert(prev, (current_state, current_telemetry));
    }
    result
}

fn parse_connection_header(line: &str) -> Option<String> {
    // strongSwan headers look like: "site-a: #1, ESTABLISHED, IKEv2, ..."
    let (name, rest) = line.split_once(':')?;
    if name.is_empty() || !rest.trim_start().starts_with('#') {
        return None;
    }
    Some(name.trim().to_string())
}

fn extract_state_keyword(line: &str) -> Option<&str> {
    for keyword in ["ESTABLISHED", "CONNECTING", "REKEYING", "DELETING"] {
        if line.contains(keyword) {
            return Some(keyword);
        }
    }
    None
}

fn map_state_keyword(keyword: &str) -> TunnelState {
    match keyword {
        "ESTABLISHED" => TunnelState::Up,
        "CONNECTING" | "REKEYING" => TunnelState::Negotiating,
        _ => TunnelState::Down,
    }
}

fn extract_counter(line: &str, prefix: &str) -> Option<u64> {
    // e.g. "bytes_i = 1024, bytes_o = 2048" — take digits after the first
    // occurrence of `prefix` on the line.
    let idx = line.find(prefix)?;
    let after_prefix = &line[idx + prefix.len()..];
    let digits: String = after_prefix
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn extract_established_seconds(line: &str) -> Option<u64> {
    if !line.contains("established") {
        return None;
    }
    let digits: String = line
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec(name: &str, routes: Vec<String>) -> PeerConnectionSpec {
        PeerConnectionSpec {
            name: name.to_string(),
            remote_ip: "203.0.113.10".to_string(),
            psk: "s3cret".to_string(),
            ike_version: IkeVersion::Ikev2,
            dpd_action: DpdAction::Restart,
            dpd_delay: 30,
            dpd_timeout: 150,
            rekey_time: 3600,
            routes,
        }
    }

    #[test]
    fn rendered_config_passes_syntax_guard_and_sanitises_name() {
        let spec = sample_spec("Site A", vec!["10.1.0.0/24".to_string()]);
        let rendered = render_conf(&spec);
        assert!(check_syntax(&rendered).is_ok());
        assert!(rendered.contains("Site_A {"));
        assert!(rendered.contains("Site_A-child {"));
        assert!(rendered.contains("# Site A"));
        assert!(rendered.contains("local_ts=10.1.0.0/24"));
    }

    #[test]
    fn empty_routes_render_default_route() {
        let spec = sample_spec("site-a", vec![]);
        let rendered = render_conf(&spec);
        assert!(rendered.contains("local_ts=0.0.0.0/0"));
    }

    #[test]
    fn unbalanced_braces_fail_the_syntax_guard() {
        let broken = "connections { foo { bar }".to_string();
        assert!(matches!(check_syntax(&broken), Err(DaemonError::MalformedConfig(_))));
    }

    #[test]
    fn missing_connections_block_fails_the_syntax_guard() {
        let broken = "secrets { ike-x { } }".to_string();
        assert!(matches!(check_syntax(&broken), Err(DaemonError::MalformedConfig(_))));
    }

    #[test]
    fn rewrite_local_ts_line_preserves_indentation() {
        let original = "\t\t\tlocal_ts=10.1.0.0/24\n\t\t\tmode=tunnel\n";
        let rewritten = rewrite_local_ts_line(original, "10.2.0.0/24");
        assert!(rewritten.contains("\t\t\tlocal_ts=10.2.0.0/24"));
        assert!(rewritten.contains("mode=tunnel"));
    }

    #[test]
    fn list_sas_maps_state_keywords() {
        let sample = "site-a: #1, ESTABLISHED, IKEv2, reauthentication in 2 hours\n  \
                       site-a-child: #2, reqid 1, INSTALLED, TUNNEL, ESP in UDP SPIs\n    \
                       bytes_i = 1024, bytes_o = 2048\n    \
                       packets_i = 8, packets_o = 16\n    \
                       established 120s ago\n\
                       site-b: #3, CONNECTING, IKEv2\n";
        let parsed = parse_list_sas(sample);
        let (state_a, telemetry_a) = parsed.get("site-a").unwrap();
        assert_eq!(*state_a, TunnelState::Up);
        assert_eq!(telemetry_a.bytes_in, 1024);
        assert_eq!(telemetry_a.bytes_out, 2048);

        let (state_b, _) = parsed.get("site-b").unwrap();
        assert_eq!(*state_b, TunnelState::Negotiating);
    }

    #[test]
    fn list_sas_never_panics_on_malformed_output() {
        let parsed = parse_list_sas("garbage\n:::\n1234\n");
        assert!(parsed.is_empty());
    }
}
