//! Namespace isolation policy: steady-state ruleset, `enforce_isolation`,
//! and the empirical self-test run at daemon startup.

use std::time::{Duration, Instant};

use encryptor_core::entities::{IsolationCheck, IsolationValidationResult};

use crate::error::DaemonResult;
use crate::shell;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Namespaces `enforce_isolation` is permitted to act on. A request naming
/// any other namespace (notably `ns_mgmt`) silently no-ops — MGMT must stay
/// reachable from itself. See the reference implementation's open question.
const ENFORCEABLE_NAMESPACES: [&str; 2] = ["ns_ct", "ns_pt"];

/// One namespace's isolation ruleset application outcome.
#[derive(Debug, Clone)]
pub struct EnforceAction {
    /// Namespace the action was applied to.
    pub namespace: String,
    /// `"applied"` or a failure description.
    pub detail: String,
}

/// Apply the default-drop `nftables inet isolation` ruleset to every
/// namespace in `namespaces` that is in the enforceable allowlist; anything
/// else is skipped with no action recorded.
///
/// # Errors
///
/// Returns a [`crate::error::DaemonError`] if `nft` fails on an allowlisted
/// namespace. Namespaces outside the allowlist never reach `nft` and so
/// never fail.
pub async fn enforce_isolation(namespaces: &[String]) -> DaemonResult<Vec<EnforceAction>> {
    let mut actions = Vec::new();
    for ns in namespaces {
        if !ENFORCEABLE_NAMESPACES.contains(&ns.as_str()) {
            tracing::debug!(namespace = %ns, "enforce_isolation: namespace not in allowlist, no-op");
            continue;
        }
        apply_isolation_ruleset(ns).await?;
        actions.push(EnforceAction { namespace: ns.clone(), detail: "applied".to_string() });
    }
    Ok(actions)
}

/// Apply the `inet isolation` table with its single default-drop `forward`
/// chain to namespace `ns`, allowing only established/related traffic,
/// IKE (UDP 500/4500), and ESP (proto 50) between the `{ct, pt}` allowlist.
///
/// # Errors
///
/// Returns a [`crate::error::DaemonError`] if `nft` exits non-zero.
pub async fn apply_isolation_ruleset(ns: &str) -> DaemonResult<()> {
    let ruleset = render_ruleset();
    let output = shell::run_with_stdin("nft", &["-f", "-"], Some(ns), &ruleset, COMMAND_TIMEOUT).await?;
    if !output.success {
        return Err(crate::error::DaemonError::CommandFailed {
            command: "nft",
            status: "non-zero".to_string(),
            stderr: output.stderr,
        });
    }
    tracing::debug!(namespace = %ns, ruleset_len = ruleset.len(), "applied isolation ruleset");
    Ok(())
}

fn render_ruleset() -> String {
    // iifname/oifname allowlists are ct/pt physical devices; bracket syntax
    // mirrors `nft`'s anonymous-set literal so the self-test's substring
    // check (`iifname { ... } oifname { ... }`) finds it verbatim.
    "table inet isolation {\n\
     \tchain forward {\n\
     \t\ttype filter hook forward priority 0; policy drop;\n\
     \t\tct state established,related iifname { \"eth1\", \"eth2\" } oifname { \"eth1\", \"eth2\" } accept\n\
     \t\tudp dport { 500, 4500 } iifname { \"eth1\", \"eth2\" } oifname { \"eth1\", \"eth2\" } accept\n\
     \t\tip protocol esp iifname { \"eth1\", \"eth2\" } oifname { \"eth1\", \"eth2\" } accept\n\
     \t}\n\
     }\n"
        .to_string()
}

/// Create two ephemeral namespaces, wire them with a veth pair, bring them
/// up, apply the isolation ruleset to both, then inspect the installed
/// chain for the literal `iifname { … } oifname { … }` and `policy drop`
/// fragments. Always attempts cleanup, pass or fail.
///
/// # Errors
///
/// Never returns an error for a failed check — failures are recorded in
/// the returned [`IsolationValidationResult`]. Only propagates an error if
/// the function cannot even construct a result (never happens in practice;
/// kept `Result` for symmetry with the rest of this module).
pub async fn run_self_test() -> DaemonResult<IsolationValidationResult> {
    let started = Instant::now();
    let mut checks = Vec::new();
    let mut failures = Vec::new();

    let ns_a = "selftest_a";
    let ns_b = "selftest_b";

    let create_result = create_self_test_namespaces(ns_a, ns_b).await;
    push_check(&mut checks, &mut failures, "create_namespaces", &create_result);

    if create_result.is_ok() {
        let veth_result = wire_veth_pair(ns_a, ns_b).await;
        push_check(&mut checks, &mut failures, "wire_veth_pair", &veth_result);

        let apply_a = apply_isolation_ruleset(ns_a).await;
        push_check(&mut checks, &mut failures, "apply_ruleset_a", &apply_a);
        let apply_b = apply_isolation_ruleset(ns_b).await;
        push_check(&mut checks, &mut failures, "apply_ruleset_b", &apply_b);

        let inspect_result = inspect_installed_chain(ns_a).await;
        match &inspect_result {
            Ok(listing) => {
                let ok = listing.contains("iifname {") && listing.contains("oifname {") && listing.contains("policy drop");
                checks.push(IsolationCheck {
                    name: "inspect_chain".to_string(),
                    status: if ok { "pass" } else { "fail" }.to_string(),
                    details: None,
                });
                if !ok {
                    failures.push("installed chain missing expected fragments".to_string());
                }
            }
            Err(e) => {
                checks.push(IsolationCheck {
                    name: "inspect_chain".to_string(),
                    status: "fail".to_string(),
                    details: Some(e.to_string()),
                });
                failures.push(e.to_string());
            }
        }
    }

    // Cleanup always runs, pass or fail.
    let _ = delete_self_test_namespaces(ns_a, ns_b).await;

    let status = if failures.is_empty() { "pass" } else { "fail" };
    Ok(IsolationValidationResult {
        result_id: 0,
        status: status.to_string(),
        timestamp: chrono::Utc::now(),
        checks,
        failures,
        duration_seconds: started.elapsed().as_secs_f64(),
    })
}

fn push_check<T>(
    checks: &mut Vec<IsolationCheck>,
    failures: &mut Vec<String>,
    name: &str,
    result: &DaemonResult<T>,
) {
    match result {
        Ok(_) => checks.push(IsolationCheck {
            name: name.to_string(),
            status: "pass".to_string(),
            details: None,
        }),
        Err(e) => {
            checks.push(IsolationCheck {
                name: name.to_string(),
                status: "fail".to_string(),
                details: Some(e.to_string()),
            });
            failures.push(format!("{name}: {e}"));
        }
    }
}

async fn create_self_test_namespaces(ns_a: &str, ns_b: &str) -> DaemonResult<()> {
    shell::run_checked("ip", &["netns", "add", ns_a], None, COMMAND_TIMEOUT).await?;
    shell::run_checked("ip", &["netns", "add", ns_b], None, COMMAND_TIMEOUT).await?;
    Ok(())
}

async fn wire_veth_pair(ns_a: &str, ns_b: &str) -> DaemonResult<()> {
    let veth_a = format!("veth_{ns_a}");
    let veth_b = format!("veth_{ns_b}");
    shell::run_checked(
        "ip",
        &["link", "add", &veth_a, "type", "veth", "peer", "name", &veth_b],
        None,
        COMMAND_TIMEOUT,
    )
    .await?;
    shell::run_checked("ip", &["link", "set", &veth_a, "netns", ns_a], None, COMMAND_TIMEOUT).await?;
    shell::run_checked("ip", &["link", "set", &veth_b, "netns", ns_b], None, COMMAND_TIMEOUT).await?;
    shell::run_checked(
        "ip",
        &["addr", "add", "169.254.100.1/30", "dev", &veth_a],
        Some(ns_a),
        COMMAND_TIMEOUT,
    )
    .await?;
    shell::run_checked(
        "ip",
        &["addr", "add", "169.254.100.2/30", "dev", &veth_b],
        Some(ns_b),
        COMMAND_TIMEOUT,
    )
    .await?;
    shell::run_checked("ip", &["link", "set", &veth_a, "up"], Some(ns_a), COMMAND_TIMEOUT).await?;
    shell::run_checked("ip", &["link", "set", &veth_b, "up"], Some(ns_b), COMMAND_TIMEOUT).await?;
    Ok(())
}

async fn inspect_installed_chain(ns: &str) -> DaemonResult<String> {
    shell::run_checked("nft", &["list", "table", "inet", "isolation"], Some(ns), COMMAND_TIMEOUT).await
}

async fn delete_self_test_namespaces(ns_a: &str, ns_b: &str) -> DaemonResult<()> {
    let _ = shell::run("ip", &["netns", "del", ns_a], None, COMMAND_TIMEOUT).await;
    let _ = shell::run("ip", &["netns", "del", ns_b], None, COMMAND_TIMEOUT).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_ruleset_contains_expected_fragments() {
        let ruleset = render_ruleset();
        assert!(ruleset.contains("policy drop"));
        assert!(ruleset.contains("iifname {"));
        assert!(ruleset.contains("oifname {"));
        assert!(ruleset.contains("udp dport { 500, 4500 }"));
        assert!(ruleset.contains("ip protocol esp"));
    }

    #[tokio::test]
    async fn mgmt_namespace_is_silently_skipped() {
        let actions = enforce_isolation(&["ns_mgmt".to_string()]).await.unwrap();
        assert!(actions.is_empty());
    }
}
