//! Timeout-bounded external-command execution.
//!
//! Every `ip`, `nft`, and `swanctl` invocation in this crate goes through
//! [`run`] so timeout handling and stderr capture are consistent in one
//! place rather than re-implemented at each call site.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{DaemonError, DaemonResult};

/// Output of a completed external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Captured, UTF-8-lossy stdout.
    pub stdout: String,
    /// Captured, UTF-8-lossy stderr.
    pub stderr: String,
}

/// Run `command` with `args`, optionally inside network namespace `netns`
/// (via `ip netns exec <netns>`), bounded by `timeout`.
///
/// # Errors
///
/// Returns [`DaemonError::Spawn`] if the process could not be started,
/// [`DaemonError::Timeout`] if it did not complete in time (the child is
/// killed on drop).
pub async fn run(
    command: &'static str,
    args: &[&str],
    netns: Option<&str>,
    timeout: Duration,
) -> DaemonResult<CommandOutput> {
    let mut cmd = match netns {
        Some(ns) => {
            let mut c = Command::new("ip");
            c.args(["netns", "exec", ns, command]);
            c.args(args);
            c
        }
        None => {
            let mut c = Command::new(command);
            c.args(args);
            c
        }
    };
    cmd.kill_on_drop(true);
    cmd.stdin(std::process::Stdio::null());

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| DaemonError::Timeout { command, timeout_secs: timeout.as_secs() })?
        .map_err(|source| DaemonError::Spawn { command, source })?;

    Ok(CommandOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Like [`run`], but pipes `stdin` to the child (used for `nft -f -`, which
/// reads its ruleset from standard input rather than a file argument).
///
/// # Errors
///
/// See [`run`].
pub async fn run_with_stdin(
    command: &'static str,
    args: &[&str],
    netns: Option<&str>,
    stdin: &str,
    timeout: Duration,
) -> DaemonResult<CommandOutput> {
    let mut cmd = match netns {
        Some(ns) => {
            let mut c = Command::new("ip");
            c.args(["netns", "exec", ns, command]);
            c.args(args);
            c
        }
        None => {
            let mut c = Command::new(command);
            c.args(args);
            c
        }
    };
    cmd.kill_on_drop(true);
    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());

    let stdin_owned = stdin.to_string();
    let run_fut = async move {
        let mut child = cmd.spawn().map_err(|source| DaemonError::Spawn { command, source })?;
        if let Some(mut pipe) = child.stdin.take() {
            let _ = pipe.write_all(stdin_owned.as_bytes()).await;
        }
        child.wait_with_output().await.map_err(|source| DaemonError::Spawn { command, source })
    };

    let output = tokio::time::timeout(timeout, run_fut)
        .await
        .map_err(|_| DaemonError::Timeout { command, timeout_secs: timeout.as_secs() })??;

    Ok(CommandOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Like [`run`], but a non-zero exit is turned into [`DaemonError::CommandFailed`]
/// instead of being returned in the [`CommandOutput`] for the caller to inspect.
///
/// Used by steps in the namespace policy engine and network programmer where
/// a non-zero exit always means the operation failed outright, unlike the
/// strongSwan orchestrator's lifecycle operations which interpret specific
/// stderr text as success (see `ipsec.rs`).
///
/// # Errors
///
/// See [`run`], plus [`DaemonError::CommandFailed`] on non-zero exit.
pub async fn run_checked(
    command: &'static str,
    args: &[&str],
    netns: Option<&str>,
    timeout: Duration,
) -> DaemonResult<String> {
    let output = run(command, args, netns, timeout).await?;
    if !output.success {
        return Err(DaemonError::CommandFailed {
            command,
            status: "non-zero".to_string(),
            stderr: output.stderr,
        });
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_command_reports_success_and_stdout() {
        let out = run("echo", &["hello"], None, Duration::from_secs(2)).await.unwrap();
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_an_error_from_run() {
        let out = run("false", &[], None, Duration::from_secs(2)).await.unwrap();
        assert!(!out.success);
    }

    #[tokio::test]
    async fn run_checked_surfaces_nonzero_exit_as_error() {
        let result = run_checked("false", &[], None, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(DaemonError::CommandFailed { .. })));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let result = run("definitely-not-a-real-binary", &[], None, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(DaemonError::Spawn { .. })));
    }
}
