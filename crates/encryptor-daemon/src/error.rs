//! Daemon-local error type.
//!
//! Every fallible operation the command handlers perform returns this
//! enum rather than an opaque wrapper, so `commands.rs` can turn each
//! variant into a typed IPC response without string-sniffing (§11).

use thiserror::Error;

/// Errors produced by the namespace policy engine, network programmer, and
/// IPsec orchestrator.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// An external command (`ip`, `nft`, `swanctl`) could not be spawned at all.
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        /// The binary that failed to spawn.
        command: &'static str,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// An external command ran to completion but exited non-zero.
    #[error("{command} exited with status {status}: {stderr}")]
    CommandFailed {
        /// The binary that failed.
        command: &'static str,
        /// Its exit status, as rendered by `std::process::ExitStatus`.
        status: String,
        /// Captured stderr, truncated by the caller if large.
        stderr: String,
    },

    /// An external command did not complete within its allotted timeout.
    #[error("{command} timed out after {timeout_secs}s")]
    Timeout {
        /// The binary that timed out.
        command: &'static str,
        /// The timeout that was exceeded, seconds.
        timeout_secs: u64,
    },

    /// A filesystem operation (writing a netns stanza, a swanctl conf file) failed.
    #[error("filesystem operation on {path} failed: {source}")]
    Io {
        /// The path being operated on.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The isolation self-test or `enforce_isolation` detected a policy violation.
    #[error("isolation check failed: {0}")]
    IsolationViolation(String),

    /// A strongSwan config file failed its syntax guard before being written.
    #[error("generated strongSwan config failed syntax guard: {0}")]
    MalformedConfig(String),
}

/// Result type for daemon-side operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
