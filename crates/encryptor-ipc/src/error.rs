//! IPC transport error types.

use thiserror::Error;

/// Errors that can occur sending a request to, or reading a response from,
/// the daemon.
///
/// Every variant here is a *soft* failure from the API's point of view
/// (§7): the caller downgrades it to `meta.daemonAvailable = false` for
/// every command except `initiate_peer`, which surfaces it as a 503.
#[derive(Debug, Error)]
pub enum IpcError {
    /// The UNIX socket had no listener (daemon not running, or socket path wrong).
    #[error("daemon connection refused at {0}")]
    ConnectionRefused(String),

    /// The connect, send, or receive did not complete within the configured timeout.
    #[error("daemon request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The peer closed the connection before a full line was received.
    #[error("daemon connection closed before a response was received")]
    ConnectionClosed,

    /// A response was read but contained zero bytes.
    #[error("daemon returned an empty response")]
    EmptyResponse,

    /// The response line was not valid JSON, or did not match the expected shape.
    #[error("malformed daemon response: {0}")]
    MalformedResponse(String),

    /// The daemon understood the request but reported a command-level failure.
    #[error("daemon reported an error: {0}")]
    CommandFailed(String),

    /// Any other I/O failure talking to the socket.
    #[error("daemon I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for IPC operations.
pub type IpcResult<T> = Result<T, IpcError>;
