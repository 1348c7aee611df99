//! The daemon-process side of the IPC transport: a single-threaded accept
//! loop that serves one request per connection and serialises every
//! handler invocation (§5 — "at most one `ip`/`nft`/`swanctl` invocation
//! runs at a time").

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use crate::protocol::{Command, Request, Response};

/// Handles one decoded [`Request`] and produces a [`Response`].
///
/// Implemented once by the daemon binary, dispatching on [`Command`] to the
/// namespace policy engine, network programmer, and IPsec orchestrator.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle a single request. Implementations should never panic;
    /// internal failures should be converted to [`Response::error`].
    async fn handle(&self, command: Command, payload: serde_json::Value) -> Response;
}

/// Shared flag, set by the daemon's signal handler task, observed between
/// accept attempts so shutdown happens within ~1s of the signal (§4.5).
#[derive(Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    /// A fresh, not-yet-triggered flag.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Request shutdown.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Bind the daemon's UNIX socket, hardening its permissions, and run the
/// accept loop until `shutdown` is triggered.
///
/// The socket (and its parent directory, if this process created it) is
/// created mode `0600`; when running as `root` it is additionally chowned
/// to `root:root`. Each accepted connection is served to completion before
/// the next `accept` begins, which is what gives the daemon its
/// one-invocation-at-a-time guarantee.
///
/// # Errors
///
/// Returns an I/O error if the socket directory cannot be created, an
/// existing stale socket cannot be removed, or `bind` fails.
pub async fn serve(
    socket_path: &Path,
    handler: Arc<dyn CommandHandler>,
    shutdown: ShutdownFlag,
) -> std::io::Result<()> {
    if let Some(parent) = socket_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
        harden_permissions(parent).await;
    }

    // A daemon restart after an unclean shutdown may leave a stale socket file.
    if socket_path.exists() {
        tokio::fs::remove_file(socket_path).await?;
    }

    let listener = UnixListener::bind(socket_path)?;
    harden_permissions(socket_path).await;

    tracing::info!(path = %socket_path.display(), "daemon IPC socket listening");

    while !shutdown.is_triggered() {
        match tokio::time::timeout(Duration::from_secs(1), listener.accept()).await {
            Ok(Ok((stream, _addr))) => {
                serve_one(stream, handler.as_ref()).await;
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed to accept IPC connection");
            }
            Err(_elapsed) => {
                // No connection within 1s; loop back around to recheck `shutdown`.
            }
        }
    }

    tracing::info!("daemon IPC accept loop exiting on shutdown signal");
    Ok(())
}

async fn serve_one(mut stream: UnixStream, handler: &dyn CommandHandler) {
    let request = match read_request_line(&mut stream).await {
        Ok(Some(req)) => req,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read IPC request");
            return;
        }
    };

    let Some(command) = Command::parse(&request.command) else {
        tracing::warn!(command = %request.command, "rejected unknown IPC command");
        send_response(&mut stream, &Response::error("Unknown command")).await;
        return;
    };

    tracing::debug!(command = command.as_str(), "accepted IPC command");
    let response = handler.handle(command, request.payload).await;
    if matches!(response, Response::Error { .. }) {
        tracing::warn!(command = command.as_str(), "IPC command failed");
    }
    send_response(&mut stream, &response).await;
}

async fn read_request_line(stream: &mut UnixStream) -> std::io::Result<Option<Request>> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            return Ok(None);
        }
        if byte[0] == b'\n' {
            break;
        }
        buf.push(byte[0]);
    }
    if buf.is_empty() {
        return Ok(None);
    }
    match serde_json::from_slice(&buf) {
        Ok(req) => Ok(Some(req)),
        Err(e) => {
            tracing::warn!(error = %e, "malformed IPC request");
            Ok(None)
        }
    }
}

async fn send_response(stream: &mut UnixStream, response: &Response) {
    let mut line = match serde_json::to_vec(response) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode IPC response");
            return;
        }
    };
    line.push(b'\n');

    if let Err(e) = stream.write_all(&line).await {
        if e.kind() == std::io::ErrorKind::BrokenPipe {
            tracing::warn!("client disconnected before response was delivered");
        } else {
            tracing::warn!(error = %e, "failed to send IPC response");
        }
    }
}

#[cfg(unix)]
async fn harden_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await {
        tracing::warn!(path = %path.display(), error = %e, "failed to harden IPC socket permissions");
    }

    // chown to root:root is a no-op (and usually a permission error) unless
    // this process is already running as root, matching the reference
    // implementation's "when running as root" qualifier.
    if nix_is_root() {
        let uid = nix::unistd::Uid::from_raw(0);
        let gid = nix::unistd::Gid::from_raw(0);
        if let Err(e) = nix::unistd::chown(path, Some(uid), Some(gid)) {
            tracing::warn!(path = %path.display(), error = %e, "failed to chown IPC socket to root:root");
        }
    }
}

#[cfg(unix)]
fn nix_is_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OpResult;

    struct EchoHandler;

    #[async_trait]
    impl CommandHandler for EchoHandler {
        async fn handle(&self, command: Command, _payload: serde_json::Value) -> Response {
            Response::ok(&OpResult::success(command.as_str()))
        }
    }

    #[tokio::test]
    async fn unknown_command_yields_unknown_command_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");
        let shutdown = ShutdownFlag::new();
        let handler: Arc<dyn CommandHandler> = Arc::new(EchoHandler);

        let shutdown_clone = shutdown.clone();
        let path_clone = path.clone();
        let server = tokio::spawn(async move {
            serve(&path_clone, handler, shutdown_clone).await.unwrap();
        });

        // Give the listener a moment to bind.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut stream = UnixStream::connect(&path).await.unwrap();
        let req = Request {
            command: "not_a_real_command".to_string(),
            payload: serde_json::json!({}),
        };
        let mut line = serde_json::to_vec(&req).unwrap();
        line.push(b'\n');
        stream.write_all(&line).await.unwrap();

        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = stream.read(&mut byte).await.unwrap();
            if n == 0 || byte[0] == b'\n' {
                break;
            }
            buf.push(byte[0]);
        }
        let response: Response = serde_json::from_slice(&buf).unwrap();
        assert!(matches!(response, Response::Error { error } if error == "Unknown command"));

        shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(2), server).await;
    }

    #[tokio::test]
    async fn known_command_is_dispatched_to_handler() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");
        let shutdown = ShutdownFlag::new();
        let handler: Arc<dyn CommandHandler> = Arc::new(EchoHandler);

        let shutdown_clone = shutdown.clone();
        let path_clone = path.clone();
        let server = tokio::spawn(async move {
            serve(&path_clone, handler, shutdown_clone).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut stream = UnixStream::connect(&path).await.unwrap();
        let req = Request::new(Command::GetValidationResult, &crate::protocol::EmptyPayload::default());
        let mut line = serde_json::to_vec(&req).unwrap();
        line.push(b'\n');
        stream.write_all(&line).await.unwrap();

        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = stream.read(&mut byte).await.unwrap();
            if n == 0 || byte[0] == b'\n' {
                break;
            }
            buf.push(byte[0]);
        }
        let response: Response = serde_json::from_slice(&buf).unwrap();
        match response {
            Response::Ok { result } => {
                let result: OpResult = serde_json::from_value(result).unwrap();
                assert_eq!(result.message, "get_validation_result");
            }
            Response::Error { error } => panic!("unexpected error: {error}"),
        }

        shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(2), server).await;
    }
}
