//! The API-process side of the IPC transport: an async client that connects,
//! sends one framed request, reads one framed response, and closes.
//!
//! [`DaemonClient`] is a trait so the API's request handlers can be tested
//! against an in-memory double (§13) instead of a real UNIX socket.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::error::{IpcError, IpcResult};
use crate::protocol::{Command, Request, Response};

/// Default send/receive timeout for an ordinary daemon call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
/// Timeout used by the `/system/health` probe, which must not let a wedged
/// daemon delay the health endpoint.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_millis(500);

/// Maximum single response line accepted, as a guard against a daemon bug
/// that never writes a newline.
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Issues one request and awaits one response over the daemon's UNIX socket.
///
/// Implemented for every typed command in this module; also object-safe so
/// `Arc<dyn DaemonClient>` can be held in shared API state and swapped for a
/// test double.
#[async_trait]
pub trait DaemonClient: Send + Sync {
    /// Send a raw request and return the raw response, applying this
    /// client's configured timeout to the whole round trip.
    ///
    /// # Errors
    ///
    /// See [`IpcError`].
    async fn call(&self, request: Request) -> IpcResult<Response>;
}

/// Typed `call` wrapper, split out of [`DaemonClient`] itself so the trait
/// stays free of generic methods and `Arc<dyn DaemonClient>` keeps working
/// as shared API state (§13).
#[async_trait]
pub trait DaemonClientExt {
    /// Send a typed request and decode a typed result out of a successful
    /// response.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::CommandFailed`] if the daemon reported
    /// `status: error`, or [`IpcError::MalformedResponse`] if the `result`
    /// payload does not match `R`.
    async fn call_typed<P, R>(&self, command: Command, payload: &P) -> IpcResult<R>
    where
        P: Serialize + Sync,
        R: DeserializeOwned;
}

#[async_trait]
impl<T: DaemonClient + ?Sized + Sync> DaemonClientExt for T {
    async fn call_typed<P, R>(&self, command: Command, payload: &P) -> IpcResult<R>
    where
        P: Serialize + Sync,
        R: DeserializeOwned,
    {
        let request = Request::new(command, payload);
        match self.call(request).await? {
            Response::Ok { result } => serde_json::from_value(result)
                .map_err(|e| IpcError::MalformedResponse(e.to_string())),
            Response::Error { error } => Err(IpcError::CommandFailed(error)),
        }
    }
}

/// A [`DaemonClient`] backed by a real UNIX domain socket.
#[derive(Debug, Clone)]
pub struct UnixSocketDaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl UnixSocketDaemonClient {
    /// Build a client against `socket_path` using [`DEFAULT_TIMEOUT`].
    #[must_use]
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build a client with an explicit timeout, e.g. [`HEALTH_CHECK_TIMEOUT`].
    #[must_use]
    pub fn with_timeout(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    /// The socket path this client connects to.
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    async fn round_trip(&self, request: &Request) -> IpcResult<Response> {
        let mut line = serde_json::to_vec(request)
            .map_err(|e| IpcError::MalformedResponse(e.to_string()))?;
        line.push(b'\n');

        let fut = async {
            let mut stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::ConnectionRefused
                    || e.kind() == std::io::ErrorKind::NotFound
                {
                    IpcError::ConnectionRefused(self.socket_path.display().to_string())
                } else {
                    IpcError::Io(e)
                }
            })?;

            stream.write_all(&line).await?;
            stream.flush().await?;

            read_response_line(&mut stream).await
        };

        match timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(IpcError::Timeout(self.timeout)),
        }
    }
}

async fn read_response_line(stream: &mut UnixStream) -> IpcResult<Response> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            if buf.is_empty() {
                return Err(IpcError::ConnectionClosed);
            }
            break;
        }
        if byte[0] == b'\n' {
            break;
        }
        buf.push(byte[0]);
        if buf.len() > MAX_LINE_BYTES {
            return Err(IpcError::MalformedResponse("response exceeded maximum line length".to_string()));
        }
    }

    if buf.is_empty() {
        return Err(IpcError::EmptyResponse);
    }

    serde_json::from_slice(&buf).map_err(|e| IpcError::MalformedResponse(e.to_string()))
}

#[async_trait]
impl DaemonClient for UnixSocketDaemonClient {
    async fn call(&self, request: Request) -> IpcResult<Response> {
        self.round_trip(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{EmptyPayload, OpResult};
    use tokio::net::UnixListener;

    #[tokio::test]
    async fn connection_refused_when_nothing_is_listening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonexistent.sock");
        let client = UnixSocketDaemonClient::new(path);
        let result = client
            .call(Request::new(Command::GetValidationResult, &EmptyPayload::default()))
            .await;
        assert!(matches!(result, Err(IpcError::ConnectionRefused(_))));
    }

    #[tokio::test]
    async fn happy_path_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let resp = Response::ok(&OpResult::success("ok"));
            let mut line = serde_json::to_vec(&resp).unwrap();
            line.push(b'\n');
            stream.write_all(&line).await.unwrap();
        });

        let client = UnixSocketDaemonClient::new(&path);
        let result: OpResult = client
            .call_typed(Command::TeardownPeer, &EmptyPayload::default())
            .await
            .unwrap();
        assert_eq!(result.message, "ok");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn empty_response_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"\n").await.unwrap();
        });

        let client = UnixSocketDaemonClient::new(&path);
        let result = client
            .call(Request::new(Command::GetValidationResult, &EmptyPayload::default()))
            .await;
        assert!(matches!(result, Err(IpcError::EmptyResponse)));
        server.await.unwrap();
    }
}
