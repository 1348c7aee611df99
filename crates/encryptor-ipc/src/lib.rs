//! UNIX-socket, newline-framed JSON request/response protocol between the
//! unprivileged API process and the privileged daemon process (§4.5).
//!
//! - [`protocol`] — wire types shared by both ends.
//! - [`client`] — the API-side [`client::DaemonClient`] trait and its
//!   production UNIX-socket implementation.
//! - [`server`] — the daemon-side accept loop and [`server::CommandHandler`]
//!   trait the daemon binary implements.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod client;
mod error;
pub mod protocol;
pub mod server;

pub use client::{DaemonClient, UnixSocketDaemonClient};
pub use error::{IpcError, IpcResult};
pub use protocol::{Command, Request, Response};
pub use server::{CommandHandler, ShutdownFlag};
