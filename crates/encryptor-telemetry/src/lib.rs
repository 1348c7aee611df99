//! Structured logging setup for the encryptor-sim control plane.
//!
//! Both the API and daemon processes call [`setup_logging`] (or
//! [`setup_default_logging`]) before opening any socket, so that every later
//! failure — including a failure to bind — has somewhere to go (§10).
//!
//! Two renderings are supported, selected by configuration rather than
//! compiled in: a human-readable compact format for interactive use, and
//! JSON for collection by an external log shipper.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, setup_default_logging, setup_logging};
