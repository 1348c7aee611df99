//! Process configuration for the encryptor-sim control plane.
//!
//! A single deployment target — one physical appliance — means a thin
//! environment-variable layer is enough; there is no multi-file,
//! multi-precedence loader here the way a developer workstation tool would
//! need one. See [`Settings::from_env`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

/// Configuration error types.
pub mod error;
/// Settings struct and environment resolution.
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use settings::Settings;
