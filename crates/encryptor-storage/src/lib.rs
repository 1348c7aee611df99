//! The Config Store: embedded, transactional persistence for interfaces,
//! peers, routes, users, and isolation self-test results.
//!
//! A single [`ConfigStore`] handle is built once at process startup (seeding
//! the database on first run) and cloned into every component that needs
//! it — request handlers, pollers, the daemon's command dispatcher.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

mod error;
mod interfaces;
mod isolation;
mod peers;
mod routes;
mod store;
mod users;

pub use error::{StorageError, StorageResult};
pub use peers::{NewPeer, PeerUpdate};
pub use store::ConfigStore;
