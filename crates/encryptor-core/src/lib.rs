//! Domain types and validation for the encryptor-sim control plane.
//!
//! This crate provides:
//! - The persisted entity types (`User`, `Interface`, `Peer`, `Route`, `IsolationValidationResult`)
//! - Pure validation and normalisation logic shared by the API and daemon processes
//!   (CIDR normalisation, strongSwan name sanitisation, peer/interface field rules)
//!
//! Nothing here talks to a database, a socket, or the kernel — those live in
//! `encryptor-storage`, `encryptor-ipc`, and `encryptor-daemon` respectively.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod cidr;
pub mod entities;
pub mod error;
pub mod sanitize;
pub mod validate;

pub use entities::{
    Interface, IsolationCheck, IsolationValidationResult, OperationalStatus, Peer, Route, User,
};
pub use error::{ValidationError, ValidationResult};
