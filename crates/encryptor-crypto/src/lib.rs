//! Encryptor Crypto - PSK vault, password hashing, and session tokens.
//!
//! This crate provides:
//! - AES-256-GCM wrap/unwrap of pre-shared keys at rest ([`psk`])
//! - Argon2id password hashing and complexity rules ([`password`])
//! - HMAC-SHA-256 signed access/refresh tokens ([`token`])
//!
//! # Security Philosophy
//!
//! No decrypted PSK or plaintext password ever gets a `Display`/`Debug`
//! impl that would let it leak through a log line or an error message.
//!
//! # Example
//!
//! ```
//! use encryptor_crypto::psk::PskVault;
//!
//! let vault = PskVault::parse_key("00".repeat(32).as_str()).unwrap();
//! let wrapped = vault.encrypt(b"s3cr3t-psk").unwrap();
//! let recovered = vault.decrypt(&wrapped.ciphertext, &wrapped.nonce).unwrap();
//! assert_eq!(recovered, b"s3cr3t-psk");
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod password;
pub mod psk;
pub mod token;

pub use error::{CryptoError, CryptoResult};
