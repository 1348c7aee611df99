//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The configured PSK encryption key was not valid hex or base64, or
    /// did not decode to exactly 32 bytes.
    #[error("invalid PSK encryption key: {0}")]
    InvalidKeyEncoding(String),

    /// AES-GCM authentication failed during decryption (tampered
    /// ciphertext, wrong nonce, or wrong key). Never includes any
    /// plaintext or ciphertext material.
    #[error("PSK decryption failed: authentication tag mismatch")]
    DecryptionFailed,

    /// A nonce of unexpected length was supplied to `decrypt`.
    #[error("invalid nonce length: expected 12 bytes, got {0}")]
    InvalidNonceLength(usize),

    /// Argon2id hashing failed (should not occur at library defaults; kept
    /// typed rather than unwrapped so callers get a structured error).
    #[error("password hashing failed: {0}")]
    HashingFailed(String),

    /// A stored password hash was not in the expected Argon2 hash-string format.
    #[error("malformed password hash")]
    MalformedHash,

    /// Token signing or verification failed at the HMAC layer.
    #[error("token signature invalid")]
    InvalidTokenSignature,

    /// A token was syntactically malformed (wrong segment count, bad base64, bad JSON).
    #[error("malformed token")]
    MalformedToken,

    /// A token's `exp` claim was in the past.
    #[error("token expired")]
    TokenExpired,

    /// A token's `type` claim did not match what the caller expected.
    #[error("token type mismatch")]
    TokenTypeMismatch,
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
