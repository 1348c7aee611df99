//! AES-256-GCM wrap/unwrap of pre-shared keys at rest.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use crate::error::{CryptoError, CryptoResult};

/// Nonce size for AES-GCM, bytes.
pub const NONCE_SIZE: usize = 12;
/// Key size for AES-256, bytes.
pub const KEY_SIZE: usize = 32;

/// The result of wrapping a plaintext PSK: ciphertext and the nonce used.
///
/// Both fields are stored separately in the database (`pskEncrypted`,
/// `pskNonce`) per the data model.
#[derive(Clone)]
pub struct WrappedPsk {
    /// AES-GCM ciphertext, including the authentication tag.
    pub ciphertext: Vec<u8>,
    /// The 12-byte nonce used for this encryption.
    pub nonce: Vec<u8>,
}

/// Holds the process-wide PSK encryption key and performs wrap/unwrap.
///
/// The key is loaded once at process start (§9, "Global configuration") and
/// never logged: this type deliberately has no `Debug`/`Display` impl.
pub struct PskVault {
    key: Key<Aes256Gcm>,
}

impl PskVault {
    /// Load the vault key from its serialised configuration form.
    ///
    /// Accepts hex first (when the decoded length is exactly 32 bytes),
    /// falling back to base64; any other encoding, or a decoded length
    /// other than 32 bytes, fails.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyEncoding`] if the string is neither
    /// valid 32-byte hex nor valid 32-byte base64.
    pub fn parse_key(serialized: &str) -> CryptoResult<Self> {
        let bytes = if looks_like_hex(serialized) {
            match hex::decode(serialized) {
                Ok(decoded) if decoded.len() == KEY_SIZE => decoded,
                _ => decode_base64(serialized)?,
            }
        } else {
            decode_base64(serialized)?
        };

        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyEncoding(format!(
                "expected {KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Self {
            key: *Key::<Aes256Gcm>::from_slice(&bytes),
        })
    }

    /// Encrypt `plaintext` under a freshly generated random nonce.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::HashingFailed`]-adjacent encryption failure only
    /// in the (practically unreachable) case the underlying cipher rejects
    /// the input; callers can treat this as infallible in practice.
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<WrappedPsk> {
        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CryptoError::DecryptionFailed)?;
        Ok(WrappedPsk {
            ciphertext,
            nonce: nonce.to_vec(),
        })
    }

    /// Decrypt a previously wrapped PSK.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidNonceLength`] if `nonce` is not 12
    /// bytes, or [`CryptoError::DecryptionFailed`] if the authentication tag
    /// does not verify.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &[u8]) -> CryptoResult<Vec<u8>> {
        if nonce.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidNonceLength(nonce.len()));
        }
        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Nonce::from_slice(nonce);
        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

fn looks_like_hex(s: &str) -> bool {
    s.len() % 2 == 0 && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn decode_base64(s: &str) -> CryptoResult<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vault() -> PskVault {
        PskVault::parse_key(&"11".repeat(32)).unwrap()
    }

    #[test]
    fn accepts_hex_key() {
        assert!(PskVault::parse_key(&"00".repeat(32)).is_ok());
    }

    #[test]
    fn accepts_base64_key() {
        use base64::Engine;
        let key = base64::engine::general_purpose::STANDARD.encode([7u8; 32]);
        assert!(PskVault::parse_key(&key).is_ok());
    }

    #[test]
    fn rejects_wrong_length_key() {
        assert!(PskVault::parse_key(&"00".repeat(16)).is_err());
        assert!(PskVault::parse_key("not-hex-or-base64!!").is_err());
    }

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let vault = test_vault();
        let wrapped = vault.encrypt(b"my-pre-shared-key").unwrap();
        let recovered = vault.decrypt(&wrapped.ciphertext, &wrapped.nonce).unwrap();
        assert_eq!(recovered, b"my-pre-shared-key");
    }

    #[test]
    fn each_encryption_uses_a_fresh_nonce() {
        let vault = test_vault();
        let a = vault.encrypt(b"same-plaintext").unwrap();
        let b = vault.encrypt(b"same-plaintext").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let vault = test_vault();
        let mut wrapped = vault.encrypt(b"my-pre-shared-key").unwrap();
        let last = wrapped.ciphertext.len() - 1;
        wrapped.ciphertext[last] ^= 0xFF;
        assert!(vault.decrypt(&wrapped.ciphertext, &wrapped.nonce).is_err());
    }

    #[test]
    fn wrong_nonce_length_is_rejected() {
        let vault = test_vault();
        let wrapped = vault.encrypt(b"data").unwrap();
        assert!(matches!(
            vault.decrypt(&wrapped.ciphertext, &[0u8; 8]),
            Err(CryptoError::InvalidNonceLength(8))
        ));
    }
}
