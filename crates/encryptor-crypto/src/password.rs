//! Argon2id password hashing, complexity rules, and login-time rehash.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::{CryptoError, CryptoResult};

/// Minimum password length accepted by [`check_complexity`].
pub const MIN_LENGTH: usize = 8;

/// Hash `password` with Argon2id using library-default parameters and a
/// freshly generated random salt.
///
/// # Errors
///
/// Returns [`CryptoError::HashingFailed`] if Argon2 itself reports a
/// failure (not expected at default parameters).
pub fn hash_password(password: &str) -> CryptoResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CryptoError::HashingFailed(e.to_string()))
}

/// Verify `password` against a stored Argon2 hash string.
///
/// Returns `Ok(true)` on a match, `Ok(false)` on a clean mismatch.
///
/// # Errors
///
/// Returns [`CryptoError::MalformedHash`] if `stored_hash` is not a valid
/// Argon2 hash string.
pub fn verify_password(password: &str, stored_hash: &str) -> CryptoResult<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| CryptoError::MalformedHash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Whether a stored hash was produced with parameters weaker than the
/// library's current defaults, and should be rehashed on next successful
/// login.
///
/// # Errors
///
/// Returns [`CryptoError::MalformedHash`] if `stored_hash` is not a valid
/// Argon2 hash string.
pub fn needs_rehash(stored_hash: &str) -> CryptoResult<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| CryptoError::MalformedHash)?;
    let stored_params = argon2::Params::try_from(&parsed).map_err(|_| CryptoError::MalformedHash)?;
    let current_params = argon2::Params::default();
    Ok(stored_params.m_cost() < current_params.m_cost()
        || stored_params.t_cost() < current_params.t_cost())
}

/// Complexity rule: minimum length only.
///
/// # Errors
///
/// Returns a human-readable reason string on the first rule violated.
pub fn check_complexity(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_LENGTH {
        return Err(format!("password must be at least {MIN_LENGTH} characters"));
    }
    Ok(())
}

/// Reject reusing the current password as the new one.
///
/// # Errors
///
/// Returns `Err("new password must differ from the current password")` if
/// `new_password` verifies against `current_hash`.
pub fn reject_reuse(new_password: &str, current_hash: &str) -> CryptoResult<Result<(), String>> {
    if verify_password(new_password, current_hash)? {
        return Ok(Err(
            "new password must differ from the current password".to_string(),
        ));
    }
    Ok(Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let hash = hash_password("correct-horse-9").unwrap();
        assert!(verify_password("correct-horse-9", &hash).unwrap());
        assert!(!verify_password("wrong-password-9", &hash).unwrap());
    }

    #[test]
    fn each_hash_uses_a_distinct_salt() {
        let a = hash_password("correct-horse-9").unwrap();
        let b = hash_password("correct-horse-9").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_is_rejected() {
        assert!(verify_password("anything", "not-a-hash").is_err());
        assert!(needs_rehash("not-a-hash").is_err());
    }

    #[test]
    fn a_hash_produced_with_current_defaults_does_not_need_rehash() {
        let hash = hash_password("correct-horse-9").unwrap();
        assert!(!needs_rehash(&hash).unwrap());
    }

    #[test]
    fn complexity_rules_enforced() {
        assert!(check_complexity("short1").is_err());
        assert!(check_complexity("alllettersnope").is_ok());
        assert!(check_complexity("123456789").is_ok());
        assert!(check_complexity("goodpass1").is_ok());
    }

    #[test]
    fn reuse_of_current_password_is_rejected() {
        let hash = hash_password("currentPass1").unwrap();
        assert!(reject_reuse("currentPass1", &hash).unwrap().is_err());
        assert!(reject_reuse("differentPass1", &hash).unwrap().is_ok());
    }
}
