//! HMAC-SHA-256 signed access and refresh tokens.
//!
//! Tokens are `base64(payload).base64(signature)`, where `payload` is the
//! compact JSON encoding of [`Claims`]. There is no external JWT library
//! dependency: the format is deliberately minimal since this service issues
//! and verifies its own tokens and never interops with a third party.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{CryptoError, CryptoResult};

type HmacSha256 = Hmac<Sha256>;

/// Which kind of token this is, carried in the `type` claim so an access
/// token can never be replayed where a refresh token is expected, or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived token authorizing API requests.
    Access,
    /// Long-lived token authorizing the issuance of a new access token.
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: i64,
    iat: i64,
    exp: i64,
    #[serde(rename = "type")]
    token_type: TokenType,
}

/// Signs and verifies access/refresh tokens under a single HMAC key.
pub struct TokenService {
    key: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// Build a token service from a raw signing key and the access/refresh
    /// token lifetimes, in seconds.
    pub fn new(key: impl Into<Vec<u8>>, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            key: key.into(),
            access_ttl: Duration::seconds(access_ttl_secs),
            refresh_ttl: Duration::seconds(refresh_ttl_secs),
        }
    }

    /// Issue a new access token for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidTokenSignature`] only if the signing
    /// key is rejected by the HMAC implementation (any key length is valid
    /// for HMAC-SHA-256, so this is not expected in practice).
    pub fn issue_access(&self, user_id: i64) -> CryptoResult<String> {
        self.issue(user_id, TokenType::Access, self.access_ttl)
    }

    /// Issue a new refresh token for `user_id`.
    ///
    /// # Errors
    ///
    /// See [`TokenService::issue_access`].
    pub fn issue_refresh(&self, user_id: i64) -> CryptoResult<String> {
        self.issue(user_id, TokenType::Refresh, self.refresh_ttl)
    }

    fn issue(&self, user_id: i64, token_type: TokenType, ttl: Duration) -> CryptoResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            token_type,
        };
        let payload =
            serde_json::to_vec(&claims).map_err(|e| CryptoError::HashingFailed(e.to_string()))?;
        let signature = self.sign(&payload)?;

        let mut token = String::new();
        token.push_str(&b64(&payload));
        token.push('.');
        token.push_str(&b64(&signature));
        Ok(token)
    }

    /// Verify a token's signature, type, and expiry, returning the subject
    /// user id on success.
    ///
    /// Signature mismatch, malformed structure, expiry, and type mismatch
    /// are all distinct [`CryptoError`] variants for logging purposes, but
    /// callers at the API boundary should treat all of them identically as
    /// "reject the request" (§11).
    ///
    /// # Errors
    ///
    /// See the individual [`CryptoError`] variants above.
    pub fn verify(&self, token: &str, expected_type: TokenType) -> CryptoResult<i64> {
        let (payload_b64, signature_b64) = token.split_once('.').ok_or(CryptoError::MalformedToken)?;
        let payload = unb64(payload_b64)?;
        let signature = unb64(signature_b64)?;

        let expected_signature = self.sign(&payload)?;
        if !constant_time_eq(&signature, &expected_signature) {
            return Err(CryptoError::InvalidTokenSignature);
        }

        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| CryptoError::MalformedToken)?;

        if claims.token_type != expected_type {
            return Err(CryptoError::TokenTypeMismatch);
        }
        if claims.exp < Utc::now().timestamp() {
            return Err(CryptoError::TokenExpired);
        }

        Ok(claims.sub)
    }

    fn sign(&self, payload: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| CryptoError::InvalidTokenSignature)?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Issued-at / expiry as UTC timestamps, exposed for logging and response bodies.
pub fn decode_expiry(token: &str) -> Option<DateTime<Utc>> {
    let (payload_b64, _) = token.split_once('.')?;
    let payload = unb64(payload_b64).ok()?;
    let claims: Claims = serde_json::from_slice(&payload).ok()?;
    DateTime::from_timestamp(claims.exp, 0)
}

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn unb64(s: &str) -> CryptoResult<Vec<u8>> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|_| CryptoError::MalformedToken)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.len() == b.len() && a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(b"test-signing-key".to_vec(), 900, 86400)
    }

    #[test]
    fn issue_then_verify_round_trips() {
        let svc = service();
        let token = svc.issue_access(42).unwrap();
        assert_eq!(svc.verify(&token, TokenType::Access).unwrap(), 42);
    }

    #[test]
    fn wrong_type_is_rejected() {
        let svc = service();
        let token = svc.issue_refresh(42).unwrap();
        assert!(matches!(
            svc.verify(&token, TokenType::Access),
            Err(CryptoError::TokenTypeMismatch)
        ));
    }

    #[test]
    fn tampered_payload_fails_signature_check() {
        let svc = service();
        let token = svc.issue_access(42).unwrap();
        let (payload, sig) = token.split_once('.').unwrap();
        let mut payload_bytes = unb64(payload).unwrap();
        *payload_bytes.last_mut().unwrap() ^= 0xFF;
        let tampered = format!("{}.{}", b64(&payload_bytes), sig);
        assert!(matches!(
            svc.verify(&tampered, TokenType::Access),
            Err(CryptoError::InvalidTokenSignature) | Err(CryptoError::MalformedToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = TokenService::new(b"test-signing-key".to_vec(), -1, 86400);
        let token = svc.issue_access(42).unwrap();
        assert!(matches!(
            svc.verify(&token, TokenType::Access),
            Err(CryptoError::TokenExpired)
        ));
    }

    #[test]
    fn malformed_token_is_rejected() {
        let svc = service();
        assert!(matches!(
            svc.verify("not-a-real-token", TokenType::Access),
            Err(CryptoError::MalformedToken)
        ));
    }

    #[test]
    fn different_keys_produce_incompatible_tokens() {
        let svc_a = TokenService::new(b"key-a".to_vec(), 900, 86400);
        let svc_b = TokenService::new(b"key-b".to_vec(), 900, 86400);
        let token = svc_a.issue_access(42).unwrap();
        assert!(matches!(
            svc_b.verify(&token, TokenType::Access),
            Err(CryptoError::InvalidTokenSignature)
        ));
    }
}
