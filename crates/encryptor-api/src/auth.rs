//! Login, refresh, logout, change-password, and profile endpoints, plus the
//! bearer-token extractor every other protected handler depends on (§4.3,
//! §6, §7).

use std::sync::Arc;

use axum::extract::{FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::{Json, async_trait};
use chrono::{DateTime, Utc};
use encryptor_crypto::password;
use encryptor_crypto::token::TokenType;
use serde::{Deserialize, Serialize};

use crate::envelope::{Envelope, Meta};
use crate::error::ApiError;
use crate::state::AppState;

/// Extracted from a validated `Authorization: Bearer <access-token>` header.
/// Any handler taking this parameter is implicitly authenticated.
pub struct AuthUser {
    pub user_id: i64,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<AppState>: axum::extract::FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let instance = parts.uri.path().to_string();
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized(instance.clone()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized(instance.clone()))?;
        let user_id = app_state
            .tokens
            .verify(token, TokenType::Access)
            .map_err(|_| ApiError::unauthorized(instance))?;
        Ok(AuthUser { user_id })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// `POST /api/v1/auth/login`.
///
/// Login failure is always the same generic 401 regardless of whether the
/// username exists or the password was wrong, to avoid user enumeration
/// (§7).
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Envelope<TokenPair>, ApiError> {
    const INSTANCE: &str = "/api/v1/auth/login";

    let user = state
        .store
        .find_user_by_username(&body.username)
        .await
        .map_err(|e| ApiError::from_storage(e, INSTANCE))?
        .ok_or_else(|| ApiError::unauthorized(INSTANCE))?;

    let verified = password::verify_password(&body.password, &user.password_hash)
        .map_err(|e| ApiError::internal(e, INSTANCE))?;
    if !verified {
        return Err(ApiError::unauthorized(INSTANCE));
    }

    if password::needs_rehash(&user.password_hash).unwrap_or(false) {
        if let Ok(new_hash) = password::hash_password(&body.password) {
            if let Err(e) = state.store.rehash_password(user.user_id, &new_hash).await {
                tracing::warn!(user_id = user.user_id, error = %e, "failed to persist rehashed password");
            }
        }
    }

    if let Err(e) = state.store.record_login(user.user_id).await {
        tracing::warn!(user_id = user.user_id, error = %e, "failed to record login timestamp");
    }

    let access_token = state.tokens.issue_access(user.user_id).map_err(|e| ApiError::internal(e, INSTANCE))?;
    let refresh_token = state.tokens.issue_refresh(user.user_id).map_err(|e| ApiError::internal(e, INSTANCE))?;

    Ok(Envelope::ok(TokenPair {
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: state.settings.access_token_ttl_secs,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenOnly {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// `POST /api/v1/auth/refresh`.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Envelope<AccessTokenOnly>, ApiError> {
    const INSTANCE: &str = "/api/v1/auth/refresh";

    let user_id = state
        .tokens
        .verify(&body.refresh_token, TokenType::Refresh)
        .map_err(|_| ApiError::unauthorized(INSTANCE))?;

    let access_token = state.tokens.issue_access(user_id).map_err(|e| ApiError::internal(e, INSTANCE))?;

    Ok(Envelope::ok(AccessTokenOnly {
        access_token,
        token_type: "Bearer",
        expires_in: state.settings.access_token_ttl_secs,
    }))
}

/// `POST /api/v1/auth/logout`. Ceremonial: the client drops its tokens
/// client-side; there is no server-side session to invalidate.
pub async fn logout(_user: AuthUser) -> Envelope<serde_json::Value> {
    Envelope::ok(serde_json::json!({}))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// `POST /api/v1/auth/change-password`.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Envelope<serde_json::Value>, ApiError> {
    const INSTANCE: &str = "/api/v1/auth/change-password";

    let record = state
        .store
        .get_user(user.user_id)
        .await
        .map_err(|e| ApiError::from_storage(e, INSTANCE))?;

    let verified = password::verify_password(&body.current_password, &record.password_hash)
        .map_err(|e| ApiError::internal(e, INSTANCE))?;
    if !verified {
        return Err(ApiError::unauthorized(INSTANCE));
    }

    if let Err(reason) = password::check_complexity(&body.new_password) {
        return Err(ApiError::unprocessable(reason, INSTANCE));
    }
    match password::reject_reuse(&body.new_password, &record.password_hash) {
        Ok(Err(reason)) => return Err(ApiError::unprocessable(reason, INSTANCE)),
        Err(e) => return Err(ApiError::internal(e, INSTANCE)),
        Ok(Ok(())) => {}
    }

    let new_hash = password::hash_password(&body.new_password).map_err(|e| ApiError::internal(e, INSTANCE))?;
    state
        .store
        .update_password(user.user_id, &new_hash)
        .await
        .map_err(|e| ApiError::from_storage(e, INSTANCE))?;

    Ok(Envelope::ok(serde_json::json!({})))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: i64,
    pub username: String,
    pub require_password_change: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// `GET /api/v1/auth/me`. The password hash never leaves this boundary.
pub async fn me(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Envelope<UserProfile>, ApiError> {
    const INSTANCE: &str = "/api/v1/auth/me";
    let record = state
        .store
        .get_user(user.user_id)
        .await
        .map_err(|e| ApiError::from_storage(e, INSTANCE))?;

    Ok(Envelope::ok(UserProfile {
        user_id: record.user_id,
        username: record.username,
        require_password_change: record.require_password_change,
        created_at: record.created_at,
        last_login: record.last_login,
    }))
}
