//! JWT authentication middleware and helpers.
//!
//! Access tokens travel in the `Authorization: Bearer <token>` header. Refresh
//! tokens live in the `bosun_refresh` HttpOnly cookie and are backed by a row in
//! `refresh_tokens` (the JWT id), so they can be rotated and revoked.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::permissions::Actor;
use bosun_common::types::UserRole;

use crate::state::AppState;

pub const REFRESH_COOKIE: &str = "bosun_refresh";
const REFRESH_COOKIE_PATH: &str = "/api/auth";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims stored in the token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: the user UUID
    pub sub: String,
    /// Tenant the user belongs to
    pub tid: Uuid,
    pub role: UserRole,
    pub kind: TokenKind,
    /// Refresh-token row id; unset on access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<Uuid>,
    /// Expiration time (UNIX timestamp)
    pub exp: i64,
    /// Issued at (UNIX timestamp)
    pub iat: i64,
}

/// Authenticated user extracted from the access token.
///
/// Use as an Axum extractor on protected routes:
/// ```ignore
/// async fn handler(auth: AuthUser) -> impl IntoResponse {
///     let actor = auth.actor();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: UserRole,
    pub claims: Claims,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor::new(self.tenant_id, self.user_id, self.role)
    }
}

/// Encode a short-lived access token.
pub fn encode_access_token(
    user_id: Uuid,
    tenant_id: Uuid,
    role: UserRole,
    secret: &str,
    expiry_minutes: u64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        tid: tenant_id,
        role,
        kind: TokenKind::Access,
        jti: None,
        exp: (now + Duration::minutes(expiry_minutes as i64)).timestamp(),
        iat: now.timestamp(),
    };
    sign(&claims, secret)
}

/// Encode a refresh token bound to the `refresh_tokens` row `jti`.
pub fn encode_refresh_token(
    user_id: Uuid,
    tenant_id: Uuid,
    role: UserRole,
    jti: Uuid,
    secret: &str,
    expiry_days: u64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        tid: tenant_id,
        role,
        kind: TokenKind::Refresh,
        jti: Some(jti),
        exp: (now + Duration::days(expiry_days as i64)).timestamp(),
        iat: now.timestamp(),
    };
    sign(&claims, secret)
}

fn sign(claims: &Claims, secret: &str) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Auth(format!("Failed to encode JWT: {}", e)))
}

/// Decode and validate a JWT token of the expected kind.
pub fn decode_jwt(token: &str, secret: &str, expected: TokenKind) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Auth(format!("Invalid token: {}", e)))?;

    if token_data.claims.kind != expected {
        return Err(AppError::Auth("Wrong token type".to_string()));
    }
    Ok(token_data.claims)
}

/// `Set-Cookie` value carrying a refresh token.
pub fn refresh_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path={}; Max-Age={}",
        REFRESH_COOKIE, token, REFRESH_COOKIE_PATH, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the refresh cookie.
pub fn clear_refresh_cookie(secure: bool) -> String {
    refresh_cookie("", 0, secure)
}

/// Read a cookie value from the request headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Axum `FromRequestParts` implementation for `AuthUser`.
///
/// Extracts and validates the access token from the `Authorization: Bearer <token>` header.
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let secret = state.config.jwt_secret.clone();

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        async move {
            let token = auth_header
                .as_deref()
                .and_then(|auth| auth.strip_prefix("Bearer "))
                .ok_or_else(|| {
                    AppError::Auth(
                        "Missing or invalid Authorization header. Use 'Bearer <JWT>'".to_string(),
                    )
                })?;

            let claims = decode_jwt(token, &secret, TokenKind::Access)?;
            let user_id = Uuid::parse_str(&claims.sub)
                .map_err(|_| AppError::Auth("Invalid user ID in token".to_string()))?;

            Ok(AuthUser {
                user_id,
                tenant_id: claims.tid,
                role: claims.role,
                claims,
            })
        }
    }
}
