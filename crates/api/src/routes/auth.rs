//! Authentication routes: registration, login, refresh-token rotation, logout.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::types::{Tenant, User};
use bosun_fleet::accounts::{AccountService, RegisterParams};

use crate::middleware::auth::{
    AuthUser, REFRESH_COOKIE, TokenKind, clear_refresh_cookie, decode_jwt, encode_access_token,
    encode_refresh_token, read_cookie, refresh_cookie,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response for a successful login, registration or refresh.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Access-token lifetime in seconds
    pub expires_in: u64,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub tenant: Tenant,
}

/// POST /api/auth/register — Create a tenant and its admin, then sign in.
async fn register(
    State(state): State<AppState>,
    Json(params): Json<RegisterParams>,
) -> Result<Response, AppError> {
    if !state.config.allow_registration {
        return Err(AppError::Forbidden("Registration is disabled".to_string()));
    }
    let (tenant, user) = AccountService::register(&state.pool, &params).await?;
    tracing::info!(tenant_id = %tenant.id, user_id = %user.id, "Tenant registered");
    start_session(&state, user).await
}

/// POST /api/auth/login — Check credentials, return an access token and set the refresh cookie.
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let user = AccountService::authenticate(&state.pool, &req.email, &req.password).await?;
    tracing::info!(user_id = %user.id, "User logged in");
    start_session(&state, user).await
}

/// POST /api/auth/refresh — Rotate the refresh cookie and issue a new access token.
async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let token = read_cookie(&headers, REFRESH_COOKIE)
        .ok_or_else(|| AppError::Auth("Missing refresh token".to_string()))?;
    let claims = decode_jwt(&token, &state.config.jwt_secret, TokenKind::Refresh)?;
    let jti = claims
        .jti
        .ok_or_else(|| AppError::Auth("Invalid refresh token".to_string()))?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Auth("Invalid user ID in token".to_string()))?;

    // Revoke-on-use: a token can be exchanged exactly once.
    let revoked: Option<(Uuid,)> = sqlx::query_as(
        r#"
        UPDATE refresh_tokens SET revoked_at = NOW()
        WHERE id = $1 AND user_id = $2 AND revoked_at IS NULL AND expires_at > NOW()
        RETURNING id
        "#,
    )
    .bind(jti)
    .bind(user_id)
    .fetch_optional(&state.pool)
    .await?;
    if revoked.is_none() {
        tracing::warn!(user_id = %user_id, jti = %jti, "Refresh token reuse or expiry");
        return Err(AppError::Auth("Refresh token is no longer valid".to_string()));
    }

    let user = AccountService::find_user(&state.pool, user_id)
        .await?
        .filter(|u| u.active)
        .ok_or_else(|| AppError::Auth("Account is disabled".to_string()))?;

    start_session(&state, user).await
}

/// POST /api/auth/logout — Revoke the refresh token and clear the cookie.
async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if let Some(token) = read_cookie(&headers, REFRESH_COOKIE)
        && let Ok(claims) = decode_jwt(&token, &state.config.jwt_secret, TokenKind::Refresh)
        && let Some(jti) = claims.jti
    {
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE id = $1 AND user_id = $2 AND revoked_at IS NULL",
        )
        .bind(jti)
        .bind(auth.user_id)
        .execute(&state.pool)
        .await?;
    }

    tracing::info!(user_id = %auth.user_id, "User logged out");

    Ok((
        [(SET_COOKIE, clear_refresh_cookie(state.config.cookie_secure))],
        Json(json!({"logged_out": true})),
    )
        .into_response())
}

/// GET /api/auth/me — The authenticated user and their tenant.
async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<MeResponse>, AppError> {
    let actor = auth.actor();
    let user = AccountService::get_user(&state.pool, &actor, auth.user_id).await?;
    let tenant = AccountService::get_tenant(&state.pool, &actor).await?;
    Ok(Json(MeResponse { user, tenant }))
}

/// Persist a refresh-token row and answer with both tokens.
async fn start_session(state: &AppState, user: User) -> Result<Response, AppError> {
    let config = &state.config;
    let jti = Uuid::new_v4();
    let refresh_ttl = Duration::days(config.refresh_expiry_days as i64);

    sqlx::query("INSERT INTO refresh_tokens (id, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(jti)
        .bind(user.id)
        .bind(Utc::now() + refresh_ttl)
        .execute(&state.pool)
        .await?;

    let access_token = encode_access_token(
        user.id,
        user.tenant_id,
        user.role,
        &config.jwt_secret,
        config.jwt_expiry_minutes,
    )?;
    let refresh_token = encode_refresh_token(
        user.id,
        user.tenant_id,
        user.role,
        jti,
        &config.jwt_secret,
        config.refresh_expiry_days,
    )?;

    let cookie = refresh_cookie(&refresh_token, refresh_ttl.num_seconds(), config.cookie_secure);
    let body = TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: config.jwt_expiry_minutes * 60,
        user,
    };

    Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}
