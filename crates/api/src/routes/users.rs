//! User and tenant administration routes.

use axum::extract::{Path, State};
use axum::routing::{get, patch};
use axum::{Json, Router};
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::types::{Tenant, User};
use bosun_fleet::accounts::{AccountService, CreateUserParams, UpdateTenantParams, UpdateUserParams};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/{id}", patch(update_user))
        .route("/api/tenant", get(get_tenant).patch(update_tenant))
}

/// GET /api/users — Users of the caller's tenant.
async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<User>>, AppError> {
    let users = AccountService::list_users(&state.pool, &auth.actor()).await?;
    Ok(Json(users))
}

/// POST /api/users — Add a user to the tenant.
async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<CreateUserParams>,
) -> Result<Json<User>, AppError> {
    let user = AccountService::create_user(&state.pool, &auth.actor(), &params).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "User created");
    Ok(Json(user))
}

/// PATCH /api/users/{id} — Change role, display name or active flag.
async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateUserParams>,
) -> Result<Json<User>, AppError> {
    let user = AccountService::update_user(&state.pool, &auth.actor(), id, &params).await?;
    Ok(Json(user))
}

async fn get_tenant(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Tenant>, AppError> {
    let tenant = AccountService::get_tenant(&state.pool, &auth.actor()).await?;
    Ok(Json(tenant))
}

/// PATCH /api/tenant — Rename the tenant or set its webhook URL.
async fn update_tenant(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<UpdateTenantParams>,
) -> Result<Json<Tenant>, AppError> {
    let tenant = AccountService::update_tenant(&state.pool, &auth.actor(), &params).await?;
    Ok(Json(tenant))
}
