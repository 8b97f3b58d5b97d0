//! Notification rule routes (admin only).

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::permissions::Permission;
use bosun_common::types::NotificationRule;
use bosun_engine::rules::{CreateRuleParams, RuleService, RuleTestResult, UpdateRuleParams};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notification-rules", get(list_rules).post(create_rule))
        .route(
            "/api/notification-rules/{id}",
            get(get_rule).patch(update_rule).delete(delete_rule),
        )
        .route("/api/notification-rules/{id}/test", post(test_rule))
}

#[derive(Debug, Deserialize)]
pub struct TestRuleRequest {
    /// Sample event payload to evaluate the rule against.
    pub payload: serde_json::Value,
}

/// POST /api/notification-rules — Create a rule.
async fn create_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<CreateRuleParams>,
) -> Result<Json<NotificationRule>, AppError> {
    auth.actor().require(Permission::ManageRules)?;
    let rule = RuleService::create(&state.pool, auth.tenant_id, auth.user_id, &params).await?;
    tracing::info!(rule_id = %rule.id, event_type = %rule.event_type, "Rule created");
    Ok(Json(rule))
}

/// GET /api/notification-rules — All rules of the tenant.
async fn list_rules(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<NotificationRule>>, AppError> {
    auth.actor().require(Permission::ManageRules)?;
    let rules = RuleService::list(&state.pool, auth.tenant_id).await?;
    Ok(Json(rules))
}

async fn get_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationRule>, AppError> {
    auth.actor().require(Permission::ManageRules)?;
    let rule = RuleService::get(&state.pool, auth.tenant_id, id).await?;
    Ok(Json(rule))
}

/// PATCH /api/notification-rules/{id} — Update a rule and reset its trigger history.
async fn update_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateRuleParams>,
) -> Result<Json<NotificationRule>, AppError> {
    auth.actor().require(Permission::ManageRules)?;
    let rule = RuleService::update(&state.pool, auth.tenant_id, id, &params).await?;
    let mut redis = state.redis.clone();
    state.processor.reset_rule(rule.id, &state.pool, &mut redis).await;
    Ok(Json(rule))
}

/// DELETE /api/notification-rules/{id}
async fn delete_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.actor().require(Permission::ManageRules)?;
    if !RuleService::delete(&state.pool, auth.tenant_id, id).await? {
        return Err(AppError::NotFound(format!("Rule {} not found", id)));
    }
    let mut redis = state.redis.clone();
    state.processor.reset_rule(id, &state.pool, &mut redis).await;
    Ok(Json(json!({"deleted": true})))
}

/// POST /api/notification-rules/{id}/test — Dry run against a sample payload.
/// Nothing is dispatched and no cadence or dedupe state is touched.
async fn test_rule(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<TestRuleRequest>,
) -> Result<Json<RuleTestResult>, AppError> {
    auth.actor().require(Permission::ManageRules)?;
    let rule = RuleService::get(&state.pool, auth.tenant_id, id).await?;
    Ok(Json(RuleService::test(&rule, &req.payload)))
}
