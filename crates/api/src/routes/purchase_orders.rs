//! Purchase order routes. Every status transition raises a domain event.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::types::PurchaseOrder;
use bosun_fleet::events;
use bosun_fleet::purchase_orders::{
    CreatePurchaseOrderParams, DecisionParams, PurchaseOrderFilter, PurchaseOrderService,
    PurchaseOrderView, UpdatePurchaseOrderParams,
};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/purchase-orders", get(list_orders).post(create_order))
        .route(
            "/api/purchase-orders/{id}",
            get(get_order).patch(update_order).delete(delete_order),
        )
        .route("/api/purchase-orders/{id}/submit", post(submit_order))
        .route("/api/purchase-orders/{id}/approve", post(approve_order))
        .route("/api/purchase-orders/{id}/reject", post(reject_order))
        .route("/api/purchase-orders/{id}/close", post(close_order))
        .route("/api/purchase-orders/{id}/reopen", post(reopen_order))
}

/// POST /api/purchase-orders — Create a draft order with its lines.
async fn create_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<CreatePurchaseOrderParams>,
) -> Result<Json<PurchaseOrderView>, AppError> {
    let order = PurchaseOrderService::create(&state.pool, &auth.actor(), &params).await?;
    Ok(Json(order))
}

/// GET /api/purchase-orders — Filter by `yacht_id` and `status`.
async fn list_orders(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<PurchaseOrderFilter>,
) -> Result<Json<Vec<PurchaseOrder>>, AppError> {
    let orders = PurchaseOrderService::list(&state.pool, &auth.actor(), &filter).await?;
    Ok(Json(orders))
}

async fn get_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PurchaseOrderView>, AppError> {
    let order = PurchaseOrderService::get(&state.pool, &auth.actor(), id).await?;
    Ok(Json(order))
}

/// PATCH /api/purchase-orders/{id} — Edit a draft order.
async fn update_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdatePurchaseOrderParams>,
) -> Result<Json<PurchaseOrderView>, AppError> {
    let order = PurchaseOrderService::update(&state.pool, &auth.actor(), id, &params).await?;
    Ok(Json(order))
}

/// DELETE /api/purchase-orders/{id} — Delete a draft order.
async fn delete_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if PurchaseOrderService::delete(&state.pool, &auth.actor(), id).await? {
        Ok(Json(json!({"deleted": true})))
    } else {
        Err(AppError::NotFound(format!("Purchase order {} not found", id)))
    }
}

/// POST /api/purchase-orders/{id}/submit
async fn submit_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PurchaseOrder>, AppError> {
    let order = PurchaseOrderService::submit(&state.pool, &auth.actor(), id).await?;
    Ok(Json(transitioned(&state, &auth, order).await))
}

/// POST /api/purchase-orders/{id}/approve — Body: `{ "note": … }` (optional note).
async fn approve_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<DecisionParams>,
) -> Result<Json<PurchaseOrder>, AppError> {
    let order = PurchaseOrderService::approve(&state.pool, &auth.actor(), id, &params).await?;
    Ok(Json(transitioned(&state, &auth, order).await))
}

/// POST /api/purchase-orders/{id}/reject
async fn reject_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<DecisionParams>,
) -> Result<Json<PurchaseOrder>, AppError> {
    let order = PurchaseOrderService::reject(&state.pool, &auth.actor(), id, &params).await?;
    Ok(Json(transitioned(&state, &auth, order).await))
}

/// POST /api/purchase-orders/{id}/close
async fn close_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PurchaseOrder>, AppError> {
    let order = PurchaseOrderService::close(&state.pool, &auth.actor(), id).await?;
    Ok(Json(transitioned(&state, &auth, order).await))
}

/// POST /api/purchase-orders/{id}/reopen — Return a rejected order to draft.
async fn reopen_order(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PurchaseOrder>, AppError> {
    let order = PurchaseOrderService::reopen(&state.pool, &auth.actor(), id).await?;
    Ok(Json(transitioned(&state, &auth, order).await))
}

async fn transitioned(state: &AppState, auth: &AuthUser, order: PurchaseOrder) -> PurchaseOrder {
    tracing::info!(
        purchase_order_id = %order.id,
        status = %order.status,
        "Purchase order transitioned"
    );
    if let Some(event) = events::purchase_order_transitioned(&order, auth.user_id) {
        state.emit(event).await;
    }
    order
}
