//! Document registry routes.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::types::Document;
use bosun_fleet::documents::{
    CreateDocumentParams, DocumentFilter, DocumentService, UpdateDocumentParams,
};

use crate::middleware::auth::AuthUser;
use crate::routes::crew::ExpiryQuery;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/documents", get(list_documents).post(create_document))
        .route("/api/documents/expiring", get(expiring_documents))
        .route(
            "/api/documents/{id}",
            get(get_document).patch(update_document).delete(delete_document),
        )
}

/// POST /api/documents — Register a document.
async fn create_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<CreateDocumentParams>,
) -> Result<Json<Document>, AppError> {
    let document = DocumentService::create(&state.pool, &auth.actor(), &params).await?;
    Ok(Json(document))
}

/// GET /api/documents — Filter by `yacht_id` and `category`.
async fn list_documents(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<DocumentFilter>,
) -> Result<Json<Vec<Document>>, AppError> {
    let documents = DocumentService::list(&state.pool, &auth.actor(), &filter).await?;
    Ok(Json(documents))
}

async fn get_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, AppError> {
    let document = DocumentService::get(&state.pool, &auth.actor(), id).await?;
    Ok(Json(document))
}

/// PATCH /api/documents/{id} — Update metadata; a new `storage_key` bumps the version.
async fn update_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(params): Json<UpdateDocumentParams>,
) -> Result<Json<Document>, AppError> {
    let document = DocumentService::update(&state.pool, &auth.actor(), id, &params).await?;
    Ok(Json(document))
}

/// DELETE /api/documents/{id}
async fn delete_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if DocumentService::delete(&state.pool, &auth.actor(), id).await? {
        Ok(Json(json!({"deleted": true})))
    } else {
        Err(AppError::NotFound(format!("Document {} not found", id)))
    }
}

/// GET /api/documents/expiring?days= — Documents expiring within `days` (default 30).
async fn expiring_documents(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ExpiryQuery>,
) -> Result<Json<Vec<Document>>, AppError> {
    let documents = DocumentService::expiring(&state.pool, &auth.actor(), query.days).await?;
    Ok(Json(documents))
}
