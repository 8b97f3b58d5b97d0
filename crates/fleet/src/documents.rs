//! Document metadata. Uploading the bytes to object storage happens client-side;
//! this service tracks the key, version and expiry.

use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::permissions::{Actor, Permission};
use bosun_common::types::{Document, DocumentCategory};

use crate::crew::check_horizon;
use crate::yachts::YachtService;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDocumentParams {
    pub yacht_id: Option<Uuid>,
    pub title: String,
    pub category: DocumentCategory,
    pub storage_key: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub expires_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDocumentParams {
    pub yacht_id: Option<Uuid>,
    pub title: Option<String>,
    pub category: Option<DocumentCategory>,
    /// A key different from the stored one records a new version.
    pub storage_key: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub expires_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilter {
    pub yacht_id: Option<Uuid>,
    pub category: Option<DocumentCategory>,
}

/// Version after applying `new_key` to a document currently at `version` with `current_key`.
pub fn next_version(version: i32, current_key: &str, new_key: Option<&str>) -> i32 {
    match new_key {
        Some(key) if key != current_key => version + 1,
        _ => version,
    }
}

fn validate(title: &str, storage_key: &str, mime_type: &str, size_bytes: i64) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Document title must not be empty".to_string()));
    }
    if storage_key.trim().is_empty() {
        return Err(AppError::Validation("storage_key must not be empty".to_string()));
    }
    if !mime_type.contains('/') {
        return Err(AppError::Validation(format!("Invalid mime type '{}'", mime_type)));
    }
    if size_bytes < 0 {
        return Err(AppError::Validation("size_bytes must not be negative".to_string()));
    }
    Ok(())
}

pub struct DocumentService;

impl DocumentService {
    pub async fn create(
        pool: &PgPool,
        actor: &Actor,
        params: &CreateDocumentParams,
    ) -> Result<Document, AppError> {
        actor.require(Permission::ManageDocuments)?;
        validate(&params.title, &params.storage_key, &params.mime_type, params.size_bytes)?;
        if let Some(yacht_id) = params.yacht_id {
            YachtService::ensure_exists(pool, actor, yacht_id).await?;
        }

        let document: Document = sqlx::query_as(
            r#"
            INSERT INTO documents
                (id, tenant_id, yacht_id, title, category, storage_key, mime_type, size_bytes,
                 version, expires_on, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.tenant_id)
        .bind(params.yacht_id)
        .bind(params.title.trim())
        .bind(params.category.to_string())
        .bind(params.storage_key.trim())
        .bind(&params.mime_type)
        .bind(params.size_bytes)
        .bind(params.expires_on)
        .bind(actor.user_id)
        .fetch_one(pool)
        .await?;

        tracing::info!(document_id = %document.id, category = %document.category, "Document registered");
        Ok(document)
    }

    pub async fn list(
        pool: &PgPool,
        actor: &Actor,
        filter: &DocumentFilter,
    ) -> Result<Vec<Document>, AppError> {
        let documents = sqlx::query_as(
            r#"
            SELECT * FROM documents
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR yacht_id = $2)
              AND ($3::text IS NULL OR category = $3)
            ORDER BY title
            "#,
        )
        .bind(actor.tenant_id)
        .bind(filter.yacht_id)
        .bind(filter.category.map(|c| c.to_string()))
        .fetch_all(pool)
        .await?;
        Ok(documents)
    }

    pub async fn get(pool: &PgPool, actor: &Actor, document_id: Uuid) -> Result<Document, AppError> {
        sqlx::query_as("SELECT * FROM documents WHERE id = $1 AND tenant_id = $2")
            .bind(document_id)
            .bind(actor.tenant_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {} not found", document_id)))
    }

    pub async fn update(
        pool: &PgPool,
        actor: &Actor,
        document_id: Uuid,
        params: &UpdateDocumentParams,
    ) -> Result<Document, AppError> {
        actor.require(Permission::ManageDocuments)?;
        let existing = Self::get(pool, actor, document_id).await?;

        let version = next_version(
            existing.version,
            &existing.storage_key,
            params.storage_key.as_deref().map(str::trim),
        );
        let title = params.title.clone().unwrap_or(existing.title);
        let storage_key = params.storage_key.clone().unwrap_or(existing.storage_key);
        let mime_type = params.mime_type.clone().unwrap_or(existing.mime_type);
        let size_bytes = params.size_bytes.unwrap_or(existing.size_bytes);
        validate(&title, &storage_key, &mime_type, size_bytes)?;
        if let Some(yacht_id) = params.yacht_id {
            YachtService::ensure_exists(pool, actor, yacht_id).await?;
        }

        let document: Option<Document> = sqlx::query_as(
            r#"
            UPDATE documents
            SET yacht_id = $1, title = $2, category = $3, storage_key = $4, mime_type = $5,
                size_bytes = $6, version = $7, expires_on = $8, updated_at = NOW()
            WHERE id = $9 AND tenant_id = $10 AND version = $11
            RETURNING *
            "#,
        )
        .bind(params.yacht_id.or(existing.yacht_id))
        .bind(title.trim())
        .bind(params.category.unwrap_or(existing.category).to_string())
        .bind(storage_key.trim())
        .bind(&mime_type)
        .bind(size_bytes)
        .bind(version)
        .bind(params.expires_on.or(existing.expires_on))
        .bind(document_id)
        .bind(actor.tenant_id)
        .bind(existing.version)
        .fetch_optional(pool)
        .await?;

        let document = document.ok_or_else(|| {
            AppError::Conflict("Document was modified concurrently".to_string())
        })?;
        if document.version != existing.version {
            tracing::info!(document_id = %document.id, version = document.version, "New document version");
        }
        Ok(document)
    }

    pub async fn delete(pool: &PgPool, actor: &Actor, document_id: Uuid) -> Result<bool, AppError> {
        actor.require(Permission::ManageDocuments)?;
        let result = sqlx::query("DELETE FROM documents WHERE id = $1 AND tenant_id = $2")
            .bind(document_id)
            .bind(actor.tenant_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn expiring(pool: &PgPool, actor: &Actor, days: i64) -> Result<Vec<Document>, AppError> {
        check_horizon(days)?;
        Self::expiring_for_tenant(pool, actor.tenant_id, days).await
    }

    /// Documents expiring within `days`, including those already expired.
    pub async fn expiring_for_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        days: i64,
    ) -> Result<Vec<Document>, AppError> {
        let until = Utc::now().date_naive() + Duration::days(days);
        let documents = sqlx::query_as(
            r#"
            SELECT * FROM documents
            WHERE tenant_id = $1 AND expires_on IS NOT NULL AND expires_on <= $2
            ORDER BY expires_on, title
            "#,
        )
        .bind(tenant_id)
        .bind(until)
        .fetch_all(pool)
        .await?;
        Ok(documents)
    }
}
