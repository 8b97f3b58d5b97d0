//! Logbook entries and their review workflow.
//!
//! Entries start as drafts owned by their author. Submitting hands them to a
//! reviewer, who approves or rejects. Editing a rejected entry returns it to draft.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::permissions::{Actor, Permission};
use bosun_common::types::{ApprovalStatus, LogbookEntry, LogbookKind};

use crate::yachts::YachtService;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLogbookParams {
    pub yacht_id: Uuid,
    pub kind: LogbookKind,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub occurred_at: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLogbookParams {
    pub kind: Option<LogbookKind>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogbookFilter {
    pub yacht_id: Option<Uuid>,
    pub status: Option<ApprovalStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewParams {
    pub decision: ReviewDecision,
    pub note: Option<String>,
}

pub struct LogbookService;

impl LogbookService {
    pub async fn create_draft(
        pool: &PgPool,
        actor: &Actor,
        params: &CreateLogbookParams,
    ) -> Result<LogbookEntry, AppError> {
        actor.require(Permission::WriteLogbook)?;
        validate(&params.title, params.latitude, params.longitude)?;
        YachtService::ensure_exists(pool, actor, params.yacht_id).await?;

        let entry: LogbookEntry = sqlx::query_as(
            r#"
            INSERT INTO logbook_entries
                (id, tenant_id, yacht_id, author_id, kind, title, body, occurred_at, latitude, longitude, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'draft')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.tenant_id)
        .bind(params.yacht_id)
        .bind(actor.user_id)
        .bind(params.kind.to_string())
        .bind(params.title.trim())
        .bind(&params.body)
        .bind(params.occurred_at)
        .bind(params.latitude)
        .bind(params.longitude)
        .fetch_one(pool)
        .await?;

        tracing::info!(entry_id = %entry.id, yacht_id = %entry.yacht_id, kind = %entry.kind, "Logbook draft created");
        Ok(entry)
    }

    pub async fn list(
        pool: &PgPool,
        actor: &Actor,
        filter: &LogbookFilter,
    ) -> Result<Vec<LogbookEntry>, AppError> {
        let entries = sqlx::query_as(
            r#"
            SELECT * FROM logbook_entries
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR yacht_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY occurred_at DESC
            "#,
        )
        .bind(actor.tenant_id)
        .bind(filter.yacht_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(pool)
        .await?;
        Ok(entries)
    }

    pub async fn get(pool: &PgPool, actor: &Actor, entry_id: Uuid) -> Result<LogbookEntry, AppError> {
        sqlx::query_as("SELECT * FROM logbook_entries WHERE id = $1 AND tenant_id = $2")
            .bind(entry_id)
            .bind(actor.tenant_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Logbook entry {} not found", entry_id)))
    }

    pub async fn update(
        pool: &PgPool,
        actor: &Actor,
        entry_id: Uuid,
        params: &UpdateLogbookParams,
    ) -> Result<LogbookEntry, AppError> {
        let existing = Self::get(pool, actor, entry_id).await?;
        ensure_author(&existing, actor)?;
        // Editing a rejected entry reopens it as a draft.
        if existing.status != ApprovalStatus::Draft {
            ensure_transition(existing.status, ApprovalStatus::Draft)?;
        }

        let title = params.title.clone().unwrap_or(existing.title);
        let latitude = params.latitude.or(existing.latitude);
        let longitude = params.longitude.or(existing.longitude);
        validate(&title, latitude, longitude)?;

        let entry: LogbookEntry = sqlx::query_as(
            r#"
            UPDATE logbook_entries
            SET kind = $1, title = $2, body = $3, occurred_at = $4, latitude = $5, longitude = $6,
                status = 'draft', reviewed_by = NULL, reviewed_at = NULL, updated_at = NOW()
            WHERE id = $7 AND tenant_id = $8
            RETURNING *
            "#,
        )
        .bind(params.kind.unwrap_or(existing.kind).to_string())
        .bind(title.trim())
        .bind(params.body.clone().unwrap_or(existing.body))
        .bind(params.occurred_at.unwrap_or(existing.occurred_at))
        .bind(latitude)
        .bind(longitude)
        .bind(entry_id)
        .bind(actor.tenant_id)
        .fetch_one(pool)
        .await?;

        Ok(entry)
    }

    pub async fn delete(pool: &PgPool, actor: &Actor, entry_id: Uuid) -> Result<bool, AppError> {
        let existing = Self::get(pool, actor, entry_id).await?;
        ensure_author(&existing, actor)?;
        if existing.status != ApprovalStatus::Draft {
            return Err(AppError::Conflict(
                "Only draft logbook entries can be deleted".to_string(),
            ));
        }

        let result = sqlx::query(
            "DELETE FROM logbook_entries WHERE id = $1 AND tenant_id = $2 AND status = 'draft'",
        )
        .bind(entry_id)
        .bind(actor.tenant_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Hand a draft to reviewers. Only the author may submit.
    pub async fn submit(pool: &PgPool, actor: &Actor, entry_id: Uuid) -> Result<LogbookEntry, AppError> {
        let existing = Self::get(pool, actor, entry_id).await?;
        ensure_author(&existing, actor)?;
        ensure_transition(existing.status, ApprovalStatus::Submitted)?;

        let entry = Self::set_status(pool, actor, &existing, ApprovalStatus::Submitted, None).await?;
        tracing::info!(entry_id = %entry.id, "Logbook entry submitted");
        Ok(entry)
    }

    pub async fn review(
        pool: &PgPool,
        actor: &Actor,
        entry_id: Uuid,
        params: &ReviewParams,
    ) -> Result<LogbookEntry, AppError> {
        actor.require(Permission::ReviewLogbook)?;
        let existing = Self::get(pool, actor, entry_id).await?;

        let next = match params.decision {
            ReviewDecision::Approve => ApprovalStatus::Approved,
            ReviewDecision::Reject => ApprovalStatus::Rejected,
        };
        ensure_transition(existing.status, next)?;
        if next == ApprovalStatus::Rejected && params.note.as_deref().is_none_or(|n| n.trim().is_empty()) {
            return Err(AppError::Validation(
                "A note is required when rejecting an entry".to_string(),
            ));
        }

        let entry = Self::set_status(pool, actor, &existing, next, params.note.as_deref()).await?;
        tracing::info!(entry_id = %entry.id, status = %entry.status, "Logbook entry reviewed");
        Ok(entry)
    }

    /// Status update guarded by the expected current status, so concurrent
    /// reviewers cannot both win.
    async fn set_status(
        pool: &PgPool,
        actor: &Actor,
        existing: &LogbookEntry,
        next: ApprovalStatus,
        note: Option<&str>,
    ) -> Result<LogbookEntry, AppError> {
        let reviewed = matches!(next, ApprovalStatus::Approved | ApprovalStatus::Rejected);

        let entry: Option<LogbookEntry> = sqlx::query_as(
            r#"
            UPDATE logbook_entries
            SET status = $1,
                reviewed_by = CASE WHEN $2 THEN $3 ELSE reviewed_by END,
                reviewed_at = CASE WHEN $2 THEN NOW() ELSE reviewed_at END,
                review_note = CASE WHEN $2 THEN $4 ELSE review_note END,
                updated_at = NOW()
            WHERE id = $5 AND tenant_id = $6 AND status = $7
            RETURNING *
            "#,
        )
        .bind(next.as_str())
        .bind(reviewed)
        .bind(actor.user_id)
        .bind(note)
        .bind(existing.id)
        .bind(actor.tenant_id)
        .bind(existing.status.as_str())
        .fetch_optional(pool)
        .await?;

        entry.ok_or_else(|| {
            AppError::Conflict("Logbook entry was modified concurrently".to_string())
        })
    }
}

fn ensure_author(entry: &LogbookEntry, actor: &Actor) -> Result<(), AppError> {
    if entry.author_id != actor.user_id {
        return Err(AppError::Forbidden(
            "Only the author can change this logbook entry".to_string(),
        ));
    }
    Ok(())
}

fn ensure_transition(from: ApprovalStatus, to: ApprovalStatus) -> Result<(), AppError> {
    if !from.can_transition_to(to) {
        return Err(AppError::Conflict(format!(
            "Cannot move logbook entry from {} to {}",
            from, to
        )));
    }
    Ok(())
}

fn validate(title: &str, latitude: Option<f64>, longitude: Option<f64>) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Title must not be empty".to_string()));
    }
    if latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
        return Err(AppError::Validation("Latitude must be within ±90".to_string()));
    }
    if longitude.is_some_and(|lon| !(-180.0..=180.0).contains(&lon)) {
        return Err(AppError::Validation("Longitude must be within ±180".to_string()));
    }
    Ok(())
}
