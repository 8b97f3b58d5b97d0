//! Voyage manifests: who is aboard which yacht for which voyage.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::permissions::{Actor, Permission};
use bosun_common::types::{ManifestEntry, PersonType};

use crate::yachts::YachtService;

#[derive(Debug, Clone, Deserialize)]
pub struct EmbarkParams {
    pub yacht_id: Uuid,
    pub voyage_ref: String,
    pub person_name: String,
    pub person_type: PersonType,
    pub crew_member_id: Option<Uuid>,
    pub nationality: Option<String>,
    pub document_number: Option<String>,
    /// Defaults to now.
    pub embarked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisembarkParams {
    pub disembarked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestFilter {
    pub yacht_id: Option<Uuid>,
    pub voyage_ref: Option<String>,
    /// Only people still aboard.
    #[serde(default)]
    pub aboard: bool,
}

pub struct ManifestService;

impl ManifestService {
    pub async fn embark(
        pool: &PgPool,
        actor: &Actor,
        params: &EmbarkParams,
    ) -> Result<ManifestEntry, AppError> {
        actor.require(Permission::ManageCrew)?;
        if params.voyage_ref.trim().is_empty() || params.person_name.trim().is_empty() {
            return Err(AppError::Validation(
                "voyage_ref and person_name are required".to_string(),
            ));
        }
        if params.person_type == PersonType::Guest && params.crew_member_id.is_some() {
            return Err(AppError::Validation(
                "Guests cannot reference a crew member".to_string(),
            ));
        }
        YachtService::ensure_exists(pool, actor, params.yacht_id).await?;

        if let Some(crew_member_id) = params.crew_member_id {
            let found: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM crew_members WHERE id = $1 AND tenant_id = $2")
                    .bind(crew_member_id)
                    .bind(actor.tenant_id)
                    .fetch_optional(pool)
                    .await?;
            if found.is_none() {
                return Err(AppError::NotFound(format!(
                    "Crew member {} not found",
                    crew_member_id
                )));
            }
        }

        let aboard: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM manifest_entries
            WHERE tenant_id = $1 AND yacht_id = $2 AND voyage_ref = $3
              AND lower(person_name) = lower($4) AND disembarked_at IS NULL
            "#,
        )
        .bind(actor.tenant_id)
        .bind(params.yacht_id)
        .bind(params.voyage_ref.trim())
        .bind(params.person_name.trim())
        .fetch_optional(pool)
        .await?;
        if aboard.is_some() {
            return Err(AppError::Conflict(format!(
                "{} is already aboard for voyage {}",
                params.person_name.trim(),
                params.voyage_ref.trim()
            )));
        }

        let entry: ManifestEntry = sqlx::query_as(
            r#"
            INSERT INTO manifest_entries
                (id, tenant_id, yacht_id, voyage_ref, person_name, person_type, crew_member_id,
                 nationality, document_number, embarked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.tenant_id)
        .bind(params.yacht_id)
        .bind(params.voyage_ref.trim())
        .bind(params.person_name.trim())
        .bind(params.person_type.to_string())
        .bind(params.crew_member_id)
        .bind(&params.nationality)
        .bind(&params.document_number)
        .bind(params.embarked_at.unwrap_or_else(Utc::now))
        .fetch_one(pool)
        .await?;

        tracing::info!(
            entry_id = %entry.id,
            voyage_ref = %entry.voyage_ref,
            person_type = %entry.person_type,
            "Person embarked"
        );
        Ok(entry)
    }

    pub async fn list(
        pool: &PgPool,
        actor: &Actor,
        filter: &ManifestFilter,
    ) -> Result<Vec<ManifestEntry>, AppError> {
        let entries = sqlx::query_as(
            r#"
            SELECT * FROM manifest_entries
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR yacht_id = $2)
              AND ($3::text IS NULL OR voyage_ref = $3)
              AND (NOT $4 OR disembarked_at IS NULL)
            ORDER BY embarked_at DESC, person_name
            "#,
        )
        .bind(actor.tenant_id)
        .bind(filter.yacht_id)
        .bind(filter.voyage_ref.as_deref())
        .bind(filter.aboard)
        .fetch_all(pool)
        .await?;
        Ok(entries)
    }

    pub async fn get(pool: &PgPool, actor: &Actor, entry_id: Uuid) -> Result<ManifestEntry, AppError> {
        sqlx::query_as("SELECT * FROM manifest_entries WHERE id = $1 AND tenant_id = $2")
            .bind(entry_id)
            .bind(actor.tenant_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Manifest entry {} not found", entry_id)))
    }

    pub async fn disembark(
        pool: &PgPool,
        actor: &Actor,
        entry_id: Uuid,
        params: &DisembarkParams,
    ) -> Result<ManifestEntry, AppError> {
        actor.require(Permission::ManageCrew)?;
        let existing = Self::get(pool, actor, entry_id).await?;
        if existing.disembarked_at.is_some() {
            return Err(AppError::Conflict(format!(
                "{} has already disembarked",
                existing.person_name
            )));
        }

        let at = params.disembarked_at.unwrap_or_else(Utc::now);
        if at < existing.embarked_at {
            return Err(AppError::Validation(
                "Disembarkation cannot precede embarkation".to_string(),
            ));
        }

        let entry: ManifestEntry = sqlx::query_as(
            r#"
            UPDATE manifest_entries SET disembarked_at = $1
            WHERE id = $2 AND tenant_id = $3
            RETURNING *
            "#,
        )
        .bind(at)
        .bind(entry_id)
        .bind(actor.tenant_id)
        .fetch_one(pool)
        .await?;

        Ok(entry)
    }

    /// Remove an entry, returning it so callers can announce the change.
    pub async fn delete(
        pool: &PgPool,
        actor: &Actor,
        entry_id: Uuid,
    ) -> Result<Option<ManifestEntry>, AppError> {
        actor.require(Permission::ManageCrew)?;
        let entry = sqlx::query_as(
            "DELETE FROM manifest_entries WHERE id = $1 AND tenant_id = $2 RETURNING *",
        )
        .bind(entry_id)
        .bind(actor.tenant_id)
        .fetch_optional(pool)
        .await?;
        Ok(entry)
    }
}
