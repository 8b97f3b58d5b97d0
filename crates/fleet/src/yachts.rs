//! Yacht registry.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::permissions::{Actor, Permission};
use bosun_common::types::Yacht;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateYachtParams {
    pub name: String,
    pub imo_number: Option<String>,
    pub flag: Option<String>,
    pub length_m: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateYachtParams {
    pub name: Option<String>,
    pub imo_number: Option<String>,
    pub flag: Option<String>,
    pub length_m: Option<f64>,
}

pub struct YachtService;

impl YachtService {
    pub async fn create(
        pool: &PgPool,
        actor: &Actor,
        params: &CreateYachtParams,
    ) -> Result<Yacht, AppError> {
        actor.require(Permission::ManageFleet)?;
        validate(&params.name, params.length_m)?;

        let yacht: Yacht = sqlx::query_as(
            r#"
            INSERT INTO yachts (id, tenant_id, name, imo_number, flag, length_m)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.tenant_id)
        .bind(params.name.trim())
        .bind(&params.imo_number)
        .bind(&params.flag)
        .bind(params.length_m)
        .fetch_one(pool)
        .await?;

        tracing::info!(yacht_id = %yacht.id, name = %yacht.name, "Yacht created");
        Ok(yacht)
    }

    pub async fn list(pool: &PgPool, actor: &Actor) -> Result<Vec<Yacht>, AppError> {
        let yachts = sqlx::query_as("SELECT * FROM yachts WHERE tenant_id = $1 ORDER BY name")
            .bind(actor.tenant_id)
            .fetch_all(pool)
            .await?;
        Ok(yachts)
    }

    pub async fn get(pool: &PgPool, actor: &Actor, yacht_id: Uuid) -> Result<Yacht, AppError> {
        sqlx::query_as("SELECT * FROM yachts WHERE id = $1 AND tenant_id = $2")
            .bind(yacht_id)
            .bind(actor.tenant_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Yacht {} not found", yacht_id)))
    }

    /// Fail with `NotFound` unless the yacht belongs to the caller's tenant.
    pub async fn ensure_exists(pool: &PgPool, actor: &Actor, yacht_id: Uuid) -> Result<(), AppError> {
        let exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM yachts WHERE id = $1 AND tenant_id = $2")
                .bind(yacht_id)
                .bind(actor.tenant_id)
                .fetch_optional(pool)
                .await?;
        exists
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Yacht {} not found", yacht_id)))
    }

    pub async fn update(
        pool: &PgPool,
        actor: &Actor,
        yacht_id: Uuid,
        params: &UpdateYachtParams,
    ) -> Result<Yacht, AppError> {
        actor.require(Permission::ManageFleet)?;
        let existing = Self::get(pool, actor, yacht_id).await?;

        let name = params.name.clone().unwrap_or(existing.name);
        let length_m = params.length_m.or(existing.length_m);
        validate(&name, length_m)?;

        let yacht: Yacht = sqlx::query_as(
            r#"
            UPDATE yachts
            SET name = $1, imo_number = $2, flag = $3, length_m = $4, updated_at = NOW()
            WHERE id = $5 AND tenant_id = $6
            RETURNING *
            "#,
        )
        .bind(name.trim())
        .bind(params.imo_number.clone().or(existing.imo_number))
        .bind(params.flag.clone().or(existing.flag))
        .bind(length_m)
        .bind(yacht_id)
        .bind(actor.tenant_id)
        .fetch_one(pool)
        .await?;

        Ok(yacht)
    }

    pub async fn delete(pool: &PgPool, actor: &Actor, yacht_id: Uuid) -> Result<bool, AppError> {
        actor.require(Permission::ManageFleet)?;
        let result = sqlx::query("DELETE FROM yachts WHERE id = $1 AND tenant_id = $2")
            .bind(yacht_id)
            .bind(actor.tenant_id)
            .execute(pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(yacht_id = %yacht_id, "Yacht deleted");
        }
        Ok(deleted)
    }
}

fn validate(name: &str, length_m: Option<f64>) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Yacht name must not be empty".to_string()));
    }
    if let Some(length) = length_m
        && !(length > 0.0 && length.is_finite())
    {
        return Err(AppError::Validation("length_m must be positive".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(validate("Aurora", Some(48.5)).is_ok());
        assert!(validate("Aurora", None).is_ok());
        assert!(validate("  ", None).is_err());
        assert!(validate("Aurora", Some(0.0)).is_err());
        assert!(validate("Aurora", Some(f64::NAN)).is_err());
    }
}
