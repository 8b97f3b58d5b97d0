//! Crew records, certificates and contract tracking.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::permissions::{Actor, Permission};
use bosun_common::types::{CrewCertificate, CrewMember};

use crate::yachts::YachtService;

/// Longest look-ahead accepted by the expiry queries.
pub const MAX_HORIZON_DAYS: i64 = 3650;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCrewParams {
    pub yacht_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub full_name: String,
    pub position: String,
    pub nationality: Option<String>,
    pub passport_number: Option<String>,
    pub contract_start: Option<NaiveDate>,
    pub contract_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCrewParams {
    pub yacht_id: Option<Uuid>,
    pub full_name: Option<String>,
    pub position: Option<String>,
    pub nationality: Option<String>,
    pub passport_number: Option<String>,
    pub contract_start: Option<NaiveDate>,
    pub contract_end: Option<NaiveDate>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrewFilter {
    pub yacht_id: Option<Uuid>,
    /// Include crew members marked inactive.
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddCertificateParams {
    pub name: String,
    pub issuer: Option<String>,
    pub number: Option<String>,
    pub issued_on: Option<NaiveDate>,
    pub expires_on: Option<NaiveDate>,
}

/// A certificate due to expire, joined with its holder.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ExpiringCertificate {
    pub id: Uuid,
    pub crew_member_id: Uuid,
    pub crew_member_name: String,
    pub yacht_id: Option<Uuid>,
    pub name: String,
    pub number: Option<String>,
    pub expires_on: NaiveDate,
}

/// Reject look-ahead windows outside `0..=MAX_HORIZON_DAYS`.
pub fn check_horizon(days: i64) -> Result<(), AppError> {
    if !(0..=MAX_HORIZON_DAYS).contains(&days) {
        return Err(AppError::Validation(format!(
            "days must be between 0 and {}",
            MAX_HORIZON_DAYS
        )));
    }
    Ok(())
}

fn validate_dates(start: Option<NaiveDate>, end: Option<NaiveDate>, what: &str) -> Result<(), AppError> {
    if let (Some(start), Some(end)) = (start, end)
        && end < start
    {
        return Err(AppError::Validation(format!("{} ends before it starts", what)));
    }
    Ok(())
}

pub struct CrewService;

impl CrewService {
    pub async fn create(
        pool: &PgPool,
        actor: &Actor,
        params: &CreateCrewParams,
    ) -> Result<CrewMember, AppError> {
        actor.require(Permission::ManageCrew)?;
        if params.full_name.trim().is_empty() || params.position.trim().is_empty() {
            return Err(AppError::Validation(
                "full_name and position are required".to_string(),
            ));
        }
        validate_dates(params.contract_start, params.contract_end, "Contract")?;
        if let Some(yacht_id) = params.yacht_id {
            YachtService::ensure_exists(pool, actor, yacht_id).await?;
        }
        if let Some(user_id) = params.user_id {
            let found: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM users WHERE id = $1 AND tenant_id = $2")
                    .bind(user_id)
                    .bind(actor.tenant_id)
                    .fetch_optional(pool)
                    .await?;
            if found.is_none() {
                return Err(AppError::NotFound(format!("User {} not found", user_id)));
            }
        }

        let member: CrewMember = sqlx::query_as(
            r#"
            INSERT INTO crew_members
                (id, tenant_id, yacht_id, user_id, full_name, position, nationality,
                 passport_number, contract_start, contract_end)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.tenant_id)
        .bind(params.yacht_id)
        .bind(params.user_id)
        .bind(params.full_name.trim())
        .bind(params.position.trim())
        .bind(&params.nationality)
        .bind(&params.passport_number)
        .bind(params.contract_start)
        .bind(params.contract_end)
        .fetch_one(pool)
        .await?;

        tracing::info!(crew_member_id = %member.id, position = %member.position, "Crew member added");
        Ok(member)
    }

    pub async fn list(
        pool: &PgPool,
        actor: &Actor,
        filter: &CrewFilter,
    ) -> Result<Vec<CrewMember>, AppError> {
        let members = sqlx::query_as(
            r#"
            SELECT * FROM crew_members
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR yacht_id = $2)
              AND ($3 OR active)
            ORDER BY full_name
            "#,
        )
        .bind(actor.tenant_id)
        .bind(filter.yacht_id)
        .bind(filter.include_inactive)
        .fetch_all(pool)
        .await?;
        Ok(members)
    }

    pub async fn get(pool: &PgPool, actor: &Actor, crew_member_id: Uuid) -> Result<CrewMember, AppError> {
        sqlx::query_as("SELECT * FROM crew_members WHERE id = $1 AND tenant_id = $2")
            .bind(crew_member_id)
            .bind(actor.tenant_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Crew member {} not found", crew_member_id)))
    }

    pub async fn update(
        pool: &PgPool,
        actor: &Actor,
        crew_member_id: Uuid,
        params: &UpdateCrewParams,
    ) -> Result<CrewMember, AppError> {
        actor.require(Permission::ManageCrew)?;
        let existing = Self::get(pool, actor, crew_member_id).await?;

        let full_name = params.full_name.clone().unwrap_or(existing.full_name);
        let position = params.position.clone().unwrap_or(existing.position);
        if full_name.trim().is_empty() || position.trim().is_empty() {
            return Err(AppError::Validation(
                "full_name and position must not be empty".to_string(),
            ));
        }
        let contract_start = params.contract_start.or(existing.contract_start);
        let contract_end = params.contract_end.or(existing.contract_end);
        validate_dates(contract_start, contract_end, "Contract")?;

        let yacht_id = params.yacht_id.or(existing.yacht_id);
        if let Some(yacht_id) = params.yacht_id {
            YachtService::ensure_exists(pool, actor, yacht_id).await?;
        }

        let member: CrewMember = sqlx::query_as(
            r#"
            UPDATE crew_members
            SET yacht_id = $1, full_name = $2, position = $3, nationality = $4,
                passport_number = $5, contract_start = $6, contract_end = $7, active = $8,
                updated_at = NOW()
            WHERE id = $9 AND tenant_id = $10
            RETURNING *
            "#,
        )
        .bind(yacht_id)
        .bind(full_name.trim())
        .bind(position.trim())
        .bind(params.nationality.clone().or(existing.nationality))
        .bind(params.passport_number.clone().or(existing.passport_number))
        .bind(contract_start)
        .bind(contract_end)
        .bind(params.active.unwrap_or(existing.active))
        .bind(crew_member_id)
        .bind(actor.tenant_id)
        .fetch_one(pool)
        .await?;

        Ok(member)
    }

    pub async fn delete(pool: &PgPool, actor: &Actor, crew_member_id: Uuid) -> Result<bool, AppError> {
        actor.require(Permission::ManageCrew)?;
        let result = sqlx::query("DELETE FROM crew_members WHERE id = $1 AND tenant_id = $2")
            .bind(crew_member_id)
            .bind(actor.tenant_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn certificates(
        pool: &PgPool,
        actor: &Actor,
        crew_member_id: Uuid,
    ) -> Result<Vec<CrewCertificate>, AppError> {
        Self::get(pool, actor, crew_member_id).await?;
        let certificates = sqlx::query_as(
            r#"
            SELECT * FROM crew_certificates
            WHERE crew_member_id = $1
            ORDER BY expires_on NULLS LAST, name
            "#,
        )
        .bind(crew_member_id)
        .fetch_all(pool)
        .await?;
        Ok(certificates)
    }

    pub async fn add_certificate(
        pool: &PgPool,
        actor: &Actor,
        crew_member_id: Uuid,
        params: &AddCertificateParams,
    ) -> Result<CrewCertificate, AppError> {
        actor.require(Permission::ManageCrew)?;
        if params.name.trim().is_empty() {
            return Err(AppError::Validation("Certificate name must not be empty".to_string()));
        }
        validate_dates(params.issued_on, params.expires_on, "Certificate")?;
        Self::get(pool, actor, crew_member_id).await?;

        let certificate: CrewCertificate = sqlx::query_as(
            r#"
            INSERT INTO crew_certificates (id, crew_member_id, name, issuer, number, issued_on, expires_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(crew_member_id)
        .bind(params.name.trim())
        .bind(&params.issuer)
        .bind(&params.number)
        .bind(params.issued_on)
        .bind(params.expires_on)
        .fetch_one(pool)
        .await?;

        Ok(certificate)
    }

    pub async fn delete_certificate(
        pool: &PgPool,
        actor: &Actor,
        certificate_id: Uuid,
    ) -> Result<bool, AppError> {
        actor.require(Permission::ManageCrew)?;
        let result = sqlx::query(
            r#"
            DELETE FROM crew_certificates c
            USING crew_members m
            WHERE c.id = $1 AND c.crew_member_id = m.id AND m.tenant_id = $2
            "#,
        )
        .bind(certificate_id)
        .bind(actor.tenant_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn expiring_certificates(
        pool: &PgPool,
        actor: &Actor,
        days: i64,
    ) -> Result<Vec<ExpiringCertificate>, AppError> {
        check_horizon(days)?;
        Self::expiring_certificates_for_tenant(pool, actor.tenant_id, days).await
    }

    /// Certificates of active crew expiring within `days` (already expired ones included).
    pub async fn expiring_certificates_for_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        days: i64,
    ) -> Result<Vec<ExpiringCertificate>, AppError> {
        let until = Utc::now().date_naive() + Duration::days(days);
        let certificates = sqlx::query_as(
            r#"
            SELECT c.id, c.crew_member_id, m.full_name AS crew_member_name, m.yacht_id,
                   c.name, c.number, c.expires_on
            FROM crew_certificates c
            JOIN crew_members m ON m.id = c.crew_member_id
            WHERE m.tenant_id = $1 AND m.active
              AND c.expires_on IS NOT NULL AND c.expires_on <= $2
            ORDER BY c.expires_on, m.full_name
            "#,
        )
        .bind(tenant_id)
        .bind(until)
        .fetch_all(pool)
        .await?;
        Ok(certificates)
    }

    /// Active crew whose contract ends within `days`.
    pub async fn ending_contracts_for_tenant(
        pool: &PgPool,
        tenant_id: Uuid,
        days: i64,
    ) -> Result<Vec<CrewMember>, AppError> {
        let today = Utc::now().date_naive();
        let members = sqlx::query_as(
            r#"
            SELECT * FROM crew_members
            WHERE tenant_id = $1 AND active
              AND contract_end IS NOT NULL AND contract_end BETWEEN $2 AND $3
            ORDER BY contract_end, full_name
            "#,
        )
        .bind(tenant_id)
        .bind(today)
        .bind(today + Duration::days(days))
        .fetch_all(pool)
        .await?;
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_contract_dates() {
        assert!(validate_dates(date(2026, 1, 1), date(2026, 12, 31), "Contract").is_ok());
        assert!(validate_dates(date(2026, 6, 1), date(2026, 6, 1), "Contract").is_ok());
        assert!(validate_dates(None, date(2026, 1, 1), "Contract").is_ok());
        assert!(validate_dates(date(2026, 6, 1), date(2026, 5, 31), "Contract").is_err());
    }

    #[test]
    fn test_horizon_bounds() {
        assert!(check_horizon(0).is_ok());
        assert!(check_horizon(30).is_ok());
        assert!(check_horizon(MAX_HORIZON_DAYS).is_ok());
        assert!(check_horizon(-1).is_err());
        assert!(check_horizon(MAX_HORIZON_DAYS + 1).is_err());
    }
}
