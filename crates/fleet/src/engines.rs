//! Engines, running-hour readings and service tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::permissions::{Actor, Permission};
use bosun_common::types::{Engine, EngineHoursReading};

use crate::yachts::YachtService;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEngineParams {
    pub yacht_id: Uuid,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    #[serde(default)]
    pub current_hours: f64,
    pub service_interval_hours: f64,
    /// Defaults to `current_hours` (freshly serviced).
    pub last_service_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEngineParams {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub service_interval_hours: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordHoursParams {
    pub hours: f64,
    pub recorded_at: Option<DateTime<Utc>>,
}

/// An engine together with its derived service figures.
#[derive(Debug, Clone, Serialize)]
pub struct EngineView {
    #[serde(flatten)]
    pub engine: Engine,
    pub hours_until_service: f64,
    pub service_due: bool,
}

impl From<Engine> for EngineView {
    fn from(engine: Engine) -> Self {
        Self {
            hours_until_service: engine.hours_until_service(),
            service_due: engine.service_due(),
            engine,
        }
    }
}

/// Outcome of recording a reading.
#[derive(Debug, Clone)]
pub struct HoursRecorded {
    pub engine: Engine,
    pub previous_hours: f64,
    pub reading: EngineHoursReading,
}

/// Readings must be finite, non-negative and never go backwards.
pub fn check_reading(current_hours: f64, new_hours: f64) -> Result<(), AppError> {
    if !new_hours.is_finite() || new_hours < 0.0 {
        return Err(AppError::Validation(
            "Hours must be a non-negative number".to_string(),
        ));
    }
    if new_hours < current_hours {
        return Err(AppError::Validation(format!(
            "Reading {} is below the current {} hours",
            new_hours, current_hours
        )));
    }
    Ok(())
}

fn validate_interval(interval: f64) -> Result<(), AppError> {
    if !(interval.is_finite() && interval > 0.0) {
        return Err(AppError::Validation(
            "service_interval_hours must be positive".to_string(),
        ));
    }
    Ok(())
}

pub struct EngineService;

impl EngineService {
    pub async fn create(
        pool: &PgPool,
        actor: &Actor,
        params: &CreateEngineParams,
    ) -> Result<Engine, AppError> {
        actor.require(Permission::ManageFleet)?;
        if params.name.trim().is_empty() {
            return Err(AppError::Validation("Engine name must not be empty".to_string()));
        }
        validate_interval(params.service_interval_hours)?;
        check_reading(0.0, params.current_hours)?;
        let last_service = params.last_service_hours.unwrap_or(params.current_hours);
        if !(0.0..=params.current_hours).contains(&last_service) {
            return Err(AppError::Validation(
                "last_service_hours must be between 0 and current_hours".to_string(),
            ));
        }
        YachtService::ensure_exists(pool, actor, params.yacht_id).await?;

        let engine: Engine = sqlx::query_as(
            r#"
            INSERT INTO engines
                (id, tenant_id, yacht_id, name, manufacturer, model, serial_number,
                 current_hours, service_interval_hours, last_service_hours)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.tenant_id)
        .bind(params.yacht_id)
        .bind(params.name.trim())
        .bind(&params.manufacturer)
        .bind(&params.model)
        .bind(&params.serial_number)
        .bind(params.current_hours)
        .bind(params.service_interval_hours)
        .bind(last_service)
        .fetch_one(pool)
        .await?;

        tracing::info!(engine_id = %engine.id, yacht_id = %engine.yacht_id, "Engine created");
        Ok(engine)
    }

    pub async fn list(
        pool: &PgPool,
        actor: &Actor,
        yacht_id: Option<Uuid>,
    ) -> Result<Vec<Engine>, AppError> {
        let engines = sqlx::query_as(
            r#"
            SELECT * FROM engines
            WHERE tenant_id = $1 AND ($2::uuid IS NULL OR yacht_id = $2)
            ORDER BY name
            "#,
        )
        .bind(actor.tenant_id)
        .bind(yacht_id)
        .fetch_all(pool)
        .await?;
        Ok(engines)
    }

    pub async fn get(pool: &PgPool, actor: &Actor, engine_id: Uuid) -> Result<Engine, AppError> {
        sqlx::query_as("SELECT * FROM engines WHERE id = $1 AND tenant_id = $2")
            .bind(engine_id)
            .bind(actor.tenant_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Engine {} not found", engine_id)))
    }

    pub async fn update(
        pool: &PgPool,
        actor: &Actor,
        engine_id: Uuid,
        params: &UpdateEngineParams,
    ) -> Result<Engine, AppError> {
        actor.require(Permission::ManageFleet)?;
        let existing = Self::get(pool, actor, engine_id).await?;

        let interval = params
            .service_interval_hours
            .unwrap_or(existing.service_interval_hours);
        validate_interval(interval)?;
        let name = params.name.clone().unwrap_or(existing.name);
        if name.trim().is_empty() {
            return Err(AppError::Validation("Engine name must not be empty".to_string()));
        }

        let engine: Engine = sqlx::query_as(
            r#"
            UPDATE engines
            SET name = $1, manufacturer = $2, model = $3, serial_number = $4,
                service_interval_hours = $5, updated_at = NOW()
            WHERE id = $6 AND tenant_id = $7
            RETURNING *
            "#,
        )
        .bind(name.trim())
        .bind(params.manufacturer.clone().or(existing.manufacturer))
        .bind(params.model.clone().or(existing.model))
        .bind(params.serial_number.clone().or(existing.serial_number))
        .bind(interval)
        .bind(engine_id)
        .bind(actor.tenant_id)
        .fetch_one(pool)
        .await?;

        Ok(engine)
    }

    pub async fn delete(pool: &PgPool, actor: &Actor, engine_id: Uuid) -> Result<bool, AppError> {
        actor.require(Permission::ManageFleet)?;
        let result = sqlx::query("DELETE FROM engines WHERE id = $1 AND tenant_id = $2")
            .bind(engine_id)
            .bind(actor.tenant_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a running-hours reading. The engine row is locked so concurrent
    /// readings are applied in order and the counter never decreases.
    pub async fn record_hours(
        pool: &PgPool,
        actor: &Actor,
        engine_id: Uuid,
        params: &RecordHoursParams,
    ) -> Result<HoursRecorded, AppError> {
        actor.require(Permission::RecordEngineHours)?;

        let mut tx = pool.begin().await?;

        let existing: Engine = sqlx::query_as(
            "SELECT * FROM engines WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
        )
        .bind(engine_id)
        .bind(actor.tenant_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Engine {} not found", engine_id)))?;

        check_reading(existing.current_hours, params.hours)?;

        let reading: EngineHoursReading = sqlx::query_as(
            r#"
            INSERT INTO engine_hour_readings (id, engine_id, hours, recorded_by, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(engine_id)
        .bind(params.hours)
        .bind(actor.user_id)
        .bind(params.recorded_at.unwrap_or_else(Utc::now))
        .fetch_one(&mut *tx)
        .await?;

        let engine: Engine = sqlx::query_as(
            "UPDATE engines SET current_hours = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(params.hours)
        .bind(engine_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            engine_id = %engine_id,
            hours = params.hours,
            hours_until_service = engine.hours_until_service(),
            "Engine hours recorded"
        );

        Ok(HoursRecorded {
            previous_hours: existing.current_hours,
            engine,
            reading,
        })
    }

    pub async fn readings(
        pool: &PgPool,
        actor: &Actor,
        engine_id: Uuid,
    ) -> Result<Vec<EngineHoursReading>, AppError> {
        Self::get(pool, actor, engine_id).await?;
        let readings = sqlx::query_as(
            "SELECT * FROM engine_hour_readings WHERE engine_id = $1 ORDER BY recorded_at DESC",
        )
        .bind(engine_id)
        .fetch_all(pool)
        .await?;
        Ok(readings)
    }

    /// Mark the engine serviced at its current running hours.
    pub async fn service(pool: &PgPool, actor: &Actor, engine_id: Uuid) -> Result<Engine, AppError> {
        actor.require(Permission::RecordEngineHours)?;
        let engine: Engine = sqlx::query_as(
            r#"
            UPDATE engines SET last_service_hours = current_hours, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(engine_id)
        .bind(actor.tenant_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Engine {} not found", engine_id)))?;

        tracing::info!(engine_id = %engine_id, at_hours = engine.last_service_hours, "Engine serviced");
        Ok(engine)
    }
}
