//! Replay of the mobile client's offline outbox.
//!
//! Each op is claimed in `sync_ops` under `(user_id, client_op_id)` before it runs,
//! so a replayed or concurrently retried op is applied at most once. A failed op
//! releases its claim and may be retried by the client. Failures, database ones
//! included, are reported per op and never abort the batch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::permissions::Actor;
use bosun_common::types::DomainEvent;

use crate::engines::{EngineService, RecordHoursParams};
use crate::events;
use crate::logbook::{CreateLogbookParams, LogbookService};
use crate::manifest::{EmbarkParams, ManifestService};

pub const MAX_BATCH_SIZE: usize = 500;
const MAX_CLIENT_OP_ID_LEN: usize = 128;

#[derive(Debug, Clone, Deserialize)]
pub struct SyncRequest {
    pub ops: Vec<SyncOp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncOp {
    pub client_op_id: String,
    pub op: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOpKind {
    LogbookCreateDraft,
    EngineRecordHours,
    ManifestEmbark,
}

impl std::str::FromStr for SyncOpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "logbook.create_draft" => Ok(SyncOpKind::LogbookCreateDraft),
            "engine.record_hours" => Ok(SyncOpKind::EngineRecordHours),
            "manifest.embark" => Ok(SyncOpKind::ManifestEmbark),
            other => Err(format!("unsupported op '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Applied,
    Duplicate,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncOpResult {
    pub client_op_id: String,
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-op results in request order, plus the domain events raised by applied ops.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub results: Vec<SyncOpResult>,
    pub events: Vec<DomainEvent>,
}

#[derive(Debug, Deserialize)]
struct RecordHoursOp {
    engine_id: Uuid,
    #[serde(flatten)]
    params: RecordHoursParams,
}

pub struct SyncService;

impl SyncService {
    pub async fn apply(
        pool: &PgPool,
        actor: &Actor,
        request: SyncRequest,
    ) -> Result<SyncOutcome, AppError> {
        if request.ops.len() > MAX_BATCH_SIZE {
            return Err(AppError::Validation(format!(
                "At most {} ops per batch",
                MAX_BATCH_SIZE
            )));
        }

        let mut outcome = SyncOutcome::default();
        for op in request.ops {
            let result = Self::apply_one(pool, actor, &op, &mut outcome.events).await;
            outcome.results.push(result);
        }

        tracing::info!(
            user_id = %actor.user_id,
            ops = outcome.results.len(),
            events = outcome.events.len(),
            "Offline ops replayed"
        );
        Ok(outcome)
    }

    async fn apply_one(
        pool: &PgPool,
        actor: &Actor,
        op: &SyncOp,
        events: &mut Vec<DomainEvent>,
    ) -> SyncOpResult {
        let client_op_id = op.client_op_id.trim().to_string();
        if client_op_id.is_empty() || client_op_id.len() > MAX_CLIENT_OP_ID_LEN {
            return op_error(client_op_id, "client_op_id must be 1-128 characters");
        }
        let kind: SyncOpKind = match op.op.parse() {
            Ok(kind) => kind,
            Err(e) => return op_error(client_op_id, e),
        };

        let claimed = match sqlx::query(
            r#"
            INSERT INTO sync_ops (user_id, client_op_id, op, result)
            VALUES ($1, $2, $3, 'null'::jsonb)
            ON CONFLICT (user_id, client_op_id) DO NOTHING
            "#,
        )
        .bind(actor.user_id)
        .bind(&client_op_id)
        .bind(&op.op)
        .execute(pool)
        .await
        {
            Ok(done) => done.rows_affected() > 0,
            Err(e) => {
                tracing::error!(client_op_id = %client_op_id, error = %e, "Failed to claim offline op");
                return op_error(client_op_id, "Database error");
            }
        };

        if !claimed {
            let stored: Result<(Value,), sqlx::Error> = sqlx::query_as(
                "SELECT result FROM sync_ops WHERE user_id = $1 AND client_op_id = $2",
            )
            .bind(actor.user_id)
            .bind(&client_op_id)
            .fetch_one(pool)
            .await;
            return match stored {
                Ok((stored,)) => {
                    tracing::debug!(client_op_id = %client_op_id, "Duplicate offline op");
                    SyncOpResult {
                        client_op_id,
                        status: SyncStatus::Duplicate,
                        result: Some(stored),
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::error!(client_op_id = %client_op_id, error = %e, "Failed to load stored op result");
                    op_error(client_op_id, "Database error")
                }
            };
        }

        match Self::execute(pool, actor, kind, &op.payload).await {
            Ok((result, event)) => {
                // The op is applied either way; a lost result only affects what a replay returns.
                if let Err(e) = sqlx::query(
                    "UPDATE sync_ops SET result = $1 WHERE user_id = $2 AND client_op_id = $3",
                )
                .bind(&result)
                .bind(actor.user_id)
                .bind(&client_op_id)
                .execute(pool)
                .await
                {
                    tracing::error!(client_op_id = %client_op_id, error = %e, "Failed to store offline op result");
                }
                events.extend(event);
                SyncOpResult {
                    client_op_id,
                    status: SyncStatus::Applied,
                    result: Some(result),
                    error: None,
                }
            }
            Err(e) => {
                if let Err(release) =
                    sqlx::query("DELETE FROM sync_ops WHERE user_id = $1 AND client_op_id = $2")
                        .bind(actor.user_id)
                        .bind(&client_op_id)
                        .execute(pool)
                        .await
                {
                    tracing::error!(client_op_id = %client_op_id, error = %release, "Failed to release offline op claim");
                }
                if let AppError::Database(db) = &e {
                    tracing::error!(client_op_id = %client_op_id, error = %db, "Offline op failed");
                    return op_error(client_op_id, "Database error");
                }
                tracing::warn!(client_op_id = %client_op_id, error = %e, "Offline op rejected");
                op_error(client_op_id, e.to_string())
            }
        }
    }

    async fn execute(
        pool: &PgPool,
        actor: &Actor,
        kind: SyncOpKind,
        payload: &Value,
    ) -> Result<(Value, Option<DomainEvent>), AppError> {
        match kind {
            SyncOpKind::LogbookCreateDraft => {
                let params: CreateLogbookParams = parse(payload)?;
                let entry = LogbookService::create_draft(pool, actor, &params).await?;
                Ok((to_value(&entry)?, None))
            }
            SyncOpKind::EngineRecordHours => {
                let op: RecordHoursOp = parse(payload)?;
                let recorded = EngineService::record_hours(pool, actor, op.engine_id, &op.params).await?;
                let event = events::engine_hours_recorded(
                    &recorded.engine,
                    recorded.previous_hours,
                    actor.user_id,
                );
                Ok((to_value(&recorded.reading)?, Some(event)))
            }
            SyncOpKind::ManifestEmbark => {
                let params: EmbarkParams = parse(payload)?;
                let entry = ManifestService::embark(pool, actor, &params).await?;
                let event = events::manifest_updated(&entry, "embarked", actor.user_id);
                Ok((to_value(&entry)?, Some(event)))
            }
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(payload: &Value) -> Result<T, AppError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| AppError::Validation(format!("Invalid payload: {}", e)))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}

fn op_error(client_op_id: String, message: impl Into<String>) -> SyncOpResult {
    SyncOpResult {
        client_op_id,
        status: SyncStatus::Error,
        result: None,
        error: Some(message.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_op_kind_parsing() {
        assert_eq!(
            "logbook.create_draft".parse::<SyncOpKind>().unwrap(),
            SyncOpKind::LogbookCreateDraft
        );
        assert_eq!(
            "engine.record_hours".parse::<SyncOpKind>().unwrap(),
            SyncOpKind::EngineRecordHours
        );
        assert!("logbook.delete".parse::<SyncOpKind>().is_err());
    }

    #[test]
    fn test_record_hours_payload_flattens() {
        let engine_id = Uuid::new_v4();
        let op: RecordHoursOp = parse(&json!({"engine_id": engine_id, "hours": 1520.5})).unwrap();
        assert_eq!(op.engine_id, engine_id);
        assert_eq!(op.params.hours, 1520.5);
        assert!(op.params.recorded_at.is_none());
    }

    #[test]
    fn test_bad_payload_is_validation_error() {
        let err = parse::<RecordHoursOp>(&json!({"hours": "lots"})).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_result_serialization() {
        let json = serde_json::to_value(op_error("op-1".to_string(), "nope")).unwrap();
        assert_eq!(json, json!({"client_op_id": "op-1", "status": "error", "error": "nope"}));
    }
}
