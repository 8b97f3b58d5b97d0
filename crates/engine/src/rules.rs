//! Notification rule service: CRUD and dry-run evaluation of tenant rules.
//!
//! A rule links an event type to conditions over the event payload, a cadence and
//! dedupe policy, message templates, channels, recipients and an optional
//! escalation ladder.

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::types::{
    Cadence, ChannelType, Condition, EscalationPolicy, EventKind, MatchMode, NotificationRule,
    RecipientPolicy,
};

use crate::condition::ConditionMatcher;
use crate::dedupe::DedupeGate;
use crate::template::render;

/// Service layer for rule CRUD operations.
pub struct RuleService;

/// Parameters for creating a new rule.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRuleParams {
    pub name: String,
    pub description: Option<String>,
    pub event_type: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default)]
    pub cadence: Cadence,
    pub dedupe_key: Option<String>,
    #[serde(default)]
    pub dedupe_window_secs: i64,
    pub title_template: String,
    pub body_template: String,
    #[serde(default = "default_channels")]
    pub channels: Vec<ChannelType>,
    #[serde(default)]
    pub recipients: RecipientPolicy,
    pub escalation: Option<EscalationPolicy>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_channels() -> Vec<ChannelType> {
    vec![ChannelType::InApp]
}

fn default_active() -> bool {
    true
}

/// Latest an escalation level may fire after the original trigger (one year).
pub const MAX_ESCALATION_MINUTES: i64 = 365 * 24 * 60;

/// Parameters for updating an existing rule. Omitted fields keep their value;
/// an explicit `null` clears `description`, `dedupe_key` and `escalation`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRuleParams {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub event_type: Option<String>,
    pub conditions: Option<Vec<Condition>>,
    pub match_mode: Option<MatchMode>,
    pub cadence: Option<Cadence>,
    #[serde(default, deserialize_with = "nullable")]
    pub dedupe_key: Option<Option<String>>,
    pub dedupe_window_secs: Option<i64>,
    pub title_template: Option<String>,
    pub body_template: Option<String>,
    pub channels: Option<Vec<ChannelType>>,
    pub recipients: Option<RecipientPolicy>,
    #[serde(default, deserialize_with = "nullable")]
    pub escalation: Option<Option<EscalationPolicy>>,
    pub active: Option<bool>,
}

/// Present-but-null becomes `Some(None)`; a missing field stays `None` via `default`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Result of a dry run of a rule against a sample payload.
#[derive(Debug, Clone, Serialize)]
pub struct RuleTestResult {
    pub matched: bool,
    pub dedupe_key: String,
    pub title: String,
    pub body: String,
    pub missing_placeholders: Vec<String>,
}

/// The validated subset of a rule definition, shared by create and update.
struct RuleDefinition<'a> {
    name: &'a str,
    event_type: &'a str,
    conditions: &'a [Condition],
    dedupe_window_secs: i64,
    title_template: &'a str,
    body_template: &'a str,
    channels: &'a [ChannelType],
    escalation: Option<&'a EscalationPolicy>,
}

impl RuleService {
    /// Create a new rule for a tenant.
    pub async fn create(
        pool: &PgPool,
        tenant_id: Uuid,
        created_by: Uuid,
        params: &CreateRuleParams,
    ) -> Result<NotificationRule, AppError> {
        Self::validate(&RuleDefinition {
            name: &params.name,
            event_type: &params.event_type,
            conditions: &params.conditions,
            dedupe_window_secs: params.dedupe_window_secs,
            title_template: &params.title_template,
            body_template: &params.body_template,
            channels: &params.channels,
            escalation: params.escalation.as_ref(),
        })?;

        let rule: NotificationRule = sqlx::query_as(
            r#"
            INSERT INTO notification_rules
                (id, tenant_id, name, description, event_type, conditions, match_mode, cadence,
                 dedupe_key, dedupe_window_secs, title_template, body_template, channels,
                 recipients, escalation, active, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(params.name.trim())
        .bind(&params.description)
        .bind(&params.event_type)
        .bind(Json(&params.conditions))
        .bind(params.match_mode.as_str())
        .bind(params.cadence.as_str())
        .bind(&params.dedupe_key)
        .bind(params.dedupe_window_secs)
        .bind(&params.title_template)
        .bind(&params.body_template)
        .bind(Json(&params.channels))
        .bind(Json(&params.recipients))
        .bind(params.escalation.as_ref().map(Json))
        .bind(params.active)
        .bind(created_by)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            rule_id = %rule.id,
            tenant_id = %tenant_id,
            event_type = %rule.event_type,
            "Notification rule created"
        );

        Ok(rule)
    }

    /// List all rules of a tenant.
    pub async fn list(pool: &PgPool, tenant_id: Uuid) -> Result<Vec<NotificationRule>, AppError> {
        let rules: Vec<NotificationRule> = sqlx::query_as(
            "SELECT * FROM notification_rules WHERE tenant_id = $1 ORDER BY created_at DESC",
        )
        .bind(tenant_id)
        .fetch_all(pool)
        .await?;

        Ok(rules)
    }

    /// Get a single rule by ID.
    pub async fn get(
        pool: &PgPool,
        tenant_id: Uuid,
        rule_id: Uuid,
    ) -> Result<NotificationRule, AppError> {
        sqlx::query_as("SELECT * FROM notification_rules WHERE id = $1 AND tenant_id = $2")
            .bind(rule_id)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Notification rule {} not found", rule_id)))
    }

    /// Update a rule. The merged definition is re-validated.
    pub async fn update(
        pool: &PgPool,
        tenant_id: Uuid,
        rule_id: Uuid,
        params: &UpdateRuleParams,
    ) -> Result<NotificationRule, AppError> {
        let existing = Self::get(pool, tenant_id, rule_id).await?;

        let name = params.name.clone().unwrap_or(existing.name);
        let description = params.description.clone().unwrap_or(existing.description);
        let event_type = params.event_type.clone().unwrap_or(existing.event_type);
        let conditions = params.conditions.clone().unwrap_or(existing.conditions.0);
        let match_mode = params.match_mode.unwrap_or(existing.match_mode);
        let cadence = params.cadence.unwrap_or(existing.cadence);
        let dedupe_key = params.dedupe_key.clone().unwrap_or(existing.dedupe_key);
        let dedupe_window_secs = params
            .dedupe_window_secs
            .unwrap_or(existing.dedupe_window_secs);
        let title_template = params
            .title_template
            .clone()
            .unwrap_or(existing.title_template);
        let body_template = params
            .body_template
            .clone()
            .unwrap_or(existing.body_template);
        let channels = params.channels.clone().unwrap_or(existing.channels.0);
        let recipients = params.recipients.clone().unwrap_or(existing.recipients.0);
        let escalation = params
            .escalation
            .clone()
            .unwrap_or(existing.escalation.map(|e| e.0));
        let active = params.active.unwrap_or(existing.active);

        Self::validate(&RuleDefinition {
            name: &name,
            event_type: &event_type,
            conditions: &conditions,
            dedupe_window_secs,
            title_template: &title_template,
            body_template: &body_template,
            channels: &channels,
            escalation: escalation.as_ref(),
        })?;

        let rule: NotificationRule = sqlx::query_as(
            r#"
            UPDATE notification_rules
            SET name = $1, description = $2, event_type = $3, conditions = $4, match_mode = $5,
                cadence = $6, dedupe_key = $7, dedupe_window_secs = $8, title_template = $9,
                body_template = $10, channels = $11, recipients = $12, escalation = $13,
                active = $14, updated_at = NOW()
            WHERE id = $15 AND tenant_id = $16
            RETURNING *
            "#,
        )
        .bind(name.trim())
        .bind(&description)
        .bind(&event_type)
        .bind(Json(&conditions))
        .bind(match_mode.as_str())
        .bind(cadence.as_str())
        .bind(&dedupe_key)
        .bind(dedupe_window_secs)
        .bind(&title_template)
        .bind(&body_template)
        .bind(Json(&channels))
        .bind(Json(&recipients))
        .bind(escalation.as_ref().map(Json))
        .bind(active)
        .bind(rule_id)
        .bind(tenant_id)
        .fetch_one(pool)
        .await?;

        tracing::info!(rule_id = %rule_id, active, "Notification rule updated");

        Ok(rule)
    }

    /// Delete a rule. Returns true if it was deleted.
    pub async fn delete(pool: &PgPool, tenant_id: Uuid, rule_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM notification_rules WHERE id = $1 AND tenant_id = $2")
            .bind(rule_id)
            .bind(tenant_id)
            .execute(pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(rule_id = %rule_id, "Notification rule deleted");
        }

        Ok(deleted)
    }

    /// Find all active rules of a tenant listening for `event_type`.
    /// Used by the processor during event evaluation.
    pub async fn find_active(
        pool: &PgPool,
        tenant_id: Uuid,
        event_type: EventKind,
    ) -> Result<Vec<NotificationRule>, AppError> {
        let rules: Vec<NotificationRule> = sqlx::query_as(
            r#"
            SELECT *
            FROM notification_rules
            WHERE tenant_id = $1
              AND event_type = $2
              AND active = true
            ORDER BY created_at
            "#,
        )
        .bind(tenant_id)
        .bind(event_type.as_str())
        .fetch_all(pool)
        .await?;

        Ok(rules)
    }

    /// Evaluate a rule against a sample payload without side effects.
    pub fn test(rule: &NotificationRule, payload: &serde_json::Value) -> RuleTestResult {
        let matched = ConditionMatcher::matches(&rule.conditions, rule.match_mode, payload);
        let title = render(&rule.title_template, payload);
        let body = render(&rule.body_template, payload);

        let mut missing = title.missing;
        for key in body.missing {
            if !missing.contains(&key) {
                missing.push(key);
            }
        }

        RuleTestResult {
            matched,
            dedupe_key: DedupeGate::dedupe_key(rule, payload),
            title: title.text,
            body: body.text,
            missing_placeholders: missing,
        }
    }

    fn validate(def: &RuleDefinition<'_>) -> Result<(), AppError> {
        if def.name.trim().is_empty() {
            return Err(AppError::Validation("Rule name must not be empty".to_string()));
        }

        if def.event_type.parse::<EventKind>().is_err() {
            let valid: Vec<&str> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
            return Err(AppError::Validation(format!(
                "Invalid event_type '{}'. Valid types: {}",
                def.event_type,
                valid.join(", ")
            )));
        }

        ConditionMatcher::validate(def.conditions)?;

        if def.dedupe_window_secs < 0 {
            return Err(AppError::Validation(
                "dedupe_window_secs must be >= 0".to_string(),
            ));
        }

        if def.title_template.trim().is_empty() || def.body_template.trim().is_empty() {
            return Err(AppError::Validation(
                "title_template and body_template must not be empty".to_string(),
            ));
        }

        if def.channels.is_empty() {
            return Err(AppError::Validation(
                "At least one channel is required".to_string(),
            ));
        }

        if let Some(escalation) = def.escalation {
            let mut previous = 0;
            for (i, level) in escalation.levels.iter().enumerate() {
                if level.after_minutes <= previous {
                    return Err(AppError::Validation(format!(
                        "Escalation level {} must fire after {} minutes",
                        i + 1,
                        previous
                    )));
                }
                if level.after_minutes > MAX_ESCALATION_MINUTES {
                    return Err(AppError::Validation(format!(
                        "Escalation level {} must fire within {} minutes",
                        i + 1,
                        MAX_ESCALATION_MINUTES
                    )));
                }
                if level.recipients.is_empty() {
                    return Err(AppError::Validation(format!(
                        "Escalation level {} has no recipients",
                        i + 1
                    )));
                }
                previous = level.after_minutes;
            }
        }

        Ok(())
    }
}
