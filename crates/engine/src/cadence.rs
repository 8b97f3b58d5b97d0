//! Cadence policy: how often a rule may fire for the same dedupe key.
//!
//! State lives in `rule_trigger_state`, keyed by `(rule_id, dedupe_key)`.

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use bosun_common::types::Cadence;

/// Minimum gap between two triggers for the same key; `None` for `once`.
pub fn period(cadence: Cadence) -> Option<Duration> {
    match cadence {
        Cadence::Immediate => Some(Duration::zero()),
        Cadence::Hourly => Some(Duration::hours(1)),
        Cadence::Daily => Some(Duration::days(1)),
        Cadence::Weekly => Some(Duration::weeks(1)),
        Cadence::Once => None,
    }
}

/// Next instant at which a rule with `cadence` may fire again.
///
/// Returns the Unix epoch when the rule has never fired, and `None`
/// when it can never fire again (`once` after its first trigger).
pub fn next_eligible(cadence: Cadence, last_triggered: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    let Some(last) = last_triggered else {
        return Some(DateTime::<Utc>::UNIX_EPOCH);
    };
    last.checked_add_signed(period(cadence)?)
}

/// Whether a rule may fire at `now`.
pub fn is_eligible(cadence: Cadence, last_triggered: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    next_eligible(cadence, last_triggered).is_some_and(|t| t <= now)
}

/// Persistence for per-key cadence state.
pub struct CadenceStore;

impl CadenceStore {
    /// Last trigger time for `(rule_id, dedupe_key)`, if any.
    pub async fn last_triggered(
        pool: &PgPool,
        rule_id: Uuid,
        dedupe_key: &str,
    ) -> anyhow::Result<Option<DateTime<Utc>>> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT last_triggered_at FROM rule_trigger_state WHERE rule_id = $1 AND dedupe_key = $2",
        )
        .bind(rule_id)
        .bind(dedupe_key)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(t,)| t))
    }

    /// Record a trigger at `now` if `cadence` allows one, in a single statement.
    ///
    /// Returns false when the key is still inside its cadence period. The state
    /// row stays locked until `conn`'s transaction ends, so a concurrent claim for
    /// the same key waits and then sees this trigger; rolling back releases it.
    pub async fn claim(
        conn: &mut PgConnection,
        rule_id: Uuid,
        dedupe_key: &str,
        cadence: Cadence,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let period_secs = period(cadence).map(|p| p.num_seconds());

        let claimed: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO rule_trigger_state (rule_id, dedupe_key, last_triggered_at, trigger_count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (rule_id, dedupe_key)
            DO UPDATE SET last_triggered_at = $3,
                          trigger_count = rule_trigger_state.trigger_count + 1
            WHERE $4::BIGINT IS NOT NULL
              AND rule_trigger_state.last_triggered_at + $4::BIGINT * INTERVAL '1 second' <= $3
            RETURNING rule_id
            "#,
        )
        .bind(rule_id)
        .bind(dedupe_key)
        .bind(now)
        .bind(period_secs)
        .fetch_optional(&mut *conn)
        .await?;

        if claimed.is_none() {
            return Ok(false);
        }

        sqlx::query("UPDATE notification_rules SET last_triggered_at = $1 WHERE id = $2")
            .bind(now)
            .bind(rule_id)
            .execute(&mut *conn)
            .await?;

        Ok(true)
    }

    /// Forget all cadence state for a rule (e.g. when its conditions change).
    pub async fn clear(pool: &PgPool, rule_id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM rule_trigger_state WHERE rule_id = $1")
            .bind(rule_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
