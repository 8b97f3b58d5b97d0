//! Dedupe gate: Redis-backed per-rule, per-key suppression windows.
//!
//! After a rule fires for a dedupe key, the same key is suppressed for
//! `dedupe_window_secs`. Uses Redis `SET NX EX` for atomic check-and-set with
//! automatic TTL expiry.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use bosun_common::types::NotificationRule;

use crate::template::render;

/// Dedupe key used when a rule has no `dedupe_key` template or it renders empty.
pub const WILDCARD_KEY: &str = "*";

/// `COUNT` hint per `SCAN` round trip when clearing a rule's windows.
const SCAN_BATCH: usize = 500;

/// Redis-backed dedupe gate.
pub struct DedupeGate;

impl DedupeGate {
    pub fn new() -> Self {
        Self
    }

    /// Render the rule's dedupe key template against the event payload.
    pub fn dedupe_key(rule: &NotificationRule, payload: &serde_json::Value) -> String {
        let rendered = rule
            .dedupe_key
            .as_deref()
            .map(|t| render(t, payload).text)
            .unwrap_or_default();

        if rendered.trim().is_empty() {
            WILDCARD_KEY.to_string()
        } else {
            rendered
        }
    }

    /// Check whether `(rule, key)` is outside its window, and if so, open a new window.
    ///
    /// Returns `true` if the trigger should proceed, `false` if it is suppressed.
    /// A window of 0 seconds disables the gate.
    pub async fn check_and_set(
        &self,
        redis: &mut ConnectionManager,
        rule: &NotificationRule,
        dedupe_key: &str,
    ) -> anyhow::Result<bool> {
        if rule.dedupe_window_secs <= 0 {
            return Ok(true);
        }

        let key = Self::redis_key(rule.id, dedupe_key);

        // SET key "1" NX EX window
        // Returns Some("OK") if key was set (not suppressed)
        // Returns None if key already exists (suppressed)
        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(rule.dedupe_window_secs)
            .query_async(redis)
            .await?;

        let allowed = result.is_some();

        if !allowed {
            tracing::debug!(
                rule_id = %rule.id,
                dedupe_key,
                window_secs = rule.dedupe_window_secs,
                "Trigger suppressed; dedupe window open"
            );
        }

        Ok(allowed)
    }

    /// Clear every dedupe window for a rule (e.g., when the rule is updated).
    /// Walks the keyspace with `SCAN` and deletes each page as it arrives.
    /// Returns how many keys were removed.
    pub async fn clear(&self, redis: &mut ConnectionManager, rule_id: Uuid) -> anyhow::Result<u64> {
        let pattern = format!("rule:dedupe:{}:*", rule_id);
        let mut cursor: u64 = 0;
        let mut removed = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(redis)
                .await?;

            if !keys.is_empty() {
                removed += redis.del::<_, u64>(keys).await?;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(removed)
    }

    fn redis_key(rule_id: Uuid, dedupe_key: &str) -> String {
        format!("rule:dedupe:{}:{}", rule_id, dedupe_key)
    }
}

impl Default for DedupeGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::make_rule;
    use serde_json::json;

    #[test]
    fn test_dedupe_key_defaults_to_wildcard() {
        let rule = make_rule(json!([]));
        assert_eq!(DedupeGate::dedupe_key(&rule, &json!({})), WILDCARD_KEY);
    }

    #[test]
    fn test_dedupe_key_renders_template() {
        let mut rule = make_rule(json!([]));
        rule.dedupe_key = Some("engine:{{engine_id}}".to_string());
        assert_eq!(
            DedupeGate::dedupe_key(&rule, &json!({"engine_id": "abc"})),
            "engine:abc"
        );
    }

    #[test]
    fn test_dedupe_key_blank_render_is_wildcard() {
        let mut rule = make_rule(json!([]));
        rule.dedupe_key = Some("{{missing}}".to_string());
        assert_eq!(DedupeGate::dedupe_key(&rule, &json!({})), WILDCARD_KEY);
    }

    #[test]
    fn test_redis_key_format() {
        let id = Uuid::nil();
        assert_eq!(
            DedupeGate::redis_key(id, "engine:1"),
            "rule:dedupe:00000000-0000-0000-0000-000000000000:engine:1"
        );
    }
}
