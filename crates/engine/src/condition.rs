//! Condition matcher: evaluates rule conditions against an event payload.
//!
//! Payloads are flat JSON objects; a dotted field (`engine.name`) walks nested
//! objects when one is present. Numeric operators accept JSON numbers and
//! numeric strings (big values often arrive as strings).

use serde_json::Value;

use bosun_common::error::AppError;
use bosun_common::types::{Condition, ConditionOp, MatchMode};

/// Stateless condition evaluator.
pub struct ConditionMatcher;

impl ConditionMatcher {
    /// Evaluate a list of conditions under `mode`.
    ///
    /// An empty list always matches (useful for "notify on any event of this type" rules).
    pub fn matches(conditions: &[Condition], mode: MatchMode, payload: &Value) -> bool {
        if conditions.is_empty() {
            return true;
        }

        match mode {
            MatchMode::All => conditions.iter().all(|c| Self::evaluate(c, payload)),
            MatchMode::Any => conditions.iter().any(|c| Self::evaluate(c, payload)),
        }
    }

    /// Evaluate a single condition.
    pub fn evaluate(condition: &Condition, payload: &Value) -> bool {
        let actual = lookup(payload, &condition.field).filter(|v| !v.is_null());

        match condition.op {
            ConditionOp::Exists => return actual.is_some(),
            ConditionOp::NotExists => return actual.is_none(),
            _ => {}
        }

        let (Some(actual), Some(expected)) = (actual, condition.value.as_ref()) else {
            return false;
        };

        match condition.op {
            ConditionOp::Eq => values_equal(actual, expected),
            ConditionOp::Ne => !values_equal(actual, expected),
            ConditionOp::Gt => compare(actual, expected, |a, b| a > b),
            ConditionOp::Gte => compare(actual, expected, |a, b| a >= b),
            ConditionOp::Lt => compare(actual, expected, |a, b| a < b),
            ConditionOp::Lte => compare(actual, expected, |a, b| a <= b),
            ConditionOp::Contains => match (actual, expected) {
                (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
                (Value::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
                _ => false,
            },
            ConditionOp::In => match expected {
                Value::Array(options) => options.iter().any(|option| values_equal(actual, option)),
                _ => false,
            },
            ConditionOp::Exists | ConditionOp::NotExists => unreachable!("handled above"),
        }
    }

    /// Reject malformed conditions before they are stored.
    pub fn validate(conditions: &[Condition]) -> Result<(), AppError> {
        for (i, condition) in conditions.iter().enumerate() {
            if condition.field.trim().is_empty() {
                return Err(AppError::Validation(format!(
                    "Condition #{} has an empty field",
                    i + 1
                )));
            }

            if condition.op.takes_value() && condition.value.is_none() {
                return Err(AppError::Validation(format!(
                    "Condition #{} ({}) requires a value",
                    i + 1,
                    condition.field
                )));
            }

            if condition.op == ConditionOp::In
                && !matches!(condition.value, Some(Value::Array(_)))
            {
                return Err(AppError::Validation(format!(
                    "Condition #{} ({}) uses 'in' and needs an array value",
                    i + 1,
                    condition.field
                )));
            }
        }
        Ok(())
    }
}

/// Resolve `field` in `payload`, trying the literal key before the dotted path.
pub fn lookup<'a>(payload: &'a Value, field: &str) -> Option<&'a Value> {
    if let Some(v) = payload.get(field) {
        return Some(v);
    }

    let mut current = payload;
    for segment in field.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Coerce a JSON value to `f64` (numbers and numeric strings).
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b))
        && (a.is_number() || b.is_number())
    {
        return x == y;
    }
    a == b
}

fn compare(actual: &Value, expected: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cond(field: &str, op: ConditionOp, value: Option<Value>) -> Condition {
        Condition {
            field: field.to_string(),
            op,
            value,
        }
    }

    #[test]
    fn test_empty_conditions_always_match() {
        assert!(ConditionMatcher::matches(&[], MatchMode::All, &json!({})));
        assert!(ConditionMatcher::matches(&[], MatchMode::Any, &json!({})));
    }

    #[test]
    fn test_numeric_comparisons() {
        let payload = json!({"hours_until_service": 40.0});
        let lte = cond("hours_until_service", ConditionOp::Lte, Some(json!(50)));
        let gt = cond("hours_until_service", ConditionOp::Gt, Some(json!(50)));
        assert!(ConditionMatcher::evaluate(&lte, &payload));
        assert!(!ConditionMatcher::evaluate(&gt, &payload));
    }

    #[test]
    fn test_numeric_string_is_coerced() {
        let payload = json!({"total_cents": "250000"});
        let c = cond("total_cents", ConditionOp::Gte, Some(json!(100000)));
        assert!(ConditionMatcher::evaluate(&c, &payload));
    }

    #[test]
    fn test_non_numeric_side_fails_comparison() {
        let payload = json!({"supplier": "Marine Parts Ltd"});
        let c = cond("supplier", ConditionOp::Gt, Some(json!(1)));
        assert!(!ConditionMatcher::evaluate(&c, &payload));
    }

    #[test]
    fn test_eq_numeric_vs_string() {
        let payload = json!({"quantity": 3});
        assert!(ConditionMatcher::evaluate(
            &cond("quantity", ConditionOp::Eq, Some(json!("3"))),
            &payload
        ));
        // Two strings compare as strings, not numbers
        let payload = json!({"code": "01"});
        assert!(!ConditionMatcher::evaluate(
            &cond("code", ConditionOp::Eq, Some(json!("1"))),
            &payload
        ));
    }

    #[test]
    fn test_eq_and_ne_strings() {
        let payload = json!({"kind": "incident"});
        assert!(ConditionMatcher::evaluate(
            &cond("kind", ConditionOp::Eq, Some(json!("incident"))),
            &payload
        ));
        assert!(!ConditionMatcher::evaluate(
            &cond("kind", ConditionOp::Eq, Some(json!("Incident"))),
            &payload
        ));
        assert!(ConditionMatcher::evaluate(
            &cond("kind", ConditionOp::Ne, Some(json!("deck"))),
            &payload
        ));
    }

    #[test]
    fn test_contains_string_and_array() {
        let payload = json!({"title": "Bilge alarm forward", "tags": ["safety", "bilge"]});
        assert!(ConditionMatcher::evaluate(
            &cond("title", ConditionOp::Contains, Some(json!("alarm"))),
            &payload
        ));
        assert!(ConditionMatcher::evaluate(
            &cond("tags", ConditionOp::Contains, Some(json!("safety"))),
            &payload
        ));
        assert!(!ConditionMatcher::evaluate(
            &cond("tags", ConditionOp::Contains, Some(json!("galley"))),
            &payload
        ));
    }

    #[test]
    fn test_in_operator() {
        let payload = json!({"currency": "EUR"});
        let c = cond("currency", ConditionOp::In, Some(json!(["EUR", "GBP"])));
        assert!(ConditionMatcher::evaluate(&c, &payload));
        let c = cond("currency", ConditionOp::In, Some(json!(["USD"])));
        assert!(!ConditionMatcher::evaluate(&c, &payload));
    }

    #[test]
    fn test_exists_treats_null_as_absent() {
        let payload = json!({"approved_by": null, "supplier": "X"});
        assert!(ConditionMatcher::evaluate(
            &cond("approved_by", ConditionOp::NotExists, None),
            &payload
        ));
        assert!(ConditionMatcher::evaluate(
            &cond("supplier", ConditionOp::Exists, None),
            &payload
        ));
        assert!(!ConditionMatcher::evaluate(
            &cond("missing", ConditionOp::Exists, None),
            &payload
        ));
    }

    #[test]
    fn test_missing_field_fails_value_ops() {
        let c = cond("absent", ConditionOp::Ne, Some(json!("x")));
        assert!(!ConditionMatcher::evaluate(&c, &json!({})));
    }

    #[test]
    fn test_dotted_lookup() {
        let payload = json!({"engine": {"name": "Starboard main"}});
        assert!(ConditionMatcher::evaluate(
            &cond("engine.name", ConditionOp::Eq, Some(json!("Starboard main"))),
            &payload
        ));
    }

    #[test]
    fn test_match_modes() {
        let payload = json!({"a": 1, "b": 2});
        let conditions = vec![
            cond("a", ConditionOp::Eq, Some(json!(1))),
            cond("b", ConditionOp::Eq, Some(json!(3))),
        ];
        assert!(!ConditionMatcher::matches(&conditions, MatchMode::All, &payload));
        assert!(ConditionMatcher::matches(&conditions, MatchMode::Any, &payload));
    }

    #[test]
    fn test_validate() {
        assert!(ConditionMatcher::validate(&[cond("a", ConditionOp::Exists, None)]).is_ok());
        assert!(ConditionMatcher::validate(&[cond(" ", ConditionOp::Exists, None)]).is_err());
        assert!(ConditionMatcher::validate(&[cond("a", ConditionOp::Gt, None)]).is_err());
        assert!(ConditionMatcher::validate(&[cond("a", ConditionOp::In, Some(json!("x")))]).is_err());
        assert!(ConditionMatcher::validate(&[cond("a", ConditionOp::In, Some(json!(["x"])))]).is_ok());
    }
}
