//! `{{ placeholder }}` rendering for notification titles, bodies and dedupe keys.

use serde_json::Value;

use crate::condition::lookup;

/// Output of a render pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Placeholders with no value (missing key or `null`), in order of appearance.
    pub missing: Vec<String>,
}

/// Render `template` against `payload`.
///
/// Missing or `null` values render as the empty string and are reported in
/// [`Rendered::missing`]. An unterminated `{{` is copied literally.
pub fn render(template: &str, payload: &Value) -> Rendered {
    let mut text = String::with_capacity(template.len());
    let mut missing = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        text.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        let Some(end) = after_open.find("}}") else {
            text.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let key = after_open[..end].trim();
        match lookup(payload, key).and_then(format_value) {
            Some(value) => text.push_str(&value),
            None => {
                if !missing.iter().any(|m| m == key) {
                    missing.push(key.to_string());
                }
            }
        }
        rest = &after_open[end + 2..];
    }
    text.push_str(rest);

    Rendered { text, missing }
}

/// List the placeholder keys used by `template`, deduplicated, in order.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            break;
        };
        let key = after_open[..end].trim().to_string();
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
        rest = &after_open[end + 2..];
    }

    keys
}

fn format_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(|f| {
                    if f.fract() == 0.0 && f.abs() < 1e15 {
                        format!("{}", f as i64)
                    } else {
                        f.to_string()
                    }
                })
            }
        }
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_basic() {
        let out = render(
            "{{engine_name}} on {{ yacht_name }} needs service",
            &json!({"engine_name": "Port main", "yacht_name": "Aurora"}),
        );
        assert_eq!(out.text, "Port main on Aurora needs service");
        assert!(out.missing.is_empty());
    }

    #[test]
    fn test_render_numbers() {
        let out = render(
            "{{a}}/{{b}}/{{c}}",
            &json!({"a": 12, "b": 40.0, "c": 12.5}),
        );
        assert_eq!(out.text, "12/40/12.5");
    }

    #[test]
    fn test_render_missing_and_null() {
        let out = render(
            "PO {{po_number}} by {{requester}} {{requester}}",
            &json!({"po_number": "PO-7", "requester": null}),
        );
        assert_eq!(out.text, "PO PO-7 by  ");
        assert_eq!(out.missing, vec!["requester".to_string()]);
    }

    #[test]
    fn test_render_unterminated_is_literal() {
        let out = render("Hello {{name", &json!({"name": "x"}));
        assert_eq!(out.text, "Hello {{name");
    }

    #[test]
    fn test_render_bool_and_nested() {
        let out = render(
            "due={{service_due}} engine={{engine.name}}",
            &json!({"service_due": true, "engine": {"name": "Genset 1"}}),
        );
        assert_eq!(out.text, "due=true engine=Genset 1");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(
            placeholders("{{a}} {{ b }} {{a}} {{}} {{c"),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
