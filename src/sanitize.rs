//! Input sanitization applied to every decoded JSON body before validation.
//!
//! Two passes, both recursive and idempotent:
//! 1. object keys starting with `$` or containing `.` are dropped (query-operator injection)
//! 2. string values are trimmed and `<` is escaped to `&lt;` (markup injection)

use serde_json::{Map, Value};

/// Sanitize a JSON value in place.
pub fn sanitize(value: &mut Value) {
    match value {
        Value::String(text) => {
            let cleaned = clean_text(text);
            if cleaned != *text {
                *text = cleaned;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(sanitize),
        Value::Object(map) => sanitize_object(map),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Owned variant of [`sanitize`].
pub fn sanitized(mut value: Value) -> Value {
    sanitize(&mut value);
    value
}

fn sanitize_object(map: &mut Map<String, Value>) {
    map.retain(|key, _| !is_operator_key(key));
    map.values_mut().for_each(sanitize);
}

fn is_operator_key(key: &str) -> bool {
    key.starts_with('$') || key.contains('.')
}

fn clean_text(text: &str) -> String {
    text.trim().replace('<', "&lt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn escapes_markup_and_trims() {
        let out = sanitized(json!({ "name": "  <script>alert(1)</script> " }));
        assert_eq!(out, json!({ "name": "&lt;script>alert(1)&lt;/script>" }));
    }

    #[test]
    fn drops_operator_keys_at_any_depth() {
        let out = sanitized(json!({
            "email": { "$gt": "" },
            "a.b": 1,
            "nested": [{ "$where": "1", "ok": true }],
            "plain": "x"
        }));
        assert_eq!(
            out,
            json!({ "email": {}, "nested": [{ "ok": true }], "plain": "x" })
        );
    }

    #[test]
    fn sanitizing_twice_changes_nothing() {
        let once = sanitized(json!({ "topic": " <b>Exam</b> ", "$x": 1, "n": 5 }));
        let twice = sanitized(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn leaves_non_strings_alone() {
        let value = json!({ "totalLectures": 40, "active": true, "none": null });
        assert_eq!(sanitized(value.clone()), value);
    }
}
