//! Canonical cache keys for (endpoint, payload) pairs
//!
//! The key is the endpoint (JSON-quoted, so it can never bleed into the
//! payload part) followed by a canonical JSON rendering of the payload:
//! object fields sorted by key, arrays in order, scalars by value.

use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Opaque, order-independent key for one logical request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Build the key for an already-materialized JSON payload.
///
/// Never fails: every `serde_json::Value` is representable.
pub fn build_key(endpoint: &str, payload: &Value) -> CacheKey {
    let mut out = String::with_capacity(endpoint.len() + 32);
    write_json_string(endpoint, &mut out);
    out.push(':');
    write_canonical(payload, &mut out);
    CacheKey(out)
}

/// Build the key for any serializable payload.
///
/// Fails with [`Error::Serialization`] when the payload has no JSON form
/// (for example a map whose keys are not strings).
pub fn try_build_key<T: Serialize + ?Sized>(endpoint: &str, payload: &T) -> Result<CacheKey> {
    let value = serde_json::to_value(payload).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(build_key(endpoint, &value))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_json_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Map iteration order depends on serde_json's `preserve_order`
            // feature, so sort explicitly.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(key, out);
                out.push(':');
                if let Some(v) = map.get(key) {
                    write_canonical(v, out);
                }
            }
            out.push('}');
        }
    }
}

fn write_json_string(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_owned()).to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_key_order_independent() {
        let a = build_key("cohort", &json!({"a": 1, "b": 2}));
        let b = build_key("cohort", &json!({"b": 2, "a": 1}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_nested_order_independent() {
        let a = build_key(
            "cost-benefit",
            &json!({"filters": {"breed": "Saanen", "sex": "F"}, "range": [1, 2]}),
        );
        let b = build_key(
            "cost-benefit",
            &json!({"range": [1, 2], "filters": {"sex": "F", "breed": "Saanen"}}),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_content_sensitive() {
        let a = build_key("cohort", &json!({"a": 1}));
        let b = build_key("cohort", &json!({"a": 2}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_array_order_matters() {
        let a = build_key("cohort", &json!([1, 2]));
        let b = build_key("cohort", &json!([2, 1]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_endpoint_sensitive() {
        let payload = json!({"a": 1});
        assert_ne!(build_key("cohort", &payload), build_key("cost-benefit", &payload));
    }

    #[test]
    fn test_key_endpoint_cannot_bleed_into_payload() {
        // Without quoting, `a:"b"` + null and `a` + `"b":null`-like shapes
        // could render identically.
        let a = build_key("a:\"b\"", &Value::Null);
        let b = build_key("a", &json!("b\":null"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_type_sensitive() {
        assert_ne!(build_key("e", &json!(1)), build_key("e", &json!("1")));
        assert_ne!(build_key("e", &json!(null)), build_key("e", &json!("null")));
    }

    #[test]
    fn test_key_format() {
        let key = build_key("cohort", &json!({"b": [true, null], "a": "x"}));
        assert_eq!(key.as_str(), r#""cohort":{"a":"x","b":[true,null]}"#);
    }

    #[test]
    fn test_try_build_key_matches_value_form() {
        #[derive(Serialize)]
        struct Query {
            breed: &'static str,
            months: u32,
        }

        let typed = try_build_key("cohort", &Query { breed: "Nubian", months: 6 }).unwrap();
        let untyped = build_key("cohort", &json!({"months": 6, "breed": "Nubian"}));
        assert_eq!(typed, untyped);
    }

    #[test]
    fn test_try_build_key_rejects_non_string_keys() {
        let mut payload: HashMap<(u8, u8), u8> = HashMap::new();
        payload.insert((1, 2), 3);

        let err = try_build_key("cohort", &payload).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
