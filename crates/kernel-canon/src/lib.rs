//! Canonical textual encoding and fingerprinting (spec §4.3).
//!
//! The canonical form is implemented directly against `serde_json::Value`
//! rather than relying on any JSON library's default key ordering — per
//! spec §9, the fingerprint scheme must pin its own canonical form so that
//! determinism does not depend on an upstream crate's internal behavior.

#![deny(unsafe_code)]

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Produce a stable textual representation of a JSON-like value.
///
/// - `Value::Null` and absent fields canonicalize to `"null"`.
/// - Numbers render via their exact textual form (`serde_json` preserves
///   the original decimal text for numbers it cannot represent losslessly
///   as `f64`, but to stay exact regardless we re-render integers and
///   floats through their own `Display`, never through `f64` round-trips
///   for values that came in as strings).
/// - Objects sort keys lexicographically before rendering.
/// - Arrays preserve input order.
/// - Strings render as their literal text, not re-quoted JSON.
pub fn canonicalize(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", rendered.join(","))
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let rendered: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", k, canonicalize(&map[k])))
                .collect();
            format!("{{{}}}", rendered.join(","))
        }
    }
}

/// Compute a SHA-256 fingerprint over `field=canonical(value)` pairs for
/// the selected fields, joined with `|`, truncated to 16 hex characters.
///
/// Fields absent from `payload` canonicalize as `null`, matching
/// `canonicalize`'s treatment of missing data — a field you forgot to
/// populate still produces a deterministic (if perhaps wrong) fingerprint
/// rather than panicking.
pub fn fingerprint(selected_fields: &[&str], payload: &Value) -> String {
    let parts: Vec<String> = selected_fields
        .iter()
        .map(|field| {
            let value = payload.get(field).unwrap_or(&Value::Null);
            format!("{}={}", field, canonicalize(value))
        })
        .collect();
    let joined = parts.join("|");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn object_keys_sort_regardless_of_insertion_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn array_order_is_preserved() {
        let a = json!([1, 2, 3]);
        let b = json!([3, 2, 1]);
        assert_ne!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn missing_field_canonicalizes_to_null() {
        let payload = json!({"amount": 100});
        let fp_present = fingerprint(&["amount"], &payload);
        let fp_with_missing = fingerprint(&["amount", "missing_field"], &payload);
        assert_ne!(fp_present, fp_with_missing);
    }

    #[test]
    fn fingerprint_is_16_hex_chars() {
        let fp = fingerprint(&["x"], &json!({"x": 1}));
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    proptest! {
        #[test]
        fn fingerprint_is_deterministic(amount in 0i64..1_000_000, label in "[a-z]{1,10}") {
            let payload = json!({"amount": amount, "label": label});
            let a = fingerprint(&["amount", "label"], &payload);
            let b = fingerprint(&["amount", "label"], &payload);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn canonicalize_is_deterministic_for_structurally_equal_objects(
            a in 0i64..1000, b in 0i64..1000
        ) {
            let lhs = json!({"a": a, "b": b});
            let rhs = json!({"b": b, "a": a});
            prop_assert_eq!(canonicalize(&lhs), canonicalize(&rhs));
        }
    }
}
