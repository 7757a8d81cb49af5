//! Content-hash idempotency keys.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Derives idempotency keys from payloads.
///
/// Excluded top-level fields are dropped, object keys are sorted at every
/// depth, and the compact JSON encoding is hashed with SHA-256. The key is
/// the full lowercase hex digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDeriver {
    excluded: BTreeSet<String>,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new(["received_at", "correlation_id", "retry_count", "source_ip"])
    }
}

impl KeyDeriver {
    /// Creates a deriver that ignores the given top-level fields.
    pub fn new<I, S>(excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: excluded.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the ignored field names.
    pub fn excluded_fields(&self) -> impl Iterator<Item = &str> {
        self.excluded.iter().map(String::as_str)
    }

    /// Returns the deterministic encoding that gets hashed.
    #[must_use]
    pub fn canonical_bytes(&self, payload: &Value) -> Vec<u8> {
        let filtered = match payload {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(k, _)| !self.excluded.contains(k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            other => other.clone(),
        };
        // Serializing a Value cannot fail: every map key is already a string.
        serde_json::to_vec(&sorted(filtered)).unwrap_or_default()
    }

    /// Derives the key for a payload.
    #[must_use]
    pub fn derive(&self, payload: &Value) -> String {
        let digest = Sha256::digest(self.canonical_bytes(payload));
        hex::encode(digest)
    }
}

fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = Map::with_capacity(entries.len());
            for (k, v) in entries {
                out.insert(k, sorted(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_is_full_sha256_hex() {
        let key = KeyDeriver::default().derive(&json!({"company_id": "ACME-001"}));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_field_order_does_not_matter() {
        let deriver = KeyDeriver::default();
        let a: Value = serde_json::from_str(
            r#"{"company_id":"X","revenue":100,"address":{"city":"Austin","state":"TX"}}"#,
        )
        .unwrap();
        let b: Value = serde_json::from_str(
            r#"{"address":{"state":"TX","city":"Austin"},"revenue":100,"company_id":"X"}"#,
        )
        .unwrap();
        assert_eq!(deriver.derive(&a), deriver.derive(&b));
    }

    #[test]
    fn test_excluded_fields_do_not_matter() {
        let deriver = KeyDeriver::default();
        let a = json!({"company_id": "X", "received_at": "2024-01-01T00:00:00Z", "retry_count": 0});
        let b = json!({"company_id": "X", "received_at": "2024-01-02T09:30:00Z", "retry_count": 4,
                       "correlation_id": "abc", "source_ip": "10.0.0.1"});
        assert_eq!(deriver.derive(&a), deriver.derive(&b));
    }

    #[test]
    fn test_included_field_change_changes_key() {
        let deriver = KeyDeriver::default();
        let a = json!({"company_id": "X", "revenue": 100});
        let b = json!({"company_id": "X", "revenue": 101});
        let c = json!({"company_id": "X", "revenue": 100, "state": "TX"});
        assert_ne!(deriver.derive(&a), deriver.derive(&b));
        assert_ne!(deriver.derive(&a), deriver.derive(&c));
    }

    #[test]
    fn test_exclusion_is_top_level_only() {
        let deriver = KeyDeriver::default();
        let a = json!({"meta": {"received_at": 1}});
        let b = json!({"meta": {"received_at": 2}});
        assert_ne!(deriver.derive(&a), deriver.derive(&b));
    }

    #[test]
    fn test_custom_exclusions() {
        let deriver = KeyDeriver::new(["batch_id"]);
        assert_eq!(deriver.excluded_fields().collect::<Vec<_>>(), vec!["batch_id"]);
        let a = json!({"company_id": "X", "batch_id": 1});
        let b = json!({"company_id": "X", "batch_id": 2});
        assert_eq!(deriver.derive(&a), deriver.derive(&b));
    }

    #[test]
    fn test_canonical_bytes_are_sorted() {
        let deriver = KeyDeriver::default();
        let bytes = deriver.canonical_bytes(&json!({"b": 1, "a": {"d": 2, "c": 3}}));
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"a":{"c":3,"d":2},"b":1}"#);
    }
}
