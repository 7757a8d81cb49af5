//! camelCase to snake_case key normalisation for external payloads.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static LOWER_THEN_UPPER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("key pattern is valid"));
static ACRONYM_THEN_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").expect("key pattern is valid"));

/// Converts one key: `riskScore` to `risk_score`, `HTTPSEnabled` to `https_enabled`.
#[must_use]
pub fn camel_to_snake(name: &str) -> String {
    let split = LOWER_THEN_UPPER.replace_all(name, "${1}_${2}");
    ACRONYM_THEN_WORD
        .replace_all(&split, "${1}_${2}")
        .to_lowercase()
}

/// Recursively converts every object key in `map`.
#[must_use]
pub fn normalize_keys(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(k, v)| (camel_to_snake(&k), normalize_value(v)))
        .collect()
}

fn normalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(normalize_keys(map)),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_value).collect()),
        scalar => scalar,
    }
}
