//! Forgiving deserializers for upstream fields.
//!
//! Upstream APIs send the same field as a number, a numeric string, an array or
//! nothing at all depending on endpoint and record age. These helpers turn any of
//! those into an `Option`, so a single odd field never rejects a whole record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// String, number, or first usable element of an array
pub fn string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_string))
}

/// Non-negative integer from a number or numeric string; fractions are truncated
pub fn unsigned<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(value_to_f64)
        .filter(|n| *n >= 0.0)
        .map(|n| n as u64))
}

/// Signed integer from a number or numeric string
pub fn signed<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_f64).map(|n| n as i64))
}

/// Floating point number from a number or numeric string
pub fn float<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_f64))
}

/// Tag weights from `{"rock": 3, "indie": "1"}` or a ranked list `["rock", "indie"]`
pub fn tags<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let mut tags = BTreeMap::new();

    match value {
        Some(Value::Object(map)) => {
            for (tag, weight) in map {
                tags.insert(tag, value_to_f64(&weight).unwrap_or(0.0));
            }
        }
        Some(Value::Array(items)) => {
            let count = items.len();
            for (index, item) in items.iter().enumerate() {
                if let Some(tag) = value_to_string(item) {
                    tags.insert(tag, (count - index) as f64);
                }
            }
        }
        _ => {}
    }

    Ok(tags)
}

/// Nested record that must be a JSON object; any other shape is `None`
pub fn object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .filter(Value::is_object)
        .and_then(|v| serde_json::from_value(v).ok()))
}

/// Best-effort string view of a JSON value
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(value_to_string),
        _ => None,
    }
}

/// Best-effort numeric view of a JSON value
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}
