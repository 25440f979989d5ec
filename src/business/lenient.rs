//! Forgiving deserializers for upstream payloads.
//!
//! Business APIs are edited by hand and return numbers as strings, strings
//! as numbers, and `null` where a list is expected. These helpers accept all
//! of that instead of failing the whole payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Any scalar as trimmed text; `null`, arrays and objects become `""`.
pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(value_text(&Value::deserialize(d)?))
}

pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_owned(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// A number, or a string holding one. Anything else is `None`.
pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(value_number(&Value::deserialize(d)?))
}

pub(crate) fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Like [`number`] but required, for fields the model must supply.
pub fn required_number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(d)?;
    value_number(&value).ok_or_else(|| serde::de::Error::custom(format!("expected a number, got {value}")))
}

/// Non-negative integer given as a number or numeric string.
pub fn integer<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(d)?;
    let parsed = match &value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| serde::de::Error::custom(format!("expected an integer, got {value}")))
}

/// A list, treating `null` or a non-array as empty. Items that fail to decode
/// are skipped.
pub fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(value_list(Value::deserialize(d)?))
}

/// Like [`list`], but also accepts the list JSON-encoded inside a string.
pub fn embedded_list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = match Value::deserialize(d)? {
        Value::String(raw) => serde_json::from_str(&raw).map_err(serde::de::Error::custom)?,
        other => other,
    };
    Ok(value_list(value))
}

pub(crate) fn value_list<T: DeserializeOwned>(value: Value) -> Vec<T> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Read `field` of an upstream envelope as a list.
pub(crate) fn field_list<T: DeserializeOwned>(body: &Value, field: &str) -> Vec<T> {
    body.get(field).cloned().map(value_list).unwrap_or_default()
}
