//! Dynamic property values carried by entities.
//!
//! # Responsibility
//! - Define the single value shape stored in persisted/pending property maps.
//! - Provide lossless conversions from Rust primitives and JSON documents.
//!
//! # Invariants
//! - `DateTime` values always serialize as ISO-8601 (RFC 3339) strings.
//! - `Properties` iteration order is deterministic (sorted by field name).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Field name -> value map used for persisted and pending entity state.
pub type Properties = BTreeMap<String, Value>;

/// Equality filter used by `Datastore::find_custom`.
pub type Conditions = BTreeMap<String, Value>;

/// One dynamically-typed property value.
///
/// Serialized untagged so the external representation is plain JSON.
/// Variant order matters for deserialization: strings always decode as
/// `Text`, never as `DateTime`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view used by comparison rules.
    ///
    /// Text is accepted when it parses as a number, mirroring how form input
    /// usually arrives.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Text(value) => value.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Short type label used in diagnostics and validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::DateTime(_) => "datetime",
            Self::List(_) => "list",
        }
    }

    /// Converts to a JSON value, rendering timestamps as ISO-8601 strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(value) => serde_json::Value::Bool(*value),
            Self::Int(value) => serde_json::Value::from(*value),
            Self::Float(value) => serde_json::Number::from_f64(*value)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Text(value) => serde_json::Value::String(value.clone()),
            Self::DateTime(value) => serde_json::Value::String(iso8601(value)),
            Self::List(values) => {
                serde_json::Value::Array(values.iter().map(Value::to_json).collect())
            }
        }
    }
}

/// Renders a timestamp in the canonical ISO-8601 form used for serialization.
pub fn iso8601(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
            Self::DateTime(value) => write!(f, "{}", iso8601(value)),
            Self::List(values) => {
                write!(f, "[")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    /// Objects have no property-level representation and collapse to their
    /// JSON text.
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(value) => Self::Bool(value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(int) => Self::Int(int),
                None => Self::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(value) => Self::Text(value),
            serde_json::Value::Array(values) => {
                Self::List(values.into_iter().map(Value::from).collect())
            }
            object @ serde_json::Value::Object(_) => Self::Text(object.to_string()),
        }
    }
}

/// Builds a `Properties` map from a JSON object.
///
/// Returns `None` when `value` is not an object.
pub fn properties_from_json(value: serde_json::Value) -> Option<Properties> {
    match value {
        serde_json::Value::Object(map) => Some(
            map.into_iter()
                .map(|(key, value)| (key, Value::from(value)))
                .collect(),
        ),
        _ => None,
    }
}

/// Renders a property map as a JSON object.
pub fn properties_to_json(properties: &Properties) -> serde_json::Value {
    serde_json::Value::Object(
        properties
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::{properties_from_json, properties_to_json, Value};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn datetime_serializes_as_iso8601() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap();
        let value = Value::DateTime(at);

        assert_eq!(value.to_json(), json!("2026-03-01T12:30:00Z"));
        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!("2026-03-01T12:30:00Z")
        );
    }

    #[test]
    fn json_strings_decode_as_text_not_datetime() {
        let decoded: Value = serde_json::from_value(json!("2026-03-01T12:30:00Z")).unwrap();
        assert_eq!(decoded, Value::Text("2026-03-01T12:30:00Z".to_string()));
    }

    #[test]
    fn json_numbers_keep_integer_precision() {
        assert_eq!(Value::from(json!(42)), Value::Int(42));
        assert_eq!(Value::from(json!(1.5)), Value::Float(1.5));
    }

    #[test]
    fn numeric_text_is_comparable() {
        assert_eq!(Value::from(" 12 ").as_f64(), Some(12.0));
        assert_eq!(Value::from("twelve").as_f64(), None);
        assert_eq!(Value::Null.as_f64(), None);
    }

    #[test]
    fn properties_roundtrip_through_json_object() {
        let props = properties_from_json(json!({"id": 1, "title": "x", "tags": ["a"]})).unwrap();
        assert_eq!(props.get("id"), Some(&Value::Int(1)));
        assert_eq!(properties_to_json(&props), json!({"id": 1, "title": "x", "tags": ["a"]}));
        assert!(properties_from_json(json!([1, 2])).is_none());
    }
}
