//! Firestore REST API types and JSON conversion.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value as Json};

use crate::backend::JsonMap;

/// Firestore document value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    pub fields: Option<HashMap<String, Value>>,
}

/// Firestore document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name
    pub name: Option<String>,
    pub fields: Option<HashMap<String, Value>>,
    pub create_time: Option<String>,
    /// Update time, used as the write precondition
    pub update_time: Option<String>,
}

impl Document {
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    /// Document body as a JSON object.
    pub fn to_json(&self) -> JsonMap {
        self.fields
            .as_ref()
            .map(fields_to_json)
            .unwrap_or_default()
    }
}

// =============================================================================
// JSON <-> Firestore
// =============================================================================

/// Convert a JSON value to its Firestore representation.
///
/// Integers map to `integerValue`, other numbers to `doubleValue`.
/// Timestamps are plain strings in JSON and stay `stringValue`.
pub fn json_to_value(value: &Json) -> Value {
    match value {
        Json::Null => Value::NullValue(()),
        Json::Bool(b) => Value::BooleanValue(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::IntegerValue(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Value::IntegerValue(u.to_string())
            } else {
                Value::DoubleValue(n.as_f64().unwrap_or(0.0))
            }
        }
        Json::String(s) => Value::StringValue(s.clone()),
        Json::Array(items) => Value::ArrayValue(ArrayValue {
            values: Some(items.iter().map(json_to_value).collect()),
        }),
        Json::Object(map) => Value::MapValue(MapValue {
            fields: Some(json_to_fields(map)),
        }),
    }
}

/// Convert a Firestore value back to JSON.
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::NullValue(()) => Json::Null,
        Value::BooleanValue(b) => Json::Bool(*b),
        Value::IntegerValue(s) => s
            .parse::<i64>()
            .map(Json::from)
            .or_else(|_| s.parse::<u64>().map(Json::from))
            .unwrap_or(Json::Null),
        Value::DoubleValue(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
        Value::TimestampValue(s)
        | Value::StringValue(s)
        | Value::BytesValue(s)
        | Value::ReferenceValue(s) => Json::String(s.clone()),
        Value::ArrayValue(array) => Json::Array(
            array
                .values
                .as_ref()
                .map(|values| values.iter().map(value_to_json).collect())
                .unwrap_or_default(),
        ),
        Value::MapValue(map) => Json::Object(
            map.fields
                .as_ref()
                .map(fields_to_json)
                .unwrap_or_default(),
        ),
    }
}

pub fn json_to_fields(map: &JsonMap) -> HashMap<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), json_to_value(v)))
        .collect()
}

pub fn fields_to_json(fields: &HashMap<String, Value>) -> JsonMap {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), value_to_json(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integers_are_sent_as_strings() {
        let v = json_to_value(&json!(42));
        assert_eq!(v, Value::IntegerValue("42".into()));
        assert_eq!(serde_json::to_value(&v).unwrap(), json!({"integerValue": "42"}));
    }

    #[test]
    fn test_nested_document_conversion() {
        let body = json!({
            "id": "v1",
            "version": 3,
            "progress": 0.1,
            "subtitles": [{"start_time": 0.0, "text": "hi"}],
            "analytics": null,
            "state": {"status": "processing"}
        });
        let Json::Object(map) = body.clone() else {
            unreachable!()
        };

        let fields = json_to_fields(&map);
        assert_eq!(Json::Object(fields_to_json(&fields)), body);
    }

    #[test]
    fn test_document_parses_rest_payload() {
        let doc: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/vlogs/v1",
            "fields": {
                "version": {"integerValue": "7"},
                "title": {"stringValue": "Trip"},
                "created_at": {"timestampValue": "2024-01-01T00:00:00Z"}
            },
            "updateTime": "2024-01-01T00:00:01.000001Z"
        }))
        .unwrap();

        let body = doc.to_json();
        assert_eq!(body["version"], 7);
        assert_eq!(body["title"], "Trip");
        assert_eq!(body["created_at"], "2024-01-01T00:00:00Z");
        assert_eq!(doc.update_time.as_deref(), Some("2024-01-01T00:00:01.000001Z"));
    }
}
