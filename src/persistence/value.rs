//! JSON ↔ Firestore typed-value codec.
//!
//! Firestore's REST API wraps every field in a type tag
//! (`{"stringValue": "x"}`, `{"integerValue": "42"}`, ...). Records are
//! serialized to plain JSON with serde first, then wrapped here.

use crate::persistence::error::{PersistenceError, PersistenceResult};
use serde_json::{json, Map, Number, Value};

/// Wrap a JSON object as a Firestore `fields` map.
pub fn encode_fields(object: &Value) -> PersistenceResult<Value> {
    let Value::Object(map) = object else {
        return Err(PersistenceError::Codec(format!(
            "Documents must serialize to a JSON object, got {object}"
        )));
    };
    Ok(Value::Object(encode_map(map)?))
}

fn encode_map(map: &Map<String, Value>) -> PersistenceResult<Map<String, Value>> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), encode_value(v)?)))
        .collect()
}

pub fn encode_value(value: &Value) -> PersistenceResult<Value> {
    let encoded = match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                // int64 travels as a decimal string
                json!({ "integerValue": i.to_string() })
            } else if n.is_u64() {
                return Err(PersistenceError::Codec(format!(
                    "Integer {n} does not fit in Firestore's int64"
                )));
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or(f64::NAN) })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            if items.is_empty() {
                json!({ "arrayValue": {} })
            } else {
                let values = items
                    .iter()
                    .map(encode_value)
                    .collect::<PersistenceResult<Vec<_>>>()?;
                json!({ "arrayValue": { "values": values } })
            }
        }
        Value::Object(map) => {
            let fields = encode_map(map)?;
            json!({ "mapValue": { "fields": fields } })
        }
    };
    Ok(encoded)
}

/// Unwrap a Firestore `fields` map back into a plain JSON object.
pub fn decode_fields(fields: &Value) -> PersistenceResult<Value> {
    match fields {
        Value::Object(map) => Ok(Value::Object(decode_map(map)?)),
        Value::Null => Ok(Value::Object(Map::new())),
        other => Err(PersistenceError::Codec(format!("Expected fields object, got {other}"))),
    }
}

fn decode_map(map: &Map<String, Value>) -> PersistenceResult<Map<String, Value>> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
        .collect()
}

pub fn decode_value(value: &Value) -> PersistenceResult<Value> {
    let Value::Object(tagged) = value else {
        return Err(PersistenceError::Codec(format!("Untagged value: {value}")));
    };
    let Some((tag, inner)) = tagged.iter().next() else {
        return Err(PersistenceError::Codec("Empty value object".into()));
    };

    match tag.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| PersistenceError::Codec(format!("Bad booleanValue: {inner}"))),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(|i| Value::Number(i.into()))
                .ok_or_else(|| PersistenceError::Codec(format!("Bad integerValue: {inner}")))
        }
        "doubleValue" => {
            let parsed = match inner {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            };
            // Non-finite doubles have no JSON representation
            Ok(parsed.and_then(Number::from_f64).map(Value::Number).unwrap_or(Value::Null))
        }
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(decode_value)
                    .collect::<PersistenceResult<Vec<_>>>()?,
                Some(other) => {
                    return Err(PersistenceError::Codec(format!("Bad arrayValue: {other}")))
                }
                None => Vec::new(),
            };
            Ok(Value::Array(values))
        }
        "mapValue" => decode_fields(inner.get("fields").unwrap_or(&Value::Null)),
        "geoPointValue" => Ok(inner.clone()),
        other => Err(PersistenceError::Codec(format!("Unsupported value type '{other}'"))),
    }
}
