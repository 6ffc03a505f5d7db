//! Bridging between [`Value`] trees, `serde_json` documents and typed data.
//!
//! Numbers follow one policy in both directions so that a leaf read back from
//! the store compares equal to the one written:
//!
//! - a JSON number that fits `i64` becomes [`Value::Integer`];
//! - anything else (fractions, or unsigned values above `i64::MAX`) becomes
//!   [`Value::Float`], accepting the precision loss;
//! - a non-finite float has no JSON form and is written as `null`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value as Json};

use crate::CodecError;
use crate::Value;

/// Deserialize a typed value out of a stored tree.
///
/// Used by the typed `get_as` accessors; a shape mismatch is a
/// [`CodecError::Decode`].
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, CodecError> {
    serde_json::from_value(value_to_json(value)).map_err(|err| CodecError::Decode {
        message: err.to_string(),
    })
}

/// Serialize typed data into a tree ready to be flattened and stored.
pub fn to_value<T: Serialize>(data: &T) -> Result<Value, CodecError> {
    serde_json::to_value(data)
        .map(json_to_value)
        .map_err(|err| CodecError::Encode {
            message: err.to_string(),
        })
}

pub fn value_to_json(value: Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(flag) => Json::Bool(flag),
        Value::Integer(n) => Json::Number(n.into()),
        Value::Float(f) => Number::from_f64(f).map_or(Json::Null, Json::Number),
        Value::String(text) => Json::String(text),
        Value::Array(items) => Json::Array(items.into_iter().map(value_to_json).collect()),
        Value::Map(entries) => Json::Object(
            entries
                .into_iter()
                .map(|(name, child)| (name, value_to_json(child)))
                .collect::<Map<_, _>>(),
        ),
    }
}

pub fn json_to_value(json: Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(flag) => Value::Bool(flag),
        Json::Number(n) => number_to_value(&n),
        Json::String(text) => Value::String(text),
        Json::Array(items) => Value::Array(items.into_iter().map(json_to_value).collect()),
        Json::Object(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(name, child)| (name, json_to_value(child)))
                .collect(),
        ),
    }
}

fn number_to_value(n: &Number) -> Value {
    match n.as_i64() {
        Some(i) => Value::Integer(i),
        // Without arbitrary precision every JSON number has an f64 form
        None => n.as_f64().map_or(Value::Null, Value::Float),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        age: u32,
        tags: Vec<String>,
    }

    #[test]
    fn roundtrip_struct() {
        let original = Profile {
            name: "Alice".to_string(),
            age: 30,
            tags: vec!["admin".to_string()],
        };

        let value = to_value(&original).unwrap();
        assert!(value.is_map());
        let recovered: Profile = from_value(value).unwrap();

        assert_eq!(original, recovered);
    }

    #[test]
    fn from_value_type_mismatch() {
        let result: Result<Profile, _> = from_value(Value::from("not a profile"));
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }

    #[test]
    fn json_to_value_numbers() {
        let json = serde_json::json!({
            "integer": 42,
            "float": 2.75,
            "negative": -100,
            "huge": u64::MAX
        });

        let value = json_to_value(json);
        let map = value.as_map().unwrap();
        assert_eq!(map.get("integer"), Some(&Value::Integer(42)));
        assert_eq!(map.get("negative"), Some(&Value::Integer(-100)));
        match map.get("float") {
            Some(Value::Float(f)) => assert!((f - 2.75).abs() < 0.001),
            other => panic!("expected float, got {:?}", other),
        }
        assert!(matches!(map.get("huge"), Some(Value::Float(_))));
    }

    #[test]
    fn unsigned_above_i64_reads_back_as_float() {
        let value = json_to_value(serde_json::json!(u64::MAX));
        assert_eq!(value, Value::Float(u64::MAX as f64));
        assert_eq!(json_to_value(value_to_json(value.clone())), value);
    }

    #[test]
    fn value_to_json_nan_becomes_null() {
        assert_eq!(value_to_json(Value::Float(f64::NAN)), serde_json::Value::Null);
        assert_eq!(
            value_to_json(Value::Float(f64::INFINITY)),
            serde_json::Value::Null
        );
    }

    #[test]
    fn value_to_json_nested() {
        let value = Value::Array(vec![
            Value::Integer(1),
            Value::map(),
            Value::String("s".to_string()),
        ]);
        assert_eq!(value_to_json(value), serde_json::json!([1, {}, "s"]));
    }
}
