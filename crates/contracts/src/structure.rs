//! Self-describing value form exchanged with backends.
//!
//! Handlers never build a [`Struct`] by hand: the only way in is [`encode`]
//! (or [`encode_map`]) and the only way out is [`decode`].
//!
//! Numbers travel as `f64`, so `1.0` and `1` are indistinguishable on the
//! wire; integral values decode as integers. `-0.0` keeps its sign.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number};

/// Largest integer magnitude that survives the trip through `f64`.
const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Struct {
    #[serde(default)]
    fields: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    NullValue,
    NumberValue(f64),
    StringValue(String),
    BoolValue(bool),
    StructValue(Struct),
    ListValue(ListValue),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListValue {
    #[serde(default)]
    values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    Serialize(String),
    NotAnObject,
    LossyInteger { path: String },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::Serialize(err) => write!(f, "value is not serializable: {}", err),
            EncodeError::NotAnObject => write!(f, "structured value must be a JSON object"),
            EncodeError::LossyInteger { path } => {
                write!(f, "integer at `{}` cannot be represented exactly", path)
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// Encodes any serializable object into the structured form.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Struct, EncodeError> {
    let value = serde_json::to_value(value).map_err(|err| EncodeError::Serialize(err.to_string()))?;
    match value {
        serde_json::Value::Object(map) => encode_map(&map),
        _ => Err(EncodeError::NotAnObject),
    }
}

pub fn encode_map(map: &Map<String, serde_json::Value>) -> Result<Struct, EncodeError> {
    encode_object(map, "")
}

pub fn decode(value: &Struct) -> Map<String, serde_json::Value> {
    value
        .fields
        .iter()
        .map(|(k, v)| (k.clone(), decode_value(v)))
        .collect()
}

fn encode_object(map: &Map<String, serde_json::Value>, path: &str) -> Result<Struct, EncodeError> {
    let mut fields = BTreeMap::new();
    for (key, value) in map {
        let child = if path.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", path, key)
        };
        fields.insert(key.clone(), encode_value(value, &child)?);
    }
    Ok(Struct { fields })
}

fn encode_value(value: &serde_json::Value, path: &str) -> Result<Value, EncodeError> {
    Ok(match value {
        serde_json::Value::Null => Value::NullValue,
        serde_json::Value::Bool(v) => Value::BoolValue(*v),
        serde_json::Value::String(v) => Value::StringValue(v.clone()),
        serde_json::Value::Number(n) => Value::NumberValue(encode_number(n, path)?),
        serde_json::Value::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                values.push(encode_value(item, &format!("{}[{}]", path, idx))?);
            }
            Value::ListValue(ListValue { values })
        }
        serde_json::Value::Object(map) => Value::StructValue(encode_object(map, path)?),
    })
}

fn encode_number(n: &Number, path: &str) -> Result<f64, EncodeError> {
    if let Some(v) = n.as_u64() {
        if v > MAX_SAFE_INTEGER {
            return Err(EncodeError::LossyInteger {
                path: path.to_string(),
            });
        }
        return Ok(v as f64);
    }
    if let Some(v) = n.as_i64() {
        if v.unsigned_abs() > MAX_SAFE_INTEGER {
            return Err(EncodeError::LossyInteger {
                path: path.to_string(),
            });
        }
        return Ok(v as f64);
    }
    n.as_f64().ok_or_else(|| EncodeError::LossyInteger {
        path: path.to_string(),
    })
}

fn decode_value(value: &Value) -> serde_json::Value {
    match value {
        Value::NullValue => serde_json::Value::Null,
        Value::BoolValue(v) => serde_json::Value::Bool(*v),
        Value::StringValue(v) => serde_json::Value::String(v.clone()),
        Value::NumberValue(v) => decode_number(*v),
        Value::ListValue(list) => {
            serde_json::Value::Array(list.values.iter().map(decode_value).collect())
        }
        Value::StructValue(s) => serde_json::Value::Object(decode(s)),
    }
}

fn decode_number(v: f64) -> serde_json::Value {
    let negative_zero = v == 0.0 && v.is_sign_negative();
    if !negative_zero && v.fract() == 0.0 && v.abs() <= MAX_SAFE_INTEGER as f64 {
        return serde_json::Value::Number(Number::from(v as i64));
    }
    Number::from_f64(v)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}
