use serde_json::{Map, Value};

pub fn canonicalize_json_value(value: &Value) -> Value {
    match value {
        Value::Array(values) => {
            Value::Array(values.iter().map(canonicalize_json_value).collect::<Vec<_>>())
        }
        Value::Object(map) => Value::Object(canonicalize_map(map)),
        other => other.clone(),
    }
}

pub fn canonicalize_map(map: &Map<String, Value>) -> Map<String, Value> {
    let mut entries = map.iter().collect::<Vec<_>>();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut out = Map::with_capacity(map.len());
    for (k, v) in entries {
        out.insert(k.clone(), canonicalize_json_value(v));
    }
    out
}

pub fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    let canonical = canonicalize_json_value(value);
    serde_json::to_vec(&canonical).unwrap_or_else(|_| b"null".to_vec())
}

pub fn canonical_json_string(value: &Value) -> String {
    String::from_utf8(canonical_json_bytes(value)).unwrap_or_else(|_| "null".to_string())
}

pub fn canonical_map_string(map: &Map<String, Value>) -> String {
    canonical_json_string(&Value::Object(map.clone()))
}
