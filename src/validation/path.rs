use serde_json::Value;

/// Resolve a dotted path against `source`.
///
/// Objects are entered by key and JSON strings holding an object are parsed
/// and entered. When a segment meets any other kind of value, that value is
/// returned as-is instead of failing. An empty path resolves to `Null`.
pub fn resolve_path(source: &Value, path: &str) -> Value {
    if path.trim().is_empty() {
        return Value::Null;
    }
    let mut current = source.clone();
    for segment in path.split('.') {
        current = match current {
            Value::Null => return Value::Null,
            Value::Object(mut map) => map.remove(segment).unwrap_or(Value::Null),
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(mut map)) => map.remove(segment).unwrap_or(Value::Null),
                _ => return Value::String(text),
            },
            other => return other,
        };
    }
    current
}
