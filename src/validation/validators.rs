//! Built-in parameter validators.

use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

/// A pluggable check applied to one resolved value.
pub trait ParamValidator: Send + Sync {
    fn validator_type(&self) -> &'static str;

    fn validate(&self, value: &Value, config: &Value) -> bool;

    fn error_message(&self, param_name: &str, value: &Value, config: &Value) -> String;
}

fn config_usize(config: &Value, key: &str) -> Option<usize> {
    match config.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|v| usize::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `required`; `config: false` (or `{"required": false}`) turns it off.
pub struct RequiredValidator;

impl RequiredValidator {
    fn enabled(config: &Value) -> bool {
        match config {
            Value::Bool(flag) => *flag,
            Value::Object(map) => map.get("required").and_then(Value::as_bool).unwrap_or(true),
            _ => true,
        }
    }
}

impl ParamValidator for RequiredValidator {
    fn validator_type(&self) -> &'static str {
        "required"
    }

    fn validate(&self, value: &Value, config: &Value) -> bool {
        if !Self::enabled(config) {
            return true;
        }
        match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        }
    }

    fn error_message(&self, param_name: &str, _value: &Value, _config: &Value) -> String {
        format!("parameter {} must not be empty", param_name)
    }
}

/// `regex`: the whole string must match. Non-string values are skipped; an
/// uncompilable pattern fails.
#[derive(Default)]
pub struct RegexValidator {
    cache: Mutex<HashMap<String, Option<Regex>>>,
}

impl RegexValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn pattern(config: &Value) -> Option<&str> {
        match config {
            Value::String(p) => Some(p.as_str()),
            Value::Object(map) => map.get("pattern").and_then(Value::as_str),
            _ => None,
        }
    }

    fn compiled(&self, pattern: &str) -> Option<Regex> {
        let mut cache = self.cache.lock();
        cache
            .entry(pattern.to_string())
            .or_insert_with(|| Regex::new(&format!("^(?:{})$", pattern)).ok())
            .clone()
    }
}

impl ParamValidator for RegexValidator {
    fn validator_type(&self) -> &'static str {
        "regex"
    }

    fn validate(&self, value: &Value, config: &Value) -> bool {
        let (Some(text), Some(pattern)) = (value.as_str(), Self::pattern(config)) else {
            return true;
        };
        match self.compiled(pattern) {
            Some(re) => re.is_match(text),
            None => false,
        }
    }

    fn error_message(&self, param_name: &str, _value: &Value, _config: &Value) -> String {
        format!("parameter {} has invalid format", param_name)
    }
}

/// `stringLength{minLength?, maxLength?}`, counted in characters.
pub struct StringLengthValidator;

impl ParamValidator for StringLengthValidator {
    fn validator_type(&self) -> &'static str {
        "stringLength"
    }

    fn validate(&self, value: &Value, config: &Value) -> bool {
        let Some(text) = value.as_str() else {
            return true;
        };
        let len = text.chars().count();
        if let Some(min) = config_usize(config, "minLength") {
            if len < min {
                return false;
            }
        }
        if let Some(max) = config_usize(config, "maxLength") {
            if len > max {
                return false;
            }
        }
        true
    }

    fn error_message(&self, param_name: &str, value: &Value, config: &Value) -> String {
        let len = value.as_str().map(|s| s.chars().count()).unwrap_or(0);
        if let Some(min) = config_usize(config, "minLength").filter(|min| len < *min) {
            return format!("parameter {} length must not be less than {}", param_name, min);
        }
        if let Some(max) = config_usize(config, "maxLength").filter(|max| len > *max) {
            return format!("parameter {} length must not be greater than {}", param_name, max);
        }
        format!("parameter {} has invalid length", param_name)
    }
}

/// `dataType`: `string`, `json`, `int`/`integer`/`long`, `number`/`double`/
/// `float`, `boolean`, `array`/`iterable`, `map`/`object`. `Null` passes;
/// unknown type names pass.
pub struct DataTypeValidator;

impl DataTypeValidator {
    pub(crate) fn type_name(config: &Value) -> Option<String> {
        let name = match config {
            Value::String(name) => name.as_str(),
            Value::Object(map) => map.get("type").and_then(Value::as_str)?,
            _ => return None,
        };
        Some(name.trim().to_ascii_lowercase())
    }
}

impl ParamValidator for DataTypeValidator {
    fn validator_type(&self) -> &'static str {
        "dataType"
    }

    fn validate(&self, value: &Value, config: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        let Some(type_name) = Self::type_name(config) else {
            return true;
        };
        match type_name.as_str() {
            "string" => value.is_string(),
            "json" => value.is_string() || value.is_object() || value.is_array(),
            "int" | "integer" | "long" => value.is_i64() || value.is_u64(),
            "number" | "double" | "float" => value.is_number(),
            "boolean" | "bool" => value.is_boolean(),
            "array" | "iterable" | "list" => value.is_array(),
            "map" | "object" => value.is_object(),
            _ => true,
        }
    }

    fn error_message(&self, param_name: &str, _value: &Value, config: &Value) -> String {
        let expected = Self::type_name(config).unwrap_or_default();
        format!("parameter {} must be of type {}", param_name, expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required() {
        let v = RequiredValidator;
        assert!(!v.validate(&Value::Null, &Value::Null));
        assert!(!v.validate(&json!("   "), &Value::Null));
        assert!(!v.validate(&json!([]), &Value::Null));
        assert!(v.validate(&json!(0), &Value::Null));
        assert!(v.validate(&json!({}), &Value::Null));
        assert!(v.validate(&Value::Null, &json!(false)));
        assert!(v.validate(&Value::Null, &json!({"required": false})));
    }

    #[test]
    fn test_regex_full_match() {
        let v = RegexValidator::new();
        let cfg = json!("[0-9]{6}");
        assert!(v.validate(&json!("330100"), &cfg));
        assert!(!v.validate(&json!("330100x"), &cfg));
        assert!(v.validate(&json!(330100), &cfg));
        assert!(!v.validate(&json!("a"), &json!("(")));
        assert!(v.validate(&json!("abc"), &json!({"pattern": "[a-c]+"})));
    }

    #[test]
    fn test_string_length() {
        let v = StringLengthValidator;
        let cfg = json!({"minLength": 2, "maxLength": "4"});
        assert!(v.validate(&json!("abc"), &cfg));
        assert!(!v.validate(&json!("a"), &cfg));
        assert!(!v.validate(&json!("abcde"), &cfg));
        assert!(v.validate(&json!("浙江省"), &cfg));
        assert_eq!(
            v.error_message("name", &json!("a"), &cfg),
            "parameter name length must not be less than 2"
        );
        assert_eq!(
            v.error_message("name", &json!("abcde"), &cfg),
            "parameter name length must not be greater than 4"
        );
    }

    #[test]
    fn test_data_type() {
        let v = DataTypeValidator;
        assert!(v.validate(&json!("x"), &json!("String")));
        assert!(!v.validate(&json!(1), &json!("string")));
        assert!(v.validate(&json!(3), &json!("int")));
        assert!(!v.validate(&json!(3.5), &json!("long")));
        assert!(v.validate(&json!(3.5), &json!("double")));
        assert!(v.validate(&json!([1]), &json!("iterable")));
        assert!(v.validate(&json!({}), &json!("map")));
        assert!(v.validate(&json!("{}"), &json!("json")));
        assert!(v.validate(&Value::Null, &json!("boolean")));
        assert!(v.validate(&json!(1), &json!("something-else")));
    }
}
