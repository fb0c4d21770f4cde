use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rules attached to one field, addressed by a dotted path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRule {
    #[serde(default, alias = "paramName")]
    pub param_path: Option<String>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub nested_rules: Vec<FieldRule>,
}

impl FieldRule {
    pub fn new(path: impl Into<String>, rules: Vec<RuleSpec>) -> Self {
        Self {
            param_path: Some(path.into()),
            rules,
        }
    }

    /// Rules applied to the value itself rather than a child field.
    pub fn on_self(rules: Vec<RuleSpec>) -> Self {
        Self {
            param_path: None,
            rules,
        }
    }

    pub(crate) fn path(&self) -> Option<&str> {
        self.param_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

impl RuleSpec {
    pub fn new(kind: impl Into<String>, config: Value) -> Self {
        Self {
            kind: kind.into(),
            config,
            nested_rules: Vec::new(),
        }
    }

    pub fn required() -> Self {
        Self::new("required", Value::Null)
    }

    pub fn data_type(type_name: &str, nested_rules: Vec<FieldRule>) -> Self {
        Self {
            kind: "dataType".into(),
            config: Value::String(type_name.into()),
            nested_rules,
        }
    }
}

/// Parse a rule tree given either as a JSON array or as JSON text.
pub fn parse_rules(value: &Value) -> Result<Vec<FieldRule>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(text) if text.trim().is_empty() => Ok(Vec::new()),
        Value::String(text) => serde_json::from_str(text).map_err(|e| e.to_string()),
        other => serde_json::from_value(other.clone()).map_err(|e| e.to_string()),
    }
}
