//! Recursive rule evaluation with first-error reporting.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::path::resolve_path;
use super::registry::ValidatorRegistry;
use super::rule::{FieldRule, RuleSpec};
use super::validators::DataTypeValidator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// A validator of the given type rejected the value.
    Rule(String),
    /// A `dataType=json` value could not be parsed.
    MalformedJson,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationFailure {
    pub path: String,
    pub message: String,
    pub kind: FailureKind,
}

#[derive(Default)]
pub struct ValidationEngine {
    registry: ValidatorRegistry,
}

impl ValidationEngine {
    pub fn new(registry: ValidatorRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    /// Validate `target` against a rule tree, stopping at the first failure.
    pub fn validate(&self, target: &Value, rules: &[FieldRule]) -> Result<(), ValidationFailure> {
        for field in rules {
            let Some(path) = field.path() else {
                continue;
            };
            if field.rules.is_empty() {
                continue;
            }
            let value = resolve_path(target, path);
            self.evaluate(&value, &field.rules, path)?;
        }
        Ok(())
    }

    /// All rules at this level first, then recursion into nested rules.
    fn evaluate(&self, value: &Value, rules: &[RuleSpec], name: &str) -> Result<(), ValidationFailure> {
        for rule in rules {
            let Some(validator) = self.registry.get(&rule.kind) else {
                warn!(validator = %rule.kind, param = %name, "Unknown validator type, skipped");
                continue;
            };
            if !validator.validate(value, &rule.config) {
                return Err(ValidationFailure {
                    path: name.to_string(),
                    message: validator.error_message(name, value, &rule.config),
                    kind: FailureKind::Rule(rule.kind.clone()),
                });
            }
        }

        for rule in rules.iter().filter(|r| r.kind == "dataType") {
            let Some(type_name) = DataTypeValidator::type_name(&rule.config) else {
                continue;
            };
            match type_name.as_str() {
                "array" | "iterable" | "list" => {
                    self.recurse_elements(value, &rule.nested_rules, name)?
                }
                "map" | "object" => self.recurse_fields(value, &rule.nested_rules, name)?,
                "json" => self.recurse_json(value, &rule.nested_rules, name)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn recurse_elements(
        &self,
        value: &Value,
        nested: &[FieldRule],
        name: &str,
    ) -> Result<(), ValidationFailure> {
        let Value::Array(items) = value else {
            return Ok(());
        };
        for (index, item) in items.iter().enumerate() {
            let element = format!("{}[{}]", name, index);
            for field in nested {
                match field.path() {
                    Some(path) => {
                        let child = resolve_path(item, path);
                        self.evaluate(&child, &field.rules, &format!("{}.{}", element, path))?;
                    }
                    None => self.evaluate(item, &field.rules, &element)?,
                }
            }
        }
        Ok(())
    }

    fn recurse_fields(
        &self,
        value: &Value,
        nested: &[FieldRule],
        name: &str,
    ) -> Result<(), ValidationFailure> {
        if !value.is_object() {
            return Ok(());
        }
        for field in nested {
            match field.path() {
                Some(path) => {
                    let child = resolve_path(value, path);
                    self.evaluate(&child, &field.rules, &format!("{}.{}", name, path))?;
                }
                None => self.evaluate(value, &field.rules, name)?,
            }
        }
        Ok(())
    }

    fn recurse_json(
        &self,
        value: &Value,
        nested: &[FieldRule],
        name: &str,
    ) -> Result<(), ValidationFailure> {
        let document = match value {
            Value::String(text) => serde_json::from_str::<Value>(text).map_err(|_| {
                ValidationFailure {
                    path: name.to_string(),
                    message: format!("parameter {} is not valid JSON", name),
                    kind: FailureKind::MalformedJson,
                }
            })?,
            Value::Null => return Ok(()),
            other => other.clone(),
        };
        match document {
            Value::Array(_) => self.recurse_elements(&document, nested, name),
            _ => self.recurse_fields(&document, nested, name),
        }
    }
}
