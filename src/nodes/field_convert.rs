use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::core::process_context::{keys, ProcessContext};
use crate::error::{NodeError, NodeResult};

use super::executor::settle;
use super::Node;

/// Renames keys of the `dataSource` value (default `requestParams`) per
/// `convertRules`, descending into nested objects and arrays, and writes
/// the result to `targetDataKey`. The target defaults to `requestParams`
/// when converting request parameters and to `responseData` otherwise.
pub struct FieldNameConvertNode;

impl FieldNameConvertNode {
    pub const ID: &'static str = "fieldNameConvertNode";

    fn rules(context: &ProcessContext) -> NodeResult<Option<HashMap<String, String>>> {
        let raw = match context.node_config().and_then(|cfg| cfg.get("convertRules")) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(text)) => serde_json::from_str::<Value>(text)
                .map_err(|e| NodeError::Config(format!("invalid convertRules: {}", e)))?,
            Some(other) => other.clone(),
        };
        let Value::Object(map) = raw else {
            return Err(NodeError::Config("convertRules must be an object".into()));
        };
        let rules = map
            .into_iter()
            .filter_map(|(from, to)| to.as_str().map(|to| (from, to.to_string())))
            .collect::<HashMap<_, _>>();
        Ok(Some(rules))
    }

    fn source(context: &ProcessContext, alias: &str) -> Option<Value> {
        match alias {
            keys::REQUEST_PARAMS => Some(Value::Object(context.request_params.clone())),
            keys::RESPONSE_DATA => context.response_data.clone(),
            other => context.attribute(other).cloned(),
        }
    }

    fn run(context: &mut ProcessContext) -> NodeResult<()> {
        let Some(rules) = Self::rules(context)? else {
            debug!(request_id = %context.request_id(), "No convert rules configured");
            return Ok(());
        };
        let source_alias = context
            .node_config_str("dataSource")
            .unwrap_or(keys::REQUEST_PARAMS)
            .to_string();
        let Some(source) = Self::source(context, &source_alias) else {
            debug!(source = %source_alias, "Convert source is empty");
            return Ok(());
        };
        let target_alias = context
            .node_config_str("targetDataKey")
            .unwrap_or(if source_alias == keys::REQUEST_PARAMS {
                keys::REQUEST_PARAMS
            } else {
                keys::RESPONSE_DATA
            })
            .to_string();

        let converted = rename_keys(source, &rules);
        match target_alias.as_str() {
            keys::REQUEST_PARAMS => match converted {
                Value::Object(map) => context.request_params = map,
                _ => {
                    return Err(NodeError::InvalidFormat(
                        "converted requestParams must be an object".into(),
                    ))
                }
            },
            keys::RESPONSE_DATA => context.response_data = Some(converted),
            other => context.set_attribute(other, converted),
        }
        Ok(())
    }
}

pub(crate) fn rename_keys(value: Value, rules: &HashMap<String, String>) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, child) in map {
                let key = rules.get(&key).cloned().unwrap_or(key);
                out.insert(key, rename_keys(child, rules));
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|item| rename_keys(item, rules)).collect())
        }
        other => other,
    }
}

#[async_trait]
impl Node for FieldNameConvertNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "field name conversion"
    }

    async fn execute(&self, context: &mut ProcessContext) -> bool {
        let result = Self::run(context);
        settle(Self::ID, context, result)
    }
}
