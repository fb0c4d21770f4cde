use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::core::process_context::ProcessContext;
use crate::error::{NodeError, NodeResult};
use crate::validation::{parse_rules, FailureKind};

use super::executor::settle;
use super::{Node, NodeDependencies};

/// Runs the rule tree under `validateRules` against the input map. A node
/// without rules passes.
pub struct ParamValidateNode {
    deps: Arc<NodeDependencies>,
}

impl ParamValidateNode {
    pub const ID: &'static str = "paramValidateNode";

    pub fn new(deps: Arc<NodeDependencies>) -> Self {
        Self { deps }
    }

    fn run(&self, context: &ProcessContext) -> NodeResult<()> {
        let raw = context
            .node_config()
            .and_then(|cfg| cfg.get("validateRules"))
            .cloned()
            .unwrap_or(Value::Null);
        let rules = parse_rules(&raw)
            .map_err(|e| NodeError::Config(format!("invalid validateRules: {}", e)))?;
        if rules.is_empty() {
            debug!(request_id = %context.request_id(), "No validation rules configured");
            return Ok(());
        }

        let alias = context.input_alias();
        let target = Value::Object(context.read_map(&alias).unwrap_or_default());
        self.deps
            .validation
            .validate(&target, &rules)
            .map_err(|failure| match failure.kind {
                FailureKind::MalformedJson => NodeError::InvalidFormat(failure.message),
                FailureKind::Rule(_) => NodeError::Param(failure.message),
            })
    }
}

#[async_trait]
impl Node for ParamValidateNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "parameter validation"
    }

    async fn execute(&self, context: &mut ProcessContext) -> bool {
        let result = self.run(context);
        settle(Self::ID, context, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::process_context::keys;
    use crate::nodes::test_support::Fixture;
    use serde_json::json;

    fn ctx(params: Value, rules: Value) -> ProcessContext {
        let mut ctx = ProcessContext::new("r1", "IF001", "city-a");
        if let Value::Object(map) = params {
            ctx.request_params = map;
        }
        ctx.set_attribute(keys::NODE_CONFIG, json!({ "validateRules": rules }));
        ctx
    }

    #[tokio::test]
    async fn test_required_null_names_field() {
        let fx = Fixture::new();
        let node = ParamValidateNode::new(fx.deps());
        let mut ctx = ctx(
            json!({"orgCode": null}),
            json!([{"paramPath": "orgCode", "rules": [{"type": "required"}]}]),
        );

        assert!(!node.execute(&mut ctx).await);
        assert_eq!(ctx.error_code(), Some("3001"));
        assert!(ctx.error_message().unwrap().contains("orgCode"));
    }

    #[tokio::test]
    async fn test_rules_given_as_json_text() {
        let fx = Fixture::new();
        let node = ParamValidateNode::new(fx.deps());
        let mut ctx = ctx(
            json!({"orgCode": "330100"}),
            json!(r#"[{"paramName":"orgCode","rules":[{"type":"regex","config":"\\d{6}"}]}]"#),
        );

        assert!(node.execute(&mut ctx).await);
    }

    #[tokio::test]
    async fn test_malformed_json_maps_to_format_error() {
        let fx = Fixture::new();
        let node = ParamValidateNode::new(fx.deps());
        let mut ctx = ctx(
            json!({"payload": "{not json"}),
            json!([{
                "paramPath": "payload",
                "rules": [{"type": "dataType", "config": "json", "nestedRules": [
                    {"paramPath": "id", "rules": [{"type": "required"}]}
                ]}]
            }]),
        );

        assert!(!node.execute(&mut ctx).await);
        assert_eq!(ctx.error_code(), Some("3003"));
    }

    #[tokio::test]
    async fn test_no_rules_passes() {
        let fx = Fixture::new();
        let node = ParamValidateNode::new(fx.deps());
        let mut ctx = ProcessContext::new("r1", "IF001", "city-a");

        assert!(node.execute(&mut ctx).await);
    }

    #[tokio::test]
    async fn test_unparseable_rules_is_system_error() {
        let fx = Fixture::new();
        let node = ParamValidateNode::new(fx.deps());
        let mut ctx = ctx(json!({}), json!("[{oops"));

        assert!(!node.execute(&mut ctx).await);
        assert_eq!(ctx.error_code(), Some("1001"));
    }
}
