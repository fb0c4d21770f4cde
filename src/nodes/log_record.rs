use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::core::process_context::{keys, ProcessContext};
use crate::store::RequestLogEntry;

use super::{Node, NodeDependencies};

/// Appends the call to the request log. Storage failures are logged and
/// never fail the pipeline.
pub struct LogRecordNode {
    deps: Arc<NodeDependencies>,
}

impl LogRecordNode {
    pub const ID: &'static str = "logRecordNode";

    pub fn new(deps: Arc<NodeDependencies>) -> Self {
        Self { deps }
    }

    fn entry(&self, context: &ProcessContext) -> RequestLogEntry {
        RequestLogEntry {
            request_id: context.request_id().to_string(),
            interface_code: context.interface_code().to_string(),
            app_key: context.app_key().to_string(),
            execution_id: context.attribute_str(keys::EXECUTION_ID).map(str::to_string),
            request_ip: context.attribute_str(keys::REQUEST_IP).map(str::to_string),
            request_params: Value::Object(context.request_params.clone()),
            logged_at: self.deps.runtime.now(),
        }
    }
}

#[async_trait]
impl Node for LogRecordNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "request log"
    }

    async fn execute(&self, context: &mut ProcessContext) -> bool {
        if let Err(e) = self.deps.request_logs.append(self.entry(context)).await {
            warn!(request_id = %context.request_id(), error = %e, "Failed to record request log");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::test_support::Fixture;
    use serde_json::json;

    #[tokio::test]
    async fn test_appends_entry() {
        let fx = Fixture::new();
        let node = LogRecordNode::new(fx.deps());
        let mut ctx = ProcessContext::new("r1", "IF001", "city-a");
        ctx.request_params.insert("orgCode".into(), json!("330100"));
        ctx.set_attribute(keys::EXECUTION_ID, json!("exec-1"));
        ctx.set_attribute(keys::REQUEST_IP, json!("10.0.0.8"));

        assert!(node.execute(&mut ctx).await);
        let entries = fx.logs.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].execution_id.as_deref(), Some("exec-1"));
        assert_eq!(entries[0].request_ip.as_deref(), Some("10.0.0.8"));
        assert_eq!(entries[0].logged_at, fx.now());
        assert_eq!(entries[0].request_params, json!({"orgCode": "330100"}));
    }
}
