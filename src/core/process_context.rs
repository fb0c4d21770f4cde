//! Per-call state threaded through every pipeline node.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{NodeError, ResultCode};

/// Well-known keys of [`ProcessContext::attributes`].
pub mod keys {
    /// Parsed configuration blob of the node currently executing.
    pub const NODE_CONFIG: &str = "nodeConfig";
    /// Id of the execution record driving this context.
    pub const EXECUTION_ID: &str = "executionId";
    /// This node's own public key, exposed to the caller.
    pub const SELF_PUBLIC_KEY: &str = "selfPublicKey";
    pub const REQUEST_IP: &str = "requestIp";
    /// Raw reply of the national node.
    pub const NATIONAL_RESPONSE: &str = "nationalResponse";

    /// Node config key naming the map a node reads.
    pub const IN_PARAM_NAME: &str = "inParamName";
    /// Node config key naming the map a node writes.
    pub const OUT_PARAM_NAME: &str = "outParamName";

    /// Alias resolving to `request_params`.
    pub const REQUEST_PARAMS: &str = "requestParams";
    /// Alias resolving to `response_data`.
    pub const RESPONSE_DATA: &str = "responseData";
}

/// Success flag plus error pair, captured so the engine can roll back a
/// failed attempt before retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessContext {
    request_id: String,
    interface_code: String,
    app_key: String,
    #[serde(default)]
    pub request_params: Map<String, Value>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    success: bool,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    pub response_data: Option<Value>,
}

impl ProcessContext {
    pub fn new(
        request_id: impl Into<String>,
        interface_code: impl Into<String>,
        app_key: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            interface_code: interface_code.into(),
            app_key: app_key.into(),
            request_params: Map::new(),
            attributes: Map::new(),
            success: true,
            error_code: None,
            error_message: None,
            response_data: None,
        }
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.request_params = params;
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn interface_code(&self) -> &str {
        &self.interface_code
    }

    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn mark_failure(&mut self, code: ResultCode, message: impl Into<String>) {
        self.success = false;
        self.error_code = Some(code.code().to_string());
        self.error_message = Some(message.into());
    }

    pub fn mark_error(&mut self, error: &NodeError) {
        self.mark_failure(error.result_code(), error.public_message());
    }

    pub fn outcome(&self) -> Outcome {
        Outcome {
            success: self.success,
            error_code: self.error_code.clone(),
            error_message: self.error_message.clone(),
        }
    }

    pub fn restore_outcome(&mut self, outcome: Outcome) {
        self.success = outcome.success;
        self.error_code = outcome.error_code;
        self.error_message = outcome.error_message;
    }

    /// Clear the outcome flags and any response, as for a fresh run.
    pub fn reset_outcome(&mut self) {
        self.success = true;
        self.error_code = None;
        self.error_message = None;
        self.response_data = None;
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.request_params.get(key).and_then(Value::as_str)
    }

    pub fn node_config(&self) -> Option<&Map<String, Value>> {
        self.attributes.get(keys::NODE_CONFIG).and_then(Value::as_object)
    }

    /// Non-blank string value from the current node configuration.
    pub fn node_config_str(&self, key: &str) -> Option<&str> {
        self.node_config()
            .and_then(|cfg| cfg.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Alias the current node reads from, `requestParams` unless configured.
    pub fn input_alias(&self) -> String {
        self.node_config_str(keys::IN_PARAM_NAME)
            .unwrap_or(keys::REQUEST_PARAMS)
            .to_string()
    }

    /// Alias the current node writes to, `default` unless configured.
    pub fn output_alias(&self, default: &str) -> String {
        self.node_config_str(keys::OUT_PARAM_NAME)
            .unwrap_or(default)
            .to_string()
    }

    /// Resolve an alias to a map: `requestParams`, `responseData` or an
    /// attribute holding an object. JSON-encoded objects are decoded.
    pub fn read_map(&self, alias: &str) -> Option<Map<String, Value>> {
        let value = match alias {
            keys::REQUEST_PARAMS => return Some(self.request_params.clone()),
            keys::RESPONSE_DATA => self.response_data.as_ref()?,
            other => self.attributes.get(other)?,
        };
        match value {
            Value::Object(map) => Some(map.clone()),
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn write_map(&mut self, alias: &str, map: Map<String, Value>) {
        match alias {
            keys::REQUEST_PARAMS => self.request_params = map,
            keys::RESPONSE_DATA => self.response_data = Some(Value::Object(map)),
            other => {
                self.attributes.insert(other.to_string(), Value::Object(map));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mark_failure_sets_flags() {
        let mut ctx = ProcessContext::new("r1", "IF001", "city-a");
        assert!(ctx.is_success());
        ctx.mark_failure(ResultCode::ParamError, "parameter orgCode must not be empty");
        assert!(!ctx.is_success());
        assert_eq!(ctx.error_code(), Some("3001"));
        assert_eq!(
            ctx.error_message(),
            Some("parameter orgCode must not be empty")
        );
    }

    #[test]
    fn test_outcome_restore() {
        let mut ctx = ProcessContext::new("r1", "IF001", "city-a");
        let clean = ctx.outcome();
        ctx.mark_failure(ResultCode::SystemError, "boom");
        ctx.restore_outcome(clean);
        assert!(ctx.is_success());
        assert!(ctx.error_code().is_none());
    }

    #[test]
    fn test_aliases_resolve() {
        let mut ctx = ProcessContext::new("r1", "IF001", "city-a");
        ctx.request_params.insert("a".into(), json!(1));
        ctx.set_attribute("nationalResponse", json!(r#"{"data":"x"}"#));
        ctx.set_attribute(keys::NODE_CONFIG, json!({"inParamName": "nationalResponse"}));

        assert_eq!(ctx.input_alias(), "nationalResponse");
        assert_eq!(ctx.output_alias("responseData"), "responseData");
        let map = ctx.read_map("nationalResponse").unwrap();
        assert_eq!(map.get("data"), Some(&json!("x")));
        assert_eq!(ctx.read_map("requestParams").unwrap().get("a"), Some(&json!(1)));
        assert!(ctx.read_map("missing").is_none());

        let mut out = Map::new();
        out.insert("k".into(), json!("v"));
        ctx.write_map("responseData", out);
        assert_eq!(ctx.response_data, Some(json!({"k": "v"})));
    }

    #[test]
    fn test_snapshot_roundtrip_keeps_identity() {
        let mut ctx = ProcessContext::new("r1", "IF001", "city-a");
        ctx.request_params.insert("orgCode".into(), json!("330100"));
        let text = serde_json::to_string(&ctx).unwrap();
        let back: ProcessContext = serde_json::from_str(&text).unwrap();
        assert_eq!(back.request_id(), "r1");
        assert_eq!(back.app_key(), "city-a");
        assert_eq!(back.param_str("orgCode"), Some("330100"));
    }
}
