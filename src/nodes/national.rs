//! Forwarding to the national node.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::process_context::{keys, ProcessContext};
use crate::error::{NodeError, NodeResult};

use super::executor::settle;
use super::{Node, NodeDependencies};

fn default_connect_timeout_ms() -> u64 { 5_000 }
fn default_request_timeout_ms() -> u64 { 30_000 }
fn default_excluded_fields() -> Vec<String> {
    vec!["txnIttChnlId".into(), "txnIttChnlCgyCode".into()]
}

/// Where and how to reach the national node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NationalNodeConfig {
    #[serde(default)]
    pub base_url: String,
    /// Credential presented on every forwarded call.
    #[serde(default)]
    pub token: String,
    /// National node's public key, used to seal outbound and verify
    /// inbound envelopes.
    #[serde(default)]
    pub public_key: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Caller-only fields never sent upstream.
    #[serde(default = "default_excluded_fields")]
    pub excluded_fields: Vec<String>,
}

impl Default for NationalNodeConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            public_key: String::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            excluded_fields: default_excluded_fields(),
        }
    }
}

/// Transport to the national node. Returns the decoded reply body; the
/// caller interprets its `success` flag.
#[async_trait]
pub trait NationalNodeClient: Send + Sync {
    async fn forward(&self, interface_code: &str, body: &Value) -> NodeResult<Value>;
}

pub struct HttpNationalNodeClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpNationalNodeClient {
    pub fn new(config: &NationalNodeConfig) -> NodeResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| NodeError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Transport detail (URL, socket errors) goes to the log only.
    fn map_transport(url: &str, e: reqwest::Error) -> NodeError {
        if e.is_timeout() {
            warn!(url, error = %e, "National node request timed out");
            NodeError::NationalNodeTimeout("national node request timed out".into())
        } else {
            warn!(url, error = %e, "National node request failed");
            NodeError::NationalNode("national node request failed".into())
        }
    }
}

#[async_trait]
impl NationalNodeClient for HttpNationalNodeClient {
    async fn forward(&self, interface_code: &str, body: &Value) -> NodeResult<Value> {
        if self.base_url.is_empty() {
            return Err(NodeError::Config("national node base URL is not configured".into()));
        }
        let url = format!("{}/{}", self.base_url, interface_code);
        debug!(url = %url, "Forwarding to national node");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Self::map_transport(&url, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Self::map_transport(&url, e))?;
        if !status.is_success() {
            return Err(NodeError::NationalNode(format!(
                "national node returned HTTP {}",
                status.as_u16()
            )));
        }
        if text.trim().is_empty() {
            return Err(NodeError::NationalNode("national node returned an empty body".into()));
        }
        serde_json::from_str(&text).map_err(|e| {
            warn!(url = %url, error = %e, "National node reply is not JSON");
            NodeError::NationalNode("national node reply is not JSON".into())
        })
    }
}

/// Posts the input map (minus excluded fields, plus `publicKey` and
/// `token`) to `{baseUrl}/{interfaceCode}` and stores the reply under the
/// output alias, `nationalResponse` by default.
pub struct NationalNodeRequestNode {
    deps: Arc<NodeDependencies>,
}

impl NationalNodeRequestNode {
    pub const ID: &'static str = "nationalNodeRequestNode";

    pub fn new(deps: Arc<NodeDependencies>) -> Self {
        Self { deps }
    }

    async fn build_body(&self, context: &ProcessContext) -> NodeResult<Map<String, Value>> {
        let alias = context.input_alias();
        let mut body = context
            .read_map(&alias)
            .ok_or_else(|| NodeError::ParamMissing(format!("{} must not be empty", alias)))?;
        for field in &self.deps.national.excluded_fields {
            body.remove(field);
        }
        let own = self.deps.self_organization().await?;
        body.insert("publicKey".into(), Value::String(own.public_key));
        body.insert("token".into(), Value::String(self.deps.national.token.clone()));
        Ok(body)
    }

    async fn run(&self, context: &mut ProcessContext) -> NodeResult<()> {
        let body = Value::Object(self.build_body(context).await?);
        let reply = self
            .deps
            .national_client
            .forward(context.interface_code(), &body)
            .await?;

        if reply.get("success").and_then(Value::as_bool) != Some(true) {
            let code = reply.get("errorCode").and_then(Value::as_str).unwrap_or("-");
            let message = reply
                .get("errorMessage")
                .and_then(Value::as_str)
                .unwrap_or("no message");
            return Err(NodeError::NationalNode(format!(
                "national node rejected request: [{}] {}",
                code, message
            )));
        }

        info!(
            request_id = %context.request_id(),
            interface_code = %context.interface_code(),
            "National node accepted request"
        );
        let out = context.output_alias(keys::NATIONAL_RESPONSE);
        match reply {
            Value::Object(map) => context.write_map(&out, map),
            other => context.set_attribute(out, other),
        }
        Ok(())
    }
}

#[async_trait]
impl Node for NationalNodeRequestNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "national node request"
    }

    async fn execute(&self, context: &mut ProcessContext) -> bool {
        let result = self.run(context).await;
        settle(Self::ID, context, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::test_support::Fixture;
    use serde_json::json;

    fn request() -> ProcessContext {
        let mut ctx = ProcessContext::new("r1", "IF001", "city-a");
        ctx.request_params.insert("requestData".into(), json!("cipher"));
        ctx.request_params.insert("txnIttChnlId".into(), json!("chnl-1"));
        ctx
    }

    #[tokio::test]
    async fn test_forwards_and_stores_reply() {
        let fx = Fixture::new();
        fx.national_client.reply(Ok(json!({"success": true, "data": "abc"})));
        let node = NationalNodeRequestNode::new(fx.deps());
        let mut ctx = request();

        assert!(node.execute(&mut ctx).await);
        assert_eq!(
            ctx.attribute("nationalResponse"),
            Some(&json!({"success": true, "data": "abc"}))
        );

        let sent = fx.national_client.requests();
        assert_eq!(sent.len(), 1);
        let (interface_code, body) = &sent[0];
        assert_eq!(interface_code, "IF001");
        assert!(body.get("txnIttChnlId").is_none());
        assert_eq!(body["token"], json!("nat-token"));
        assert_eq!(body["publicKey"], json!(fx.provincial.public.to_base64()));
        assert_eq!(body["requestData"], json!("cipher"));
    }

    #[tokio::test]
    async fn test_rejection_keeps_upstream_code() {
        let fx = Fixture::new();
        fx.national_client.reply(Ok(json!({
            "success": false,
            "errorCode": "E42",
            "errorMessage": "quota exhausted"
        })));
        let node = NationalNodeRequestNode::new(fx.deps());
        let mut ctx = request();

        assert!(!node.execute(&mut ctx).await);
        assert_eq!(ctx.error_code(), Some("5001"));
        assert_eq!(
            ctx.error_message(),
            Some("national node rejected request: [E42] quota exhausted")
        );
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_code() {
        let fx = Fixture::new();
        fx.national_client.reply(Err(NodeError::NationalNodeTimeout(
            "national node request timed out".into(),
        )));
        let node = NationalNodeRequestNode::new(fx.deps());
        let mut ctx = request();

        assert!(!node.execute(&mut ctx).await);
        assert_eq!(ctx.error_code(), Some("5002"));
    }

    /// Serves one canned HTTP response on a loopback port.
    async fn serve_once(reply: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if received.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: String) -> HttpNationalNodeClient {
        HttpNationalNodeClient::new(&NationalNodeConfig {
            base_url,
            ..NationalNodeConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_unreachable_node_hides_transport_detail() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = client(base_url).forward("IF001", &json!({})).await.unwrap_err();

        assert_eq!(err.result_code().code(), "5001");
        assert_eq!(err.public_message(), "national node request failed");
    }

    #[tokio::test]
    async fn test_non_json_reply_hides_parser_detail() {
        let base_url = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-length: 9\r\nconnection: close\r\n\r\nnot json!",
        )
        .await;

        let err = client(base_url).forward("IF001", &json!({"a": 1})).await.unwrap_err();

        assert_eq!(err.result_code().code(), "5001");
        assert_eq!(err.public_message(), "national node reply is not JSON");
    }

    #[tokio::test]
    async fn test_http_client_requires_base_url() {
        let client = HttpNationalNodeClient::new(&NationalNodeConfig::default()).unwrap();
        let err = client.forward("IF001", &json!({})).await.unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }
}
