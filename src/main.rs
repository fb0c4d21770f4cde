use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tierflow::envelope::{open_with_keys, seal_with_keys, Envelope, Opened, PartyKeyPair};
use tierflow::gateway::{Collaborators, Gateway};
use tierflow::nodes::NationalNodeClient;
use tierflow::store::{
    InterfaceDefinition, MemoryAuthorizationLetterStore, MemoryExecutionStore,
    MemoryInterfaceDefinitionStore, MemoryNodeConfigStore, MemoryOrganizationDirectory,
    MemoryRequestLogStore, MemoryTokenStore, NodeConfig, OrgStatus, Organization, TokenGrant,
};
use tierflow::{GatewayConfig, NodeError, RetryPolicy, RuntimeContext};

/// In-process stand-in for the national node: opens the forwarded envelope
/// and seals a canned answer back to the sender.
struct LoopbackNationalNode {
    keys: PartyKeyPair,
}

fn text(body: &Value, field: &str) -> Result<String, NodeError> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| NodeError::NationalNode(format!("missing {}", field)))
}

#[async_trait]
impl NationalNodeClient for LoopbackNationalNode {
    async fn forward(&self, interface_code: &str, body: &Value) -> Result<Value, NodeError> {
        let sender = text(body, "publicKey")?;
        let envelope = Envelope {
            signature: text(body, "signatureData")?,
            wrapped_key: text(body, "key")?,
            cipher_text: text(body, "requestData")?,
        };
        let private = self.keys.private.to_base64();
        let Opened::Verified(request) = open_with_keys(&envelope, &sender, &private)? else {
            return Ok(json!({"success": false, "errorCode": "E401", "errorMessage": "bad signature"}));
        };
        println!("[national] {} <- {}", interface_code, request);

        let answer = json!({"orgName": "Hangzhou Municipal Bureau", "status": "active"});
        let reply = seal_with_keys(&answer.to_string(), &private, &sender)?;
        Ok(json!({
            "success": true,
            "data": reply.cipher_text,
            "signatureData": reply.signature,
            "key": reply.wrapped_key,
        }))
    }
}

fn organization(app_key: &str, keys: &PartyKeyPair) -> Organization {
    Organization {
        app_key: app_key.into(),
        org_code: app_key.into(),
        org_name: app_key.into(),
        public_key: keys.public.to_base64(),
        private_key: Some(keys.private.to_base64()),
        status: OrgStatus::Enabled,
    }
}

fn pipeline() -> Vec<NodeConfig> {
    vec![
        NodeConfig::new("P-ORG-QUERY", "tokenValidateNode", 1),
        NodeConfig::new("P-ORG-QUERY", "signatureVerifyNode", 2).with_config(json!({"side": "city"})),
        NodeConfig::new("P-ORG-QUERY", "paramValidateNode", 3).with_config(json!({
            "validateRules": [
                {"paramPath": "requestData.orgCode", "rules": [
                    {"type": "required"},
                    {"type": "regex", "config": "\\d{6}"}
                ]}
            ]
        })),
        NodeConfig::new("P-ORG-QUERY", "signatureNode", 4).with_config(json!({"side": "national"})),
        NodeConfig::new("P-ORG-QUERY", "nationalNodeRequestNode", 5)
            .with_retry(RetryPolicy::new(2, 200, 2.0)),
        NodeConfig::new("P-ORG-QUERY", "signatureVerifyNode", 6)
            .with_config(json!({"side": "national", "inParamName": "nationalResponse"})),
        NodeConfig::new("P-ORG-QUERY", "signatureNode", 7)
            .with_config(json!({"side": "city", "inParamName": "nationalResponse"})),
        NodeConfig::new("P-ORG-QUERY", "logRecordNode", 8).run_async(),
        NodeConfig::new("P-ORG-QUERY", "exceptionHandlerNode", 9),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== Tierflow provincial node ===\n");

    let mut config = match std::env::args().nth(1) {
        Some(path) => GatewayConfig::load(path)?,
        None => GatewayConfig::default(),
    };

    let city = PartyKeyPair::generate();
    let city_channel = PartyKeyPair::generate();
    let provincial = PartyKeyPair::generate();
    let national = PartyKeyPair::generate();
    config.national_node.public_key = national.public.to_base64();
    config.national_node.token = "demo-national-token".into();

    let organizations = Arc::new(MemoryOrganizationDirectory::new());
    organizations.insert(organization("city-a", &city_channel));
    organizations.insert(organization(&config.self_app_key, &provincial));
    let tokens = Arc::new(MemoryTokenStore::new());
    tokens.insert(TokenGrant {
        token: "demo-token".into(),
        app_key: "city-a".into(),
        expires_at: None,
    });
    let interfaces = Arc::new(MemoryInterfaceDefinitionStore::new());
    interfaces.insert(InterfaceDefinition::new("IF001", "P-ORG-QUERY"));
    let node_configs = Arc::new(MemoryNodeConfigStore::new());
    node_configs.insert_all(pipeline())?;
    let request_logs = Arc::new(MemoryRequestLogStore::new());

    let gateway = Gateway::build(
        config,
        Collaborators {
            interfaces,
            organizations,
            tokens,
            authorization_letters: Arc::new(MemoryAuthorizationLetterStore::new()),
            request_logs: request_logs.clone(),
            node_configs,
            records: Arc::new(MemoryExecutionStore::new()),
            national_client: Some(Arc::new(LoopbackNationalNode { keys: national })),
        },
        RuntimeContext::default(),
    )?;
    println!("[OK] Gateway assembled");

    // What the city node sends.
    let payload = json!({"orgCode": "330100", "queryType": "basic"}).to_string();
    let sealed = seal_with_keys(
        &payload,
        &city.private.to_base64(),
        &city_channel.public.to_base64(),
    )?;
    let body = json!({
        "txnCommCom": {"token": "demo-token", "txnIttChnlId": "CH01"},
        "txnBodyCom": {
            "publicKey": city.public.to_base64(),
            "requestData": sealed.cipher_text,
            "signatureData": sealed.signature,
            "key": sealed.wrapped_key
        }
    });

    let response = gateway.handle("IF001", "city-a", &body, Some("10.0.0.8")).await;
    println!(
        "[OK] {} {} ({})",
        response.status, response.response_code, response.response_desc
    );

    if let Some(reply) = &response.response_body {
        let envelope = Envelope {
            signature: reply.signature.clone().unwrap_or_default(),
            wrapped_key: reply.wrapped_key.clone().unwrap_or_default(),
            cipher_text: reply.data.as_str().unwrap_or_default().to_string(),
        };
        let opened = open_with_keys(
            &envelope,
            &city_channel.public.to_base64(),
            &city.private.to_base64(),
        )?;
        match opened {
            Opened::Verified(plaintext) => println!("[city] reply: {}", plaintext),
            Opened::Rejected(reason) => println!("[city] reply rejected: {}", reason),
        }
    }

    tokio::task::yield_now().await;
    println!("[OK] {} request log entries", request_logs.entries().len());

    let report = gateway.recovery_job().run_once().await?;
    println!("[OK] recovery pass: {:?}", report);
    Ok(())
}
