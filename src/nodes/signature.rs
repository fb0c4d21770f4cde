//! Envelope verification and signing nodes.
//!
//! Key selection per side:
//!
//! | node | side | verifier / signer | decrypt / encrypt-to |
//! |------|------|-------------------|----------------------|
//! | verify | city | request `publicKey` | app key's private key |
//! | verify | national | national public key | own private key |
//! | sign | city | app key's private key | request `publicKey` |
//! | sign | national | own private key | national public key |
//!
//! The payload field defaults to `requestData` on the city-to-province and
//! province-to-national hops and to `data` on the way back; `dataSource`
//! overrides it.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tierflow_envelope::{open_with_keys, seal_with_keys, Envelope, Opened};

use crate::core::process_context::{keys, ProcessContext};
use crate::domain::Tier;
use crate::error::{NodeError, NodeResult};

use super::executor::{non_blank, settle};
use super::{Node, NodeDependencies};

pub const SIGNATURE_FIELD: &str = "signatureData";
pub const WRAPPED_KEY_FIELD: &str = "key";
pub const TIMESTAMP_FIELD: &str = "timestamp";
pub const CALLER_PUBLIC_KEY_FIELD: &str = "publicKey";

fn configured_side(context: &ProcessContext, node: &str) -> NodeResult<Tier> {
    let raw = context
        .node_config_str("side")
        .ok_or_else(|| NodeError::Config(format!("{} requires 'side'", node)))?;
    raw.parse::<Tier>().map_err(NodeError::Config)
}

fn caller_public_key(context: &ProcessContext) -> NodeResult<String> {
    context
        .param_str(CALLER_PUBLIC_KEY_FIELD)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or_else(|| NodeError::ParamMissing("publicKey must not be empty".into()))
}

fn national_public_key(deps: &NodeDependencies) -> NodeResult<String> {
    let key = deps.national.public_key.trim();
    if key.is_empty() {
        return Err(NodeError::Config("national node public key is not configured".into()));
    }
    Ok(key.to_string())
}

async fn app_private_key(deps: &NodeDependencies, app_key: &str) -> NodeResult<String> {
    deps.organization(app_key)
        .await?
        .private_key
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| NodeError::Config(format!("no private key held for app key {}", app_key)))
}

async fn own_private_key(deps: &NodeDependencies) -> NodeResult<String> {
    deps.self_organization()
        .await?
        .private_key
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| NodeError::Config("own private key is not configured".into()))
}

fn unsupported(side: Tier, node: &str) -> NodeError {
    NodeError::Config(format!("{} does not support side '{}'", node, side))
}

/// Opens an envelope found in the input map and replaces the payload field
/// with the verified plaintext. JSON plaintext is stored parsed.
pub struct SignatureVerifyNode {
    deps: Arc<NodeDependencies>,
}

impl SignatureVerifyNode {
    pub const ID: &'static str = "signatureVerifyNode";

    pub fn new(deps: Arc<NodeDependencies>) -> Self {
        Self { deps }
    }

    /// (verifier public key, recipient private key)
    async fn keys_for(&self, side: Tier, context: &ProcessContext) -> NodeResult<(String, String)> {
        match side {
            Tier::City => Ok((
                caller_public_key(context)?,
                app_private_key(&self.deps, context.app_key()).await?,
            )),
            Tier::National => Ok((
                national_public_key(&self.deps)?,
                own_private_key(&self.deps).await?,
            )),
            Tier::Provincial => Err(unsupported(side, Self::ID)),
        }
    }

    async fn run(&self, context: &mut ProcessContext) -> NodeResult<()> {
        let side = configured_side(context, Self::ID)?;
        let field = context
            .node_config_str("dataSource")
            .unwrap_or(match side {
                Tier::National => "data",
                _ => "requestData",
            })
            .to_string();
        let alias = context.input_alias();
        let mut input = context
            .read_map(&alias)
            .ok_or_else(|| NodeError::ParamMissing(format!("{} must not be empty", alias)))?;

        let envelope = Envelope {
            signature: non_blank(&input, SIGNATURE_FIELD)
                .ok_or_else(|| NodeError::Signature("signatureData must not be empty".into()))?
                .to_string(),
            wrapped_key: non_blank(&input, WRAPPED_KEY_FIELD)
                .ok_or_else(|| NodeError::Signature("key must not be empty".into()))?
                .to_string(),
            cipher_text: non_blank(&input, &field)
                .ok_or_else(|| NodeError::ParamMissing(format!("{} must not be empty", field)))?
                .to_string(),
        };

        let (verifier, recipient) = self.keys_for(side, context).await?;
        let plaintext = match open_with_keys(&envelope, &verifier, &recipient)? {
            Opened::Verified(plaintext) => plaintext,
            Opened::Rejected(reason) => {
                return Err(NodeError::Signature(format!(
                    "signature verification failed: {}",
                    reason
                )))
            }
        };

        let payload = match serde_json::from_str::<Value>(&plaintext) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
            _ => Value::String(plaintext),
        };
        input.insert(field, payload);
        input.remove(SIGNATURE_FIELD);
        input.remove(WRAPPED_KEY_FIELD);

        let out = context.output_alias(&alias);
        context.write_map(&out, input);
        Ok(())
    }
}

#[async_trait]
impl Node for SignatureVerifyNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "signature verification"
    }

    async fn execute(&self, context: &mut ProcessContext) -> bool {
        let result = self.run(context).await;
        settle(Self::ID, context, result)
    }
}

/// Seals the payload field of the input map for the configured side and
/// adds `signatureData`, `key` and `timestamp`.
pub struct SignatureNode {
    deps: Arc<NodeDependencies>,
}

impl SignatureNode {
    pub const ID: &'static str = "signatureNode";

    pub fn new(deps: Arc<NodeDependencies>) -> Self {
        Self { deps }
    }

    /// (signer private key, recipient public key)
    async fn keys_for(&self, side: Tier, context: &ProcessContext) -> NodeResult<(String, String)> {
        match side {
            Tier::City => Ok((
                app_private_key(&self.deps, context.app_key()).await?,
                caller_public_key(context)?,
            )),
            Tier::National => Ok((
                own_private_key(&self.deps).await?,
                national_public_key(&self.deps)?,
            )),
            Tier::Provincial => Err(unsupported(side, Self::ID)),
        }
    }

    async fn run(&self, context: &mut ProcessContext) -> NodeResult<()> {
        let side = configured_side(context, Self::ID)?;
        let field = context
            .node_config_str("dataSource")
            .unwrap_or(match side {
                Tier::City => "data",
                _ => "requestData",
            })
            .to_string();
        let alias = context.input_alias();
        let mut input: Map<String, Value> = context
            .read_map(&alias)
            .ok_or_else(|| NodeError::ParamMissing(format!("{} must not be empty", alias)))?;

        let plaintext = match input.get(&field) {
            None | Some(Value::Null) => {
                return Err(NodeError::ParamMissing(format!("{} must not be empty", field)))
            }
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        };

        let (signer, recipient) = self.keys_for(side, context).await?;
        let envelope = seal_with_keys(&plaintext, &signer, &recipient)?;

        input.insert(field, Value::String(envelope.cipher_text));
        input.insert(SIGNATURE_FIELD.into(), Value::String(envelope.signature));
        input.insert(WRAPPED_KEY_FIELD.into(), Value::String(envelope.wrapped_key));
        input.insert(
            TIMESTAMP_FIELD.into(),
            Value::String(self.deps.runtime.now().timestamp_millis().to_string()),
        );

        let default_out = match side {
            Tier::City => keys::RESPONSE_DATA.to_string(),
            _ => alias,
        };
        let out = context.output_alias(&default_out);
        context.write_map(&out, input);
        Ok(())
    }
}

#[async_trait]
impl Node for SignatureNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "signature"
    }

    async fn execute(&self, context: &mut ProcessContext) -> bool {
        let result = self.run(context).await;
        settle(Self::ID, context, result)
    }
}
