use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

use crate::core::process_context::ProcessContext;
use crate::core::runtime_context::RuntimeContext;
use crate::error::{NodeError, NodeResult, ResultCode};
use crate::store::{
    AuthorizationLetterStore, Organization, OrganizationDirectory, RequestLogStore, TokenStore,
};
use crate::validation::ValidationEngine;

use super::national::{NationalNodeClient, NationalNodeConfig};

/// One configurable pipeline step.
///
/// `execute` never panics on bad input: failures are recorded on the
/// context with `mark_failure` and reported by returning `false`.
#[async_trait]
pub trait Node: Send + Sync {
    /// Catalog key referenced by node configuration.
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    async fn execute(&self, context: &mut ProcessContext) -> bool;
}

/// Record a node's result on the context and turn it into the `bool`
/// contract of [`Node::execute`].
pub(crate) fn settle(node: &str, context: &mut ProcessContext, result: NodeResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(
                node,
                request_id = %context.request_id(),
                code = e.result_code().code(),
                error = %e,
                "Node failed"
            );
            context.mark_error(&e);
            false
        }
    }
}

/// Collaborators the built-in nodes look up at run time.
#[derive(Clone)]
pub struct NodeDependencies {
    pub organizations: Arc<dyn OrganizationDirectory>,
    pub tokens: Arc<dyn TokenStore>,
    pub authorization_letters: Arc<dyn AuthorizationLetterStore>,
    pub request_logs: Arc<dyn RequestLogStore>,
    pub national_client: Arc<dyn NationalNodeClient>,
    pub national: NationalNodeConfig,
    pub validation: Arc<ValidationEngine>,
    pub runtime: RuntimeContext,
    /// Directory key of this node's own keypair.
    pub self_app_key: String,
}

impl NodeDependencies {
    /// Enabled organization for `app_key`.
    pub async fn organization(&self, app_key: &str) -> NodeResult<Organization> {
        let org = self
            .organizations
            .lookup_by_app_key(app_key)
            .await?
            .ok_or_else(|| NodeError::auth(ResultCode::InvalidAppKey, "app key is not registered"))?;
        if !org.is_enabled() {
            return Err(NodeError::auth(ResultCode::InvalidAppKey, "app key is disabled"));
        }
        Ok(org)
    }

    /// This node's own directory entry.
    pub async fn self_organization(&self) -> NodeResult<Organization> {
        self.organizations
            .lookup_by_app_key(&self.self_app_key)
            .await?
            .ok_or_else(|| NodeError::Config("own keypair is not registered".into()))
    }
}

/// Non-blank string field of a map.
pub(crate) fn non_blank<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
