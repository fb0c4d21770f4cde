use async_trait::async_trait;
use std::sync::Arc;

use crate::core::process_context::ProcessContext;
use crate::error::{NodeError, NodeResult};

use super::executor::{non_blank, settle};
use super::{Node, NodeDependencies};

/// Requires `authIdentifier` to reference an enabled letter whose validity
/// window covers the current time.
pub struct AuthorizationLetterValidateNode {
    deps: Arc<NodeDependencies>,
}

impl AuthorizationLetterValidateNode {
    pub const ID: &'static str = "authorizationLetterValidateNode";

    pub fn new(deps: Arc<NodeDependencies>) -> Self {
        Self { deps }
    }

    async fn run(&self, context: &mut ProcessContext) -> NodeResult<()> {
        let alias = context.input_alias();
        let input = context.read_map(&alias).unwrap_or_default();
        let identifier = non_blank(&input, "authIdentifier")
            .ok_or_else(|| NodeError::ParamMissing("authIdentifier must not be empty".into()))?;

        let letter = self
            .deps
            .authorization_letters
            .find(identifier)
            .await?
            .ok_or_else(|| NodeError::Authorization("authorization letter not found".into()))?;
        if !letter.is_valid_at(self.deps.runtime.now()) {
            return Err(NodeError::Authorization(
                "authorization letter is not in force".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Node for AuthorizationLetterValidateNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "authorization letter validation"
    }

    async fn execute(&self, context: &mut ProcessContext) -> bool {
        let result = self.run(context).await;
        settle(Self::ID, context, result)
    }
}
