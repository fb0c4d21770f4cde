use async_trait::async_trait;
use std::sync::Arc;

use crate::core::process_context::ProcessContext;
use crate::error::{NodeError, NodeResult, ResultCode};

use super::executor::settle;
use super::{Node, NodeDependencies};

/// Checks `token` resolves to a live grant issued to the calling app key.
pub struct TokenValidateNode {
    deps: Arc<NodeDependencies>,
}

impl TokenValidateNode {
    pub const ID: &'static str = "tokenValidateNode";

    pub fn new(deps: Arc<NodeDependencies>) -> Self {
        Self { deps }
    }

    async fn run(&self, context: &mut ProcessContext) -> NodeResult<()> {
        let token = context
            .param_str("token")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| NodeError::auth(ResultCode::InvalidToken, "token must not be empty"))?;

        let grant = self
            .deps
            .tokens
            .find(token)
            .await?
            .ok_or_else(|| NodeError::auth(ResultCode::InvalidToken, "token is not recognised"))?;

        if grant.is_expired(self.deps.runtime.now()) {
            return Err(NodeError::auth(ResultCode::ExpiredToken, "token has expired"));
        }
        if grant.app_key != context.app_key() {
            return Err(NodeError::auth(
                ResultCode::InvalidAppKey,
                "token was not issued to this app key",
            ));
        }
        self.deps.organization(context.app_key()).await?;
        Ok(())
    }
}

#[async_trait]
impl Node for TokenValidateNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "token validation"
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
    use chrono::Duration;
    use serde_json::json;

    fn ctx_with_token(app_key: &str, token: Option<&str>) -> ProcessContext {
        let mut ctx = ProcessContext::new("r1", "IF001", app_key);
        if let Some(token) = token {
            ctx.request_params.insert("token".into(), json!(token));
        }
        ctx
    }

    #[tokio::test]
    async fn test_valid_token_passes() {
        let fx = Fixture::new();
        fx.grant_token("tok-1", "city-a", Some(Duration::hours(1)));
        let node = TokenValidateNode::new(fx.deps());
        let mut ctx = ctx_with_token("city-a", Some("tok-1"));
        assert!(node.execute(&mut ctx).await);
        assert!(ctx.is_success());
    }

    #[tokio::test]
    async fn test_missing_token() {
        let fx = Fixture::new();
        let node = TokenValidateNode::new(fx.deps());
        let mut ctx = ctx_with_token("city-a", None);
        assert!(!node.execute(&mut ctx).await);
        assert_eq!(ctx.error_code(), Some("2002"));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let fx = Fixture::new();
        fx.grant_token("tok-1", "city-a", Some(Duration::seconds(-5)));
        let node = TokenValidateNode::new(fx.deps());
        let mut ctx = ctx_with_token("city-a", Some("tok-1"));
        assert!(!node.execute(&mut ctx).await);
        assert_eq!(ctx.error_code(), Some("2003"));
    }

    #[tokio::test]
    async fn test_token_of_other_app_key() {
        let fx = Fixture::new();
        fx.grant_token("tok-1", "city-b", None);
        let node = TokenValidateNode::new(fx.deps());
        let mut ctx = ctx_with_token("city-a", Some("tok-1"));
        assert!(!node.execute(&mut ctx).await);
        assert_eq!(ctx.error_code(), Some("2004"));
    }
}
