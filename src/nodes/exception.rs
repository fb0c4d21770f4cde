use async_trait::async_trait;
use tracing::{error, warn};

use crate::core::process_context::ProcessContext;
use crate::error::{category_of, ErrorCategory};

use super::Node;

/// Classifies a failed call by error-code range and halts the pipeline.
/// A successful context passes through untouched.
pub struct ExceptionHandlerNode;

impl ExceptionHandlerNode {
    pub const ID: &'static str = "exceptionHandlerNode";
}

#[async_trait]
impl Node for ExceptionHandlerNode {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "exception handler"
    }

    async fn execute(&self, context: &mut ProcessContext) -> bool {
        if context.is_success() {
            return true;
        }
        let code = context.error_code().unwrap_or_default();
        let category = category_of(code);
        let message = context.error_message().unwrap_or_default();
        match category {
            ErrorCategory::System | ErrorCategory::NationalNode => error!(
                request_id = %context.request_id(),
                category = category.as_str(),
                code,
                error_message = message,
                "Call failed"
            ),
            _ => warn!(
                request_id = %context.request_id(),
                category = category.as_str(),
                code,
                error_message = message,
                "Call rejected"
            ),
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResultCode;

    #[tokio::test]
    async fn test_success_passes_through() {
        let mut ctx = ProcessContext::new("r1", "IF001", "city-a");
        assert!(ExceptionHandlerNode.execute(&mut ctx).await);
        assert!(ctx.is_success());
    }

    #[tokio::test]
    async fn test_failure_always_halts() {
        for code in [
            ResultCode::InvalidToken,
            ResultCode::ParamMissing,
            ResultCode::NationalNodeTimeout,
            ResultCode::SystemError,
            ResultCode::BusinessError,
        ] {
            let mut ctx = ProcessContext::new("r1", "IF001", "city-a");
            ctx.mark_failure(code, code.message());
            assert!(!ExceptionHandlerNode.execute(&mut ctx).await);
            assert_eq!(ctx.error_code(), Some(code.code()));
        }
    }
}
