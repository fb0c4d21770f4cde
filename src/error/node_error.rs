use thiserror::Error;
use tierflow_envelope::CryptoError;

use super::{ResultCode, StoreError};

/// Failures raised inside a node. The node converts them into
/// `ProcessContext::mark_failure` before returning.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("{0}")]
    Param(String),
    #[error("{0}")]
    ParamMissing(String),
    #[error("{0}")]
    InvalidFormat(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{0}")]
    Signature(String),
    #[error("{message}")]
    Auth { code: ResultCode, message: String },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Business(String),
    #[error("{0}")]
    NationalNode(String),
    #[error("{0}")]
    NationalNodeTimeout(String),
    #[error("{0}")]
    System(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl NodeError {
    pub fn auth(code: ResultCode, message: impl Into<String>) -> Self {
        NodeError::Auth {
            code,
            message: message.into(),
        }
    }

    pub fn result_code(&self) -> ResultCode {
        match self {
            NodeError::Param(_) => ResultCode::ParamError,
            NodeError::ParamMissing(_) => ResultCode::ParamMissing,
            NodeError::InvalidFormat(_) => ResultCode::InvalidParamFormat,
            NodeError::Authorization(_) => ResultCode::AuthorizationError,
            NodeError::Signature(_) | NodeError::Crypto(_) => ResultCode::SignatureError,
            NodeError::Auth { code, .. } => *code,
            NodeError::NotFound(_) => ResultCode::NotFound,
            NodeError::Business(_) => ResultCode::BusinessError,
            NodeError::NationalNode(_) => ResultCode::NationalNodeError,
            NodeError::NationalNodeTimeout(_) => ResultCode::NationalNodeTimeout,
            NodeError::System(_)
            | NodeError::Config(_)
            | NodeError::Serialization(_)
            | NodeError::Store(_) => ResultCode::SystemError,
        }
    }

    /// Message safe to hand back to the calling city node. Internal faults
    /// collapse to the generic system message.
    pub fn public_message(&self) -> String {
        match self {
            NodeError::Config(_) | NodeError::Serialization(_) | NodeError::Store(_) => {
                ResultCode::SystemError.message().to_string()
            }
            NodeError::Crypto(_) => ResultCode::SignatureError.message().to_string(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(e: serde_json::Error) -> Self {
        NodeError::Serialization(e.to_string())
    }
}
