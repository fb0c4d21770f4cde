use thiserror::Error;

use super::{ResultCode, StoreError};

/// Errors surfaced by the process engine to the embedding layer.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Execution record not found: {0}")]
    ExecutionNotFound(String),
    #[error("Execution {0} is already running")]
    ReplayInProgress(String),
    #[error("Execution {0} is no longer awaiting retry")]
    NotRetryPending(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn result_code(&self) -> ResultCode {
        match self {
            EngineError::ExecutionNotFound(_) => ResultCode::NotFound,
            EngineError::ReplayInProgress(_) | EngineError::NotRetryPending(_) => {
                ResultCode::OperationFailed
            }
            EngineError::Store(_) => ResultCode::SystemError,
        }
    }
}
