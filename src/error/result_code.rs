//! Stable (code, message) pairs returned to callers.

use serde::{Deserialize, Serialize};

/// Coarse grouping used when classifying a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Auth,
    Param,
    NationalNode,
    System,
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Auth => "auth",
            ErrorCategory::Param => "param",
            ErrorCategory::NationalNode => "national_node",
            ErrorCategory::System => "system",
            ErrorCategory::Other => "other",
        }
    }

    /// Failures worth re-driving through the recovery job.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorCategory::NationalNode | ErrorCategory::System)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    Success,

    SystemError,
    ServiceUnavailable,
    NetworkError,
    NotFound,

    Unauthorized,
    InvalidToken,
    ExpiredToken,
    InvalidAppKey,
    SignatureError,

    ParamError,
    ParamMissing,
    InvalidParamFormat,
    AuthorizationError,

    BusinessError,
    DataNotFound,
    DuplicateData,
    OperationFailed,

    NationalNodeError,
    NationalNodeTimeout,

    UnknownError,
}

impl ResultCode {
    pub const ALL: [ResultCode; 21] = [
        ResultCode::Success,
        ResultCode::SystemError,
        ResultCode::ServiceUnavailable,
        ResultCode::NetworkError,
        ResultCode::NotFound,
        ResultCode::Unauthorized,
        ResultCode::InvalidToken,
        ResultCode::ExpiredToken,
        ResultCode::InvalidAppKey,
        ResultCode::SignatureError,
        ResultCode::ParamError,
        ResultCode::ParamMissing,
        ResultCode::InvalidParamFormat,
        ResultCode::AuthorizationError,
        ResultCode::BusinessError,
        ResultCode::DataNotFound,
        ResultCode::DuplicateData,
        ResultCode::OperationFailed,
        ResultCode::NationalNodeError,
        ResultCode::NationalNodeTimeout,
        ResultCode::UnknownError,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            ResultCode::Success => "0000",
            ResultCode::SystemError => "1001",
            ResultCode::ServiceUnavailable => "1002",
            ResultCode::NetworkError => "1003",
            ResultCode::NotFound => "1004",
            ResultCode::Unauthorized => "2001",
            ResultCode::InvalidToken => "2002",
            ResultCode::ExpiredToken => "2003",
            ResultCode::InvalidAppKey => "2004",
            ResultCode::SignatureError => "2005",
            ResultCode::ParamError => "3001",
            ResultCode::ParamMissing => "3002",
            ResultCode::InvalidParamFormat => "3003",
            ResultCode::AuthorizationError => "3004",
            ResultCode::BusinessError => "4001",
            ResultCode::DataNotFound => "4002",
            ResultCode::DuplicateData => "4003",
            ResultCode::OperationFailed => "4004",
            ResultCode::NationalNodeError => "5001",
            ResultCode::NationalNodeTimeout => "5002",
            ResultCode::UnknownError => "9999",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ResultCode::Success => "success",
            ResultCode::SystemError => "system error",
            ResultCode::ServiceUnavailable => "service unavailable",
            ResultCode::NetworkError => "network error",
            ResultCode::NotFound => "resource not found",
            ResultCode::Unauthorized => "unauthorized",
            ResultCode::InvalidToken => "invalid token",
            ResultCode::ExpiredToken => "token expired",
            ResultCode::InvalidAppKey => "invalid app key",
            ResultCode::SignatureError => "signature verification failed",
            ResultCode::ParamError => "parameter error",
            ResultCode::ParamMissing => "required parameter missing",
            ResultCode::InvalidParamFormat => "invalid parameter format",
            ResultCode::AuthorizationError => "authorization letter invalid",
            ResultCode::BusinessError => "business error",
            ResultCode::DataNotFound => "data not found",
            ResultCode::DuplicateData => "duplicate data",
            ResultCode::OperationFailed => "operation failed",
            ResultCode::NationalNodeError => "national node error",
            ResultCode::NationalNodeTimeout => "national node timeout",
            ResultCode::UnknownError => "unknown error",
        }
    }

    pub fn from_code(code: &str) -> Option<ResultCode> {
        ResultCode::ALL.iter().copied().find(|rc| rc.code() == code)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultCode::Success)
    }

    pub fn category(&self) -> ErrorCategory {
        category_of(self.code())
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code(), self.message())
    }
}

/// Classify a raw error code by range. Codes that are not numeric, or fall
/// outside the known ranges, are `Other`.
pub fn category_of(code: &str) -> ErrorCategory {
    match code.parse::<u32>() {
        Ok(2001..=2005) => ErrorCategory::Auth,
        Ok(3001..=3003) => ErrorCategory::Param,
        Ok(5001..=5002) => ErrorCategory::NationalNode,
        Ok(1001..=1003) => ErrorCategory::System,
        _ => ErrorCategory::Other,
    }
}
