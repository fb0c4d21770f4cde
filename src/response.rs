//! Outcome of a process run and the envelope returned to city callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::process_context::ProcessContext;
use crate::error::ResultCode;

/// What the engine reports for one run of a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub execution_id: String,
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ProcessResult {
    pub fn from_context(execution_id: impl Into<String>, context: &ProcessContext) -> Self {
        if context.is_success() {
            return Self {
                execution_id: execution_id.into(),
                code: ResultCode::Success.code().to_string(),
                message: ResultCode::Success.message().to_string(),
                data: context.response_data.clone(),
            };
        }
        let code = context
            .error_code()
            .unwrap_or(ResultCode::SystemError.code())
            .to_string();
        let message = context
            .error_message()
            .map(str::to_string)
            .or_else(|| ResultCode::from_code(&code).map(|rc| rc.message().to_string()))
            .unwrap_or_else(|| ResultCode::UnknownError.message().to_string());
        Self {
            execution_id: execution_id.into(),
            code,
            message,
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == ResultCode::Success.code()
    }
}

/// Sealed reply body: the sign node's `key`/`signatureData` output renamed
/// for the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    pub timestamp: Option<String>,
    pub wrapped_key: Option<String>,
    pub signature: Option<String>,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerResponse {
    /// `00` on success, `01` otherwise.
    pub status: String,
    pub response_code: String,
    pub response_desc: String,
    pub response_body: Option<ResponseBody>,
}

pub const STATUS_OK: &str = "00";
pub const STATUS_FAILED: &str = "01";

impl CallerResponse {
    pub fn from_result(result: &ProcessResult) -> Self {
        if !result.is_success() {
            return Self::failure(&result.code, &result.message);
        }
        let body = result.data.as_ref().map(|data| {
            let field = |name: &str| data.get(name).and_then(Value::as_str).map(str::to_string);
            match data {
                Value::Object(map) if map.contains_key("signatureData") => ResponseBody {
                    timestamp: field("timestamp"),
                    wrapped_key: field("key"),
                    signature: field("signatureData"),
                    data: map.get("data").cloned().unwrap_or(Value::Null),
                },
                other => ResponseBody {
                    timestamp: None,
                    wrapped_key: None,
                    signature: None,
                    data: other.clone(),
                },
            }
        });
        Self {
            status: STATUS_OK.to_string(),
            response_code: result.code.clone(),
            response_desc: result.message.clone(),
            response_body: body,
        }
    }

    pub fn failure(code: &str, message: &str) -> Self {
        Self {
            status: STATUS_FAILED.to_string(),
            response_code: code.to_string(),
            response_desc: message.to_string(),
            response_body: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}
