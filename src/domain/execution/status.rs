//! Execution status: the persisted lifecycle of one process invocation.

use serde::{Deserialize, Serialize};

/// `Created -> Running -> Success | Failed`; a failed record may be armed as
/// `RetryPending` and is then claimed back to `Running` by a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Created,
    Running,
    Success,
    Failed,
    RetryPending,
}

impl ExecutionStatus {
    /// Numeric code used by the legacy persistence schema.
    pub fn code(&self) -> u8 {
        match self {
            ExecutionStatus::Created => 0,
            ExecutionStatus::Running => 1,
            ExecutionStatus::Success => 2,
            ExecutionStatus::Failed => 3,
            ExecutionStatus::RetryPending => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ExecutionStatus::Created),
            1 => Some(ExecutionStatus::Running),
            2 => Some(ExecutionStatus::Success),
            3 => Some(ExecutionStatus::Failed),
            4 => Some(ExecutionStatus::RetryPending),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Failed)
    }

    /// Statuses a replay may claim the record from.
    pub fn replayable() -> &'static [ExecutionStatus] {
        &[
            ExecutionStatus::Success,
            ExecutionStatus::Failed,
            ExecutionStatus::RetryPending,
        ]
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Created => "CREATED",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::RetryPending => "RETRY_PENDING",
        };
        f.write_str(s)
    }
}
