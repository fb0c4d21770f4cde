use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ExecutionStatus;

/// Persisted state of one process invocation, keyed by `execution_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub request_id: String,
    pub process_code: String,
    pub interface_code: String,
    pub app_key: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub current_node_id: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retry_count: u32,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Context as it entered the pipeline; the seed for a replay.
    #[serde(default)]
    pub request_snapshot: Option<String>,
    /// Context as it left the pipeline, kept for audit.
    #[serde(default)]
    pub context_snapshot: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn new(
        execution_id: impl Into<String>,
        request_id: impl Into<String>,
        process_code: impl Into<String>,
        interface_code: impl Into<String>,
        app_key: impl Into<String>,
        max_retry_count: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            request_id: request_id.into(),
            process_code: process_code.into(),
            interface_code: interface_code.into(),
            app_key: app_key.into(),
            status: ExecutionStatus::Created,
            current_node_id: None,
            retry_count: 0,
            max_retry_count,
            error_code: None,
            error_message: None,
            request_snapshot: None,
            context_snapshot: None,
            started_at: now,
            ended_at: None,
            updated_at: now,
        }
    }

    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retry_count
    }
}

impl ExecutionRecord {
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    pub(crate) fn finish(
        &mut self,
        status: ExecutionStatus,
        error_code: Option<&str>,
        error_message: Option<&str>,
        now: DateTime<Utc>,
    ) {
        self.status = status;
        self.error_code = error_code.map(str::to_string);
        self.error_message = error_message.map(str::to_string);
        self.ended_at = Some(now);
        self.updated_at = now;
    }

    /// Re-arm for another recovery pass, or give up once retries are spent.
    pub(crate) fn schedule_retry(
        &mut self,
        error_message: Option<&str>,
        now: DateTime<Utc>,
    ) -> ExecutionStatus {
        if let Some(message) = error_message {
            self.error_message = Some(message.to_string());
        }
        if self.retries_exhausted() {
            self.status = ExecutionStatus::Failed;
            self.ended_at = Some(now);
        } else {
            self.status = ExecutionStatus::RetryPending;
            self.retry_count += 1;
        }
        self.updated_at = now;
        self.status
    }

    fn within_age(&self, max_age: Option<chrono::Duration>, now: DateTime<Utc>) -> bool {
        match max_age {
            Some(age) => self.updated_at >= now - age,
            None => true,
        }
    }

    pub(crate) fn is_retry_pending(
        &self,
        max_age: Option<chrono::Duration>,
        now: DateTime<Utc>,
    ) -> bool {
        self.status == ExecutionStatus::RetryPending && self.within_age(max_age, now)
    }

    /// CREATED or RUNNING with no progress for longer than `idle`: the
    /// execution holding it is presumed dead.
    pub(crate) fn is_lease_expired(&self, idle: chrono::Duration, now: DateTime<Utc>) -> bool {
        matches!(self.status, ExecutionStatus::Created | ExecutionStatus::Running)
            && self.updated_at < now - idle
    }

    /// A failed record whose error looks transient and that still has retries.
    pub(crate) fn is_armable(&self, max_age: Option<chrono::Duration>, now: DateTime<Utc>) -> bool {
        self.status == ExecutionStatus::Failed
            && !self.retries_exhausted()
            && self
                .error_code
                .as_deref()
                .map(|code| crate::error::category_of(code).is_transient())
                .unwrap_or(false)
            && self.within_age(max_age, now)
    }
}
