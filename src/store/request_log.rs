use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreResult;

/// Audit trail entry for one inbound call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLogEntry {
    pub request_id: String,
    pub interface_code: String,
    pub app_key: String,
    #[serde(default)]
    pub execution_id: Option<String>,
    #[serde(default)]
    pub request_ip: Option<String>,
    pub request_params: Value,
    pub logged_at: DateTime<Utc>,
}

#[async_trait]
pub trait RequestLogStore: Send + Sync {
    async fn append(&self, entry: RequestLogEntry) -> StoreResult<()>;
}

#[derive(Default)]
pub struct MemoryRequestLogStore {
    entries: RwLock<Vec<RequestLogEntry>>,
}

impl MemoryRequestLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<RequestLogEntry> {
        self.entries.read().clone()
    }
}

#[async_trait]
impl RequestLogStore for MemoryRequestLogStore {
    async fn append(&self, entry: RequestLogEntry) -> StoreResult<()> {
        self.entries.write().push(entry);
        Ok(())
    }
}
