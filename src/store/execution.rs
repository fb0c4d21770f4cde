//! Execution record persistence.
//!
//! Every status change is a read-modify-write performed under the store's
//! lock, so the recovery job's listing never observes a half-applied
//! transition.

use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use crate::core::process_context::{keys, ProcessContext};
use crate::core::runtime_context::{RealTimeProvider, TimeProvider};
use crate::domain::{ExecutionRecord, ExecutionStatus};
use crate::error::{StoreError, StoreResult};

#[async_trait]
pub trait ExecutionRecordStore: Send + Sync {
    async fn create(&self, record: &ExecutionRecord) -> StoreResult<()>;

    async fn get(&self, execution_id: &str) -> StoreResult<Option<ExecutionRecord>>;

    async fn update_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        current_node_id: Option<&str>,
    ) -> StoreResult<()>;

    /// Move to `next` only if the current status is one of `expected`.
    /// Returns whether the transition happened.
    async fn transition(
        &self,
        execution_id: &str,
        expected: &[ExecutionStatus],
        next: ExecutionStatus,
    ) -> StoreResult<bool>;

    async fn complete(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        error_code: Option<&str>,
        error_message: Option<&str>,
    ) -> StoreResult<()>;

    async fn snapshot_context(&self, execution_id: &str, context: &ProcessContext)
        -> StoreResult<()>;

    /// RETRY_PENDING records, oldest first.
    async fn list_retryable(
        &self,
        max_age: Option<Duration>,
        limit: usize,
    ) -> StoreResult<Vec<ExecutionRecord>>;

    /// Re-arm after a failed replay; finalizes FAILED once retries are spent.
    async fn mark_for_retry(
        &self,
        execution_id: &str,
        error_message: Option<&str>,
    ) -> StoreResult<ExecutionStatus>;

    /// Flip transient FAILED records to RETRY_PENDING. Returns how many.
    async fn arm_retryable_failures(&self, max_age: Option<Duration>, limit: usize)
        -> StoreResult<usize>;

    /// Move a CREATED/RUNNING record whose lease has lapsed (no update for
    /// longer than `idle`) to `next`. Returns whether it was reclaimed.
    async fn reclaim_stale(
        &self,
        execution_id: &str,
        idle: Duration,
        next: ExecutionStatus,
    ) -> StoreResult<bool>;

    /// Schedule records with a lapsed lease for retry. Returns how many.
    async fn arm_stale(&self, idle: Duration, limit: usize) -> StoreResult<usize>;

    async fn restore_context(&self, execution_id: &str) -> StoreResult<ProcessContext> {
        let record = self
            .get(execution_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(execution_id.to_string()))?;
        Ok(restore_from_record(&record))
    }
}

/// Rebuild a context from the record's inbound snapshot (falling back to
/// the final one), or a minimal one from the record's identifiers when
/// neither is readable.
pub fn restore_from_record(record: &ExecutionRecord) -> ProcessContext {
    let restored = record
        .request_snapshot
        .as_deref()
        .or(record.context_snapshot.as_deref())
        .and_then(|snapshot| match serde_json::from_str::<ProcessContext>(snapshot) {
            Ok(ctx) => Some(ctx),
            Err(e) => {
                warn!(
                    execution_id = %record.execution_id,
                    error = %e,
                    "Context snapshot unreadable, rebuilding from record"
                );
                None
            }
        });
    let mut ctx = restored.unwrap_or_else(|| {
        ProcessContext::new(
            record.request_id.clone(),
            record.interface_code.clone(),
            record.app_key.clone(),
        )
    });
    ctx.set_attribute(
        keys::EXECUTION_ID,
        serde_json::Value::String(record.execution_id.clone()),
    );
    ctx
}

fn apply_transition(
    record: &mut ExecutionRecord,
    expected: &[ExecutionStatus],
    next: ExecutionStatus,
    now: chrono::DateTime<chrono::Utc>,
) -> bool {
    if !expected.contains(&record.status) {
        return false;
    }
    record.status = next;
    if !next.is_terminal() {
        record.ended_at = None;
    }
    record.touch(now);
    true
}

const LEASE_EXPIRED: &str = "execution lease expired";

fn apply_reclaim(
    record: &mut ExecutionRecord,
    idle: Duration,
    next: ExecutionStatus,
    now: chrono::DateTime<chrono::Utc>,
) -> bool {
    if !record.is_lease_expired(idle, now) {
        return false;
    }
    record.status = next;
    record.ended_at = None;
    record.touch(now);
    true
}

fn select_retryable(
    records: impl Iterator<Item = ExecutionRecord>,
    max_age: Option<Duration>,
    limit: usize,
    now: chrono::DateTime<chrono::Utc>,
) -> Vec<ExecutionRecord> {
    let mut pending: Vec<ExecutionRecord> = records
        .filter(|r| r.is_retry_pending(max_age, now))
        .collect();
    pending.sort_by_key(|r| r.updated_at);
    pending.truncate(limit);
    pending
}

// ================================
// In-memory store
// ================================

pub struct MemoryExecutionStore {
    data: tokio::sync::RwLock<HashMap<String, ExecutionRecord>>,
    clock: Arc<dyn TimeProvider>,
}

impl Default for MemoryExecutionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(RealTimeProvider))
    }

    pub fn with_clock(clock: Arc<dyn TimeProvider>) -> Self {
        Self {
            data: tokio::sync::RwLock::new(HashMap::new()),
            clock,
        }
    }

    async fn update<R>(
        &self,
        execution_id: &str,
        f: impl FnOnce(&mut ExecutionRecord) -> R + Send,
    ) -> StoreResult<R> {
        let mut data = self.data.write().await;
        let record = data
            .get_mut(execution_id)
            .ok_or_else(|| StoreError::NotFound(execution_id.to_string()))?;
        Ok(f(record))
    }
}

#[async_trait]
impl ExecutionRecordStore for MemoryExecutionStore {
    async fn create(&self, record: &ExecutionRecord) -> StoreResult<()> {
        let mut data = self.data.write().await;
        if data.contains_key(&record.execution_id) {
            return Err(StoreError::Storage(format!(
                "execution record already exists: {}",
                record.execution_id
            )));
        }
        data.insert(record.execution_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, execution_id: &str) -> StoreResult<Option<ExecutionRecord>> {
        Ok(self.data.read().await.get(execution_id).cloned())
    }

    async fn update_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        current_node_id: Option<&str>,
    ) -> StoreResult<()> {
        let now = self.clock.now();
        self.update(execution_id, |record| {
            record.status = status;
            if let Some(node_id) = current_node_id {
                record.current_node_id = Some(node_id.to_string());
            }
            record.touch(now);
        })
        .await
    }

    async fn transition(
        &self,
        execution_id: &str,
        expected: &[ExecutionStatus],
        next: ExecutionStatus,
    ) -> StoreResult<bool> {
        let now = self.clock.now();
        self.update(execution_id, |record| {
            apply_transition(record, expected, next, now)
        })
        .await
    }

    async fn complete(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        error_code: Option<&str>,
        error_message: Option<&str>,
    ) -> StoreResult<()> {
        let now = self.clock.now();
        self.update(execution_id, |record| {
            record.finish(status, error_code, error_message, now)
        })
        .await
    }

    async fn snapshot_context(
        &self,
        execution_id: &str,
        context: &ProcessContext,
    ) -> StoreResult<()> {
        let snapshot = serde_json::to_string(context)?;
        let now = self.clock.now();
        self.update(execution_id, |record| {
            record.context_snapshot = Some(snapshot);
            record.touch(now);
        })
        .await
    }

    async fn list_retryable(
        &self,
        max_age: Option<Duration>,
        limit: usize,
    ) -> StoreResult<Vec<ExecutionRecord>> {
        let now = self.clock.now();
        let data = self.data.read().await;
        Ok(select_retryable(data.values().cloned(), max_age, limit, now))
    }

    async fn mark_for_retry(
        &self,
        execution_id: &str,
        error_message: Option<&str>,
    ) -> StoreResult<ExecutionStatus> {
        let now = self.clock.now();
        self.update(execution_id, |record| {
            record.schedule_retry(error_message, now)
        })
        .await
    }

    async fn arm_retryable_failures(
        &self,
        max_age: Option<Duration>,
        limit: usize,
    ) -> StoreResult<usize> {
        let now = self.clock.now();
        let mut data = self.data.write().await;
        let mut armed = 0;
        for record in data.values_mut() {
            if armed >= limit {
                break;
            }
            if record.is_armable(max_age, now) {
                record.schedule_retry(None, now);
                armed += 1;
            }
        }
        Ok(armed)
    }

    async fn reclaim_stale(
        &self,
        execution_id: &str,
        idle: Duration,
        next: ExecutionStatus,
    ) -> StoreResult<bool> {
        let now = self.clock.now();
        self.update(execution_id, |record| apply_reclaim(record, idle, next, now))
            .await
    }

    async fn arm_stale(&self, idle: Duration, limit: usize) -> StoreResult<usize> {
        let now = self.clock.now();
        let mut data = self.data.write().await;
        let mut armed = 0;
        for record in data.values_mut() {
            if armed >= limit {
                break;
            }
            if record.is_lease_expired(idle, now) {
                record.schedule_retry(Some(LEASE_EXPIRED), now);
                armed += 1;
            }
        }
        Ok(armed)
    }
}

// ================================
// File-backed store
// ================================

/// One JSON document per record under `dir`. A process-wide mutex
/// serializes read-modify-write cycles.
pub struct FileExecutionStore {
    dir: PathBuf,
    lock: tokio::sync::Mutex<()>,
    clock: Arc<dyn TimeProvider>,
}

impl FileExecutionStore {
    pub fn new(dir: impl AsRef<Path>) -> StoreResult<Self> {
        Self::with_clock(dir, Arc::new(RealTimeProvider))
    }

    pub fn with_clock(dir: impl AsRef<Path>, clock: Arc<dyn TimeProvider>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: tokio::sync::Mutex::new(()),
            clock,
        })
    }

    fn path_for(&self, execution_id: &str) -> PathBuf {
        self.dir.join(format!("{}.execution.json", execution_id))
    }

    async fn read(&self, execution_id: &str) -> StoreResult<Option<ExecutionRecord>> {
        let bytes = match tokio::fs::read(self.path_for(execution_id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn write(&self, record: &ExecutionRecord) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(record)?;
        let path = self.path_for(&record.execution_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn read_all(&self) -> StoreResult<Vec<ExecutionRecord>> {
        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.ends_with(".execution.json") {
                continue;
            }
            let bytes = tokio::fs::read(entry.path()).await?;
            match serde_json::from_slice::<ExecutionRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => warn!(file = %name, error = %e, "Skipping corrupted execution record"),
            }
        }
        Ok(records)
    }

    async fn update<R>(
        &self,
        execution_id: &str,
        f: impl FnOnce(&mut ExecutionRecord) -> R + Send,
    ) -> StoreResult<R> {
        let _guard = self.lock.lock().await;
        let mut record = self
            .read(execution_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(execution_id.to_string()))?;
        let result = f(&mut record);
        self.write(&record).await?;
        Ok(result)
    }
}

#[async_trait]
impl ExecutionRecordStore for FileExecutionStore {
    async fn create(&self, record: &ExecutionRecord) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        if self.read(&record.execution_id).await?.is_some() {
            return Err(StoreError::Storage(format!(
                "execution record already exists: {}",
                record.execution_id
            )));
        }
        self.write(record).await
    }

    async fn get(&self, execution_id: &str) -> StoreResult<Option<ExecutionRecord>> {
        let _guard = self.lock.lock().await;
        self.read(execution_id).await
    }

    async fn update_status(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        current_node_id: Option<&str>,
    ) -> StoreResult<()> {
        let now = self.clock.now();
        let node_id = current_node_id.map(str::to_string);
        self.update(execution_id, move |record| {
            record.status = status;
            if node_id.is_some() {
                record.current_node_id = node_id;
            }
            record.touch(now);
        })
        .await
    }

    async fn transition(
        &self,
        execution_id: &str,
        expected: &[ExecutionStatus],
        next: ExecutionStatus,
    ) -> StoreResult<bool> {
        let now = self.clock.now();
        let expected = expected.to_vec();
        self.update(execution_id, move |record| {
            apply_transition(record, &expected, next, now)
        })
        .await
    }

    async fn complete(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        error_code: Option<&str>,
        error_message: Option<&str>,
    ) -> StoreResult<()> {
        let now = self.clock.now();
        let code = error_code.map(str::to_string);
        let message = error_message.map(str::to_string);
        self.update(execution_id, move |record| {
            record.finish(status, code.as_deref(), message.as_deref(), now)
        })
        .await
    }

    async fn snapshot_context(
        &self,
        execution_id: &str,
        context: &ProcessContext,
    ) -> StoreResult<()> {
        let snapshot = serde_json::to_string(context)?;
        let now = self.clock.now();
        self.update(execution_id, move |record| {
            record.context_snapshot = Some(snapshot);
            record.touch(now);
        })
        .await
    }

    async fn list_retryable(
        &self,
        max_age: Option<Duration>,
        limit: usize,
    ) -> StoreResult<Vec<ExecutionRecord>> {
        let now = self.clock.now();
        let _guard = self.lock.lock().await;
        let records = self.read_all().await?;
        Ok(select_retryable(records.into_iter(), max_age, limit, now))
    }

    async fn mark_for_retry(
        &self,
        execution_id: &str,
        error_message: Option<&str>,
    ) -> StoreResult<ExecutionStatus> {
        let now = self.clock.now();
        let message = error_message.map(str::to_string);
        self.update(execution_id, move |record| {
            record.schedule_retry(message.as_deref(), now)
        })
        .await
    }

    async fn arm_retryable_failures(
        &self,
        max_age: Option<Duration>,
        limit: usize,
    ) -> StoreResult<usize> {
        let now = self.clock.now();
        let _guard = self.lock.lock().await;
        let mut armed = 0;
        for mut record in self.read_all().await? {
            if armed >= limit {
                break;
            }
            if record.is_armable(max_age, now) {
                record.schedule_retry(None, now);
                self.write(&record).await?;
                armed += 1;
            }
        }
        Ok(armed)
    }

    async fn reclaim_stale(
        &self,
        execution_id: &str,
        idle: Duration,
        next: ExecutionStatus,
    ) -> StoreResult<bool> {
        let now = self.clock.now();
        self.update(execution_id, move |record| {
            apply_reclaim(record, idle, next, now)
        })
        .await
    }

    async fn arm_stale(&self, idle: Duration, limit: usize) -> StoreResult<usize> {
        let now = self.clock.now();
        let _guard = self.lock.lock().await;
        let mut armed = 0;
        for mut record in self.read_all().await? {
            if armed >= limit {
                break;
            }
            if record.is_lease_expired(idle, now) {
                record.schedule_retry(Some(LEASE_EXPIRED), now);
                self.write(&record).await?;
                armed += 1;
            }
        }
        Ok(armed)
    }
}
