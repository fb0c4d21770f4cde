//! Process engine: runs the configured node pipeline of a process against a
//! context, tracking an execution record for recovery and replay.
//!
//! Synchronous nodes run in order with exponential-backoff retries; the
//! first node that still fails after its retries halts the pipeline. Nodes
//! flagged `asyncExecution` get a copy of the context on the async pool and
//! their outcome is only logged.
//!
//! Replay reuses the record's `executionId`, claims it with a conditional
//! status transition so two replays of one record cannot overlap, and runs
//! the whole pipeline again from the first node. Every node therefore has
//! to tolerate being re-run for the same request.
//!
//! A RUNNING claim is a lease renewed by every node step. Once it has gone
//! `leaseTimeoutSecs` without renewal the holder is presumed dead and an
//! operator replay may take the record over.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::core::async_pool::{AsyncNodePool, AsyncPoolConfig};
use crate::core::process_context::{keys, ProcessContext};
use crate::core::retry::RetryPolicy;
use crate::core::runtime_context::RuntimeContext;
use crate::domain::{ExecutionRecord, ExecutionStatus};
use crate::error::{EngineError, ResultCode, StoreError};
use crate::nodes::{Node, NodeRegistry};
use crate::response::ProcessResult;
use crate::store::{restore_from_record, ExecutionRecordStore, NodeConfig, NodeConfigStore};

fn default_record_max_retry_count() -> u32 { 3 }
fn default_lease_timeout_secs() -> Option<u64> { Some(300) }

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Used by nodes without a (valid) `retryConfig`.
    #[serde(default)]
    pub default_retry: RetryPolicy,
    /// How many recovery passes a failed execution gets.
    #[serde(default = "default_record_max_retry_count")]
    pub max_retry_count: u32,
    /// Budget for the synchronous part of one run, retries included.
    #[serde(default)]
    pub process_deadline_ms: Option<u64>,
    /// A CREATED/RUNNING record idle this long may be reclaimed.
    /// `None` keeps claims forever.
    #[serde(default = "default_lease_timeout_secs")]
    pub lease_timeout_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_retry: RetryPolicy::default(),
            max_retry_count: default_record_max_retry_count(),
            process_deadline_ms: None,
            lease_timeout_secs: default_lease_timeout_secs(),
        }
    }
}

impl EngineConfig {
    pub fn lease_timeout(&self) -> Option<chrono::Duration> {
        self.lease_timeout_secs
            .map(|secs| chrono::Duration::seconds(secs.min(u64::from(u32::MAX)) as i64))
    }
}

/// A configured node resolved against the catalog.
struct Step {
    config: NodeConfig,
    node: Arc<dyn Node>,
    settings: Map<String, Value>,
}

pub struct ProcessEngine {
    registry: Arc<NodeRegistry>,
    node_configs: Arc<dyn NodeConfigStore>,
    records: Arc<dyn ExecutionRecordStore>,
    async_pool: AsyncNodePool,
    runtime: RuntimeContext,
    config: EngineConfig,
}

impl ProcessEngine {
    pub fn new(
        registry: Arc<NodeRegistry>,
        node_configs: Arc<dyn NodeConfigStore>,
        records: Arc<dyn ExecutionRecordStore>,
        runtime: RuntimeContext,
        config: EngineConfig,
        async_pool: AsyncPoolConfig,
    ) -> Self {
        Self {
            registry,
            node_configs,
            records,
            async_pool: AsyncNodePool::new(async_pool),
            runtime,
            config,
        }
    }

    pub fn records(&self) -> &Arc<dyn ExecutionRecordStore> {
        &self.records
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `process_code` against a fresh context under a new execution
    /// record. Node failures are reported in the result; only record store
    /// failures surface as `Err`.
    pub async fn execute_process(
        &self,
        process_code: &str,
        context: &mut ProcessContext,
    ) -> Result<ProcessResult, EngineError> {
        let execution_id = self.runtime.next_id();
        context.set_attribute(keys::EXECUTION_ID, Value::String(execution_id.clone()));
        let mut record = ExecutionRecord::new(
            execution_id.clone(),
            context.request_id(),
            process_code,
            context.interface_code(),
            context.app_key(),
            self.config.max_retry_count,
            self.runtime.now(),
        );
        let seed = serde_json::to_string(&*context).map_err(StoreError::from)?;
        record.request_snapshot = Some(seed);
        self.records.create(&record).await?;
        self.records
            .update_status(&execution_id, ExecutionStatus::Running, None)
            .await?;

        info!(
            execution_id = %execution_id,
            process_code,
            request_id = %context.request_id(),
            "Process started"
        );
        self.run_pipeline(&execution_id, process_code, context).await;
        self.finalize(&execution_id, context).await?;
        Ok(ProcessResult::from_context(execution_id, context))
    }

    /// Re-run a recorded execution from its snapshot. Takes SUCCESS, FAILED
    /// and RETRY_PENDING records, and running ones whose lease has lapsed.
    pub async fn replay_process(&self, execution_id: &str) -> Result<ProcessResult, EngineError> {
        self.replay(execution_id, ExecutionStatus::replayable(), true)
            .await
    }

    /// Replay for the recovery job: only a record still in RETRY_PENDING is
    /// claimed, so one finished by other means since it was listed is left
    /// alone.
    pub async fn replay_pending(&self, execution_id: &str) -> Result<ProcessResult, EngineError> {
        self.replay(execution_id, &[ExecutionStatus::RetryPending], false)
            .await
    }

    async fn replay(
        &self,
        execution_id: &str,
        expected: &[ExecutionStatus],
        reclaim_stale: bool,
    ) -> Result<ProcessResult, EngineError> {
        let record = self
            .records
            .get(execution_id)
            .await?
            .ok_or_else(|| EngineError::ExecutionNotFound(execution_id.to_string()))?;

        let claimed = self
            .records
            .transition(execution_id, expected, ExecutionStatus::Running)
            .await?;
        if !claimed {
            if !reclaim_stale {
                return Err(EngineError::NotRetryPending(execution_id.to_string()));
            }
            if !self.reclaim(execution_id).await? {
                return Err(EngineError::ReplayInProgress(execution_id.to_string()));
            }
        }

        let mut context = restore_from_record(&record);
        context.reset_outcome();
        info!(
            execution_id,
            process_code = %record.process_code,
            retry_count = record.retry_count,
            "Replaying process"
        );
        self.run_pipeline(execution_id, &record.process_code, &mut context)
            .await;
        self.finalize(execution_id, &context).await?;
        Ok(ProcessResult::from_context(execution_id, &context))
    }

    async fn reclaim(&self, execution_id: &str) -> Result<bool, EngineError> {
        let Some(idle) = self.config.lease_timeout() else {
            return Ok(false);
        };
        let reclaimed = self
            .records
            .reclaim_stale(execution_id, idle, ExecutionStatus::Running)
            .await?;
        if reclaimed {
            warn!(execution_id, "Reclaimed execution with lapsed lease");
        }
        Ok(reclaimed)
    }

    async fn finalize(
        &self,
        execution_id: &str,
        context: &ProcessContext,
    ) -> Result<(), EngineError> {
        let status = if context.is_success() {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failed
        };
        self.records
            .complete(
                execution_id,
                status,
                context.error_code(),
                context.error_message(),
            )
            .await?;
        self.records.snapshot_context(execution_id, context).await?;
        info!(
            execution_id,
            status = %status,
            error_code = ?context.error_code(),
            "Process finished"
        );
        Ok(())
    }

    /// Resolve every configured node before anything runs.
    async fn load_steps(
        &self,
        process_code: &str,
        context: &mut ProcessContext,
    ) -> Option<Vec<Step>> {
        let configs = match self.node_configs.get_enabled_ordered_nodes(process_code).await {
            Ok(configs) => configs,
            Err(e) => {
                error!(process_code, error = %e, "Failed to load process configuration");
                context.mark_failure(
                    ResultCode::SystemError,
                    ResultCode::SystemError.message(),
                );
                return None;
            }
        };
        if configs.is_empty() {
            error!(process_code, "No nodes configured");
            context.mark_failure(
                ResultCode::SystemError,
                format!("no nodes configured for process {}", process_code),
            );
            return None;
        }

        let mut steps = Vec::with_capacity(configs.len());
        for config in configs {
            let Some(node) = self.registry.get(&config.node_id) else {
                error!(process_code, node_id = %config.node_id, "Node not registered");
                context.mark_failure(
                    ResultCode::SystemError,
                    format!("node not found: {}", config.node_id),
                );
                return None;
            };
            let settings = match config.parsed_config() {
                Ok(settings) => settings,
                Err(e) => {
                    error!(process_code, node_id = %config.node_id, error = %e, "Invalid node configuration");
                    context.mark_failure(
                        ResultCode::SystemError,
                        format!("invalid configuration for node {}", config.node_id),
                    );
                    return None;
                }
            };
            steps.push(Step {
                config,
                node,
                settings,
            });
        }
        Some(steps)
    }

    async fn run_pipeline(
        &self,
        execution_id: &str,
        process_code: &str,
        context: &mut ProcessContext,
    ) {
        let Some(steps) = self.load_steps(process_code, context).await else {
            return;
        };
        let deadline = self
            .config
            .process_deadline_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        for step in steps {
            let node_id = step.config.node_id.as_str();
            if let Err(e) = self
                .records
                .update_status(execution_id, ExecutionStatus::Running, Some(node_id))
                .await
            {
                warn!(execution_id, node_id, error = %e, "Failed to record current node");
            }
            context.set_attribute(keys::NODE_CONFIG, Value::Object(step.settings.clone()));

            if step.config.async_execution {
                self.dispatch_async(execution_id, &step, context).await;
                continue;
            }

            let policy =
                RetryPolicy::parse_or(step.config.retry_config.as_deref(), &self.config.default_retry);
            self.run_with_retry(execution_id, &step, &policy, deadline, context)
                .await;
            if !context.is_success() {
                warn!(
                    execution_id,
                    node_id,
                    error_code = ?context.error_code(),
                    "Pipeline halted"
                );
                break;
            }
        }
    }

    async fn run_with_retry(
        &self,
        execution_id: &str,
        step: &Step,
        policy: &RetryPolicy,
        deadline: Option<Instant>,
        context: &mut ProcessContext,
    ) {
        let node_id = step.config.node_id.as_str();
        let entry = context.outcome();

        for attempt in 1..=policy.max_attempts() {
            if attempt > 1 {
                let delay = policy.delay_before_attempt(attempt);
                if deadline.is_some_and(|deadline| Instant::now() + delay > deadline) {
                    warn!(execution_id, node_id, attempt, "Process deadline exceeded");
                    context.mark_failure(ResultCode::SystemError, "process deadline exceeded");
                    return;
                }
                info!(
                    execution_id,
                    node_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying node"
                );
                tokio::time::sleep(delay).await;
                context.restore_outcome(entry.clone());
            }

            let passed = match AssertUnwindSafe(step.node.execute(context))
                .catch_unwind()
                .await
            {
                Ok(passed) => passed,
                Err(_) => {
                    error!(execution_id, node_id, attempt, "Node panicked");
                    false
                }
            };
            if passed {
                debug!(execution_id, node_id, attempt, "Node passed");
                return;
            }
        }

        if context.is_success() {
            context.mark_failure(
                ResultCode::SystemError,
                format!("node execution failed: {}", step.config.display_name()),
            );
        }
    }

    async fn dispatch_async(&self, execution_id: &str, step: &Step, context: &ProcessContext) {
        let node = Arc::clone(&step.node);
        let node_id = step.config.node_id.clone();
        let execution = execution_id.to_string();
        let mut detached = context.clone();

        let job = async move {
            let passed = AssertUnwindSafe(node.execute(&mut detached))
                .catch_unwind()
                .await
                .unwrap_or(false);
            if passed {
                debug!(execution_id = %execution, node_id = %node_id, "Async node finished");
            } else {
                warn!(
                    execution_id = %execution,
                    node_id = %node_id,
                    error_code = ?detached.error_code(),
                    "Async node failed"
                );
            }
        }
        .boxed();

        let dispatch = self.async_pool.submit(job).await;
        debug!(execution_id, node_id = %step.config.node_id, ?dispatch, "Async node submitted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::runtime_context::{FakeIdGenerator, FakeTimeProvider, TimeProvider};
    use crate::store::{MemoryExecutionStore, MemoryNodeConfigStore};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fails until `passes_from` attempts have been made; records when each
    /// attempt started.
    struct ScriptedNode {
        id: &'static str,
        passes_from: usize,
        calls: AtomicUsize,
        started: Mutex<Vec<Instant>>,
        marks_error: bool,
    }

    impl ScriptedNode {
        fn new(id: &'static str, passes_from: usize) -> Arc<Self> {
            Arc::new(Self {
                id,
                passes_from,
                calls: AtomicUsize::new(0),
                started: Mutex::new(Vec::new()),
                marks_error: false,
            })
        }

        fn failing_with_error(id: &'static str) -> Arc<Self> {
            Arc::new(Self {
                id,
                passes_from: usize::MAX,
                calls: AtomicUsize::new(0),
                started: Mutex::new(Vec::new()),
                marks_error: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Node for ScriptedNode {
        fn id(&self) -> &str {
            self.id
        }

        fn name(&self) -> &str {
            self.id
        }

        async fn execute(&self, context: &mut ProcessContext) -> bool {
            self.started.lock().unwrap().push(Instant::now());
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.passes_from {
                return true;
            }
            if self.marks_error {
                context.mark_failure(ResultCode::NationalNodeError, "upstream unavailable");
            }
            false
        }
    }

    struct PanickingNode;

    #[async_trait]
    impl Node for PanickingNode {
        fn id(&self) -> &str {
            "panics"
        }

        fn name(&self) -> &str {
            "panics"
        }

        async fn execute(&self, _context: &mut ProcessContext) -> bool {
            panic!("node bug");
        }
    }

    struct Harness {
        engine: ProcessEngine,
        configs: Arc<MemoryNodeConfigStore>,
        records: Arc<MemoryExecutionStore>,
        clock: Arc<FakeTimeProvider>,
    }

    fn harness(nodes: Vec<Arc<dyn Node>>, config: EngineConfig) -> Harness {
        let mut registry = NodeRegistry::new();
        for node in nodes {
            registry.register(node);
        }
        let clock = Arc::new(FakeTimeProvider::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        ));
        let configs = Arc::new(MemoryNodeConfigStore::new());
        let records = Arc::new(MemoryExecutionStore::with_clock(clock.clone()));
        let engine = ProcessEngine::new(
            Arc::new(registry),
            configs.clone(),
            records.clone(),
            RuntimeContext::new(clock.clone(), Arc::new(FakeIdGenerator::new("exec".into()))),
            config,
            AsyncPoolConfig::default(),
        );
        Harness {
            engine,
            configs,
            records,
            clock,
        }
    }

    fn ctx() -> ProcessContext {
        ProcessContext::new("r1", "IF001", "city-a")
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_timing_and_exhaustion() {
        let node = ScriptedNode::new("flaky", usize::MAX);
        let h = harness(vec![node.clone()], EngineConfig::default());
        h.configs
            .insert(NodeConfig::new("IF001", "flaky", 1).with_retry(RetryPolicy::new(3, 1000, 2.0)))
            .unwrap();

        let mut context = ctx();
        let result = h.engine.execute_process("IF001", &mut context).await.unwrap();

        assert_eq!(node.calls(), 4);
        let started = node.started.lock().unwrap().clone();
        let gaps: Vec<u128> = started
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect();
        for (gap, expected) in gaps.iter().zip([1000u128, 2000, 4000]) {
            assert!(
                *gap >= expected && *gap < expected + 5,
                "gap {} ms, expected about {} ms",
                gap,
                expected
            );
        }
        assert_eq!(gaps.len(), 3);
        assert_eq!(result.code, "1001");
        assert_eq!(result.message, "node execution failed: flaky");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_and_clears_failure() {
        let node = ScriptedNode::new("flaky", 2);
        let h = harness(vec![node.clone()], EngineConfig::default());
        h.configs
            .insert(NodeConfig::new("IF001", "flaky", 1).with_retry(RetryPolicy::new(2, 10, 1.0)))
            .unwrap();

        let result = h.engine.execute_process("IF001", &mut ctx()).await.unwrap();
        assert!(result.is_success());
        assert_eq!(node.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_short_circuits_pipeline() {
        let a = ScriptedNode::new("a", 1);
        let b = ScriptedNode::failing_with_error("b");
        let c = ScriptedNode::new("c", 1);
        let h = harness(vec![a.clone(), b.clone(), c.clone()], EngineConfig::default());
        h.configs
            .insert_all([
                NodeConfig::new("IF001", "a", 1),
                NodeConfig::new("IF001", "b", 2).with_retry(RetryPolicy::none()),
                NodeConfig::new("IF001", "c", 3),
            ])
            .unwrap();

        let mut context = ctx();
        let result = h.engine.execute_process("IF001", &mut context).await.unwrap();

        assert_eq!(c.calls(), 0);
        assert_eq!(result.code, "5001");
        assert_eq!(result.message, "upstream unavailable");

        let record = h.records.get(&result.execution_id).await.unwrap().unwrap();
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(record.current_node_id.as_deref(), Some("b"));
        assert!(record.context_snapshot.is_some());
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_system_error() {
        let h = harness(vec![], EngineConfig::default());
        let result = h.engine.execute_process("IF404", &mut ctx()).await.unwrap();
        assert_eq!(result.code, "1001");

        let record = h.records.get(&result.execution_id).await.unwrap().unwrap();
        assert_eq!(record.status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn test_unknown_node_fails_before_any_node_runs() {
        let a = ScriptedNode::new("a", 1);
        let h = harness(vec![a.clone()], EngineConfig::default());
        h.configs
            .insert_all([
                NodeConfig::new("IF001", "a", 1),
                NodeConfig::new("IF001", "ghost", 2),
            ])
            .unwrap();

        let result = h.engine.execute_process("IF001", &mut ctx()).await.unwrap();
        assert_eq!(result.code, "1001");
        assert_eq!(result.message, "node not found: ghost");
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_side_fails_fast() {
        let a = ScriptedNode::new("a", 1);
        let h = harness(vec![a.clone()], EngineConfig::default());
        h.configs
            .insert(NodeConfig::new("IF001", "a", 1).with_config(json!({"side": "county"})))
            .unwrap();

        let result = h.engine.execute_process("IF001", &mut ctx()).await.unwrap();
        assert_eq!(result.code, "1001");
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn test_async_node_outcome_is_not_reported() {
        let background = ScriptedNode::failing_with_error("audit");
        let last = ScriptedNode::new("last", 1);
        let h = harness(vec![background.clone(), last.clone()], EngineConfig::default());
        h.configs
            .insert_all([
                NodeConfig::new("IF001", "audit", 1).run_async(),
                NodeConfig::new("IF001", "last", 2),
            ])
            .unwrap();

        let mut context = ctx();
        let result = h.engine.execute_process("IF001", &mut context).await.unwrap();
        assert!(result.is_success());
        assert_eq!(last.calls(), 1);

        for _ in 0..50 {
            if background.calls() > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(background.calls(), 1);
        assert!(context.is_success());
    }

    #[tokio::test]
    async fn test_panic_counts_as_failed_attempt() {
        let h = harness(vec![Arc::new(PanickingNode)], EngineConfig::default());
        h.configs
            .insert(NodeConfig::new("IF001", "panics", 1).with_retry(RetryPolicy::none()))
            .unwrap();

        let result = h.engine.execute_process("IF001", &mut ctx()).await.unwrap();
        assert_eq!(result.code, "1001");
        assert_eq!(result.message, "node execution failed: panics");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_retries() {
        let node = ScriptedNode::new("flaky", usize::MAX);
        let config = EngineConfig {
            process_deadline_ms: Some(2500),
            ..EngineConfig::default()
        };
        let h = harness(vec![node.clone()], config);
        h.configs
            .insert(NodeConfig::new("IF001", "flaky", 1).with_retry(RetryPolicy::new(3, 1000, 2.0)))
            .unwrap();

        let result = h.engine.execute_process("IF001", &mut ctx()).await.unwrap();
        assert_eq!(node.calls(), 2);
        assert_eq!(result.message, "process deadline exceeded");
    }

    #[tokio::test]
    async fn test_replay_unknown_execution() {
        let h = harness(vec![], EngineConfig::default());
        let err = h.engine.replay_process("missing").await.unwrap_err();
        assert!(matches!(err, EngineError::ExecutionNotFound(_)));
    }

    #[tokio::test]
    async fn test_replay_reruns_whole_pipeline_under_same_id() {
        let a = ScriptedNode::new("a", 1);
        let b = ScriptedNode::new("b", 2);
        let h = harness(vec![a.clone(), b.clone()], EngineConfig::default());
        h.configs
            .insert_all([
                NodeConfig::new("IF001", "a", 1),
                NodeConfig::new("IF001", "b", 2).with_retry(RetryPolicy::none()),
            ])
            .unwrap();

        let mut context = ctx();
        context.request_params.insert("orgCode".into(), json!("330100"));
        let first = h.engine.execute_process("IF001", &mut context).await.unwrap();
        assert!(!first.is_success());

        let replayed = h.engine.replay_process(&first.execution_id).await.unwrap();
        assert!(replayed.is_success());
        assert_eq!(replayed.execution_id, first.execution_id);
        assert_eq!(a.calls(), 2);
        assert_eq!(b.calls(), 2);

        let record = h.records.get(&first.execution_id).await.unwrap().unwrap();
        assert_eq!(record.status, ExecutionStatus::Success);
        let snapshot: ProcessContext =
            serde_json::from_str(record.context_snapshot.as_deref().unwrap()).unwrap();
        assert_eq!(snapshot.param_str("orgCode"), Some("330100"));
    }

    #[tokio::test]
    async fn test_replay_of_running_record_is_refused() {
        let h = harness(vec![], EngineConfig::default());
        let record = ExecutionRecord::new(
            "exec-busy",
            "r1",
            "IF001",
            "IF001",
            "city-a",
            3,
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        );
        h.records.create(&record).await.unwrap();
        h.records
            .update_status("exec-busy", ExecutionStatus::Running, None)
            .await
            .unwrap();

        let err = h.engine.replay_process("exec-busy").await.unwrap_err();
        assert!(matches!(err, EngineError::ReplayInProgress(_)));
    }

    #[tokio::test]
    async fn test_lapsed_lease_allows_replay() {
        let a = ScriptedNode::new("a", 1);
        let h = harness(vec![a.clone()], EngineConfig::default());
        h.configs.insert(NodeConfig::new("IF001", "a", 1)).unwrap();
        let record = ExecutionRecord::new(
            "exec-stuck",
            "r1",
            "IF001",
            "IF001",
            "city-a",
            3,
            h.clock.now(),
        );
        h.records.create(&record).await.unwrap();
        h.records
            .update_status("exec-stuck", ExecutionStatus::Running, Some("a"))
            .await
            .unwrap();

        h.clock.advance(chrono::Duration::seconds(299));
        let err = h.engine.replay_process("exec-stuck").await.unwrap_err();
        assert!(matches!(err, EngineError::ReplayInProgress(_)));

        h.clock.advance(chrono::Duration::seconds(2));
        let replayed = h.engine.replay_process("exec-stuck").await.unwrap();
        assert!(replayed.is_success());
        assert_eq!(a.calls(), 1);
        let record = h.records.get("exec-stuck").await.unwrap().unwrap();
        assert_eq!(record.status, ExecutionStatus::Success);
    }

    #[tokio::test]
    async fn test_lease_without_timeout_never_lapses() {
        let config = EngineConfig {
            lease_timeout_secs: None,
            ..EngineConfig::default()
        };
        let h = harness(vec![], config);
        let record = ExecutionRecord::new(
            "exec-held",
            "r1",
            "IF001",
            "IF001",
            "city-a",
            3,
            h.clock.now(),
        );
        h.records.create(&record).await.unwrap();
        h.records
            .update_status("exec-held", ExecutionStatus::Running, None)
            .await
            .unwrap();

        h.clock.advance(chrono::Duration::days(7));
        let err = h.engine.replay_process("exec-held").await.unwrap_err();
        assert!(matches!(err, EngineError::ReplayInProgress(_)));
    }

    #[tokio::test]
    async fn test_pending_replay_only_claims_retry_pending() {
        let a = ScriptedNode::new("a", 1);
        let h = harness(vec![a.clone()], EngineConfig::default());
        h.configs.insert(NodeConfig::new("IF001", "a", 1)).unwrap();
        let first = h.engine.execute_process("IF001", &mut ctx()).await.unwrap();
        assert!(first.is_success());

        let err = h.engine.replay_pending(&first.execution_id).await.unwrap_err();
        assert!(matches!(err, EngineError::NotRetryPending(_)));
        assert_eq!(err.result_code(), ResultCode::OperationFailed);
        assert_eq!(a.calls(), 1);
    }
}
