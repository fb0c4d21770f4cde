//! Periodic re-drive of failed executions.
//!
//! Each pass schedules executions whose RUNNING lease has lapsed, optionally
//! arms transient FAILED records, then replays up to `batchSize`
//! RETRY_PENDING records on at most `workers` concurrent tasks. A record is
//! only replayed if it is still RETRY_PENDING when its task claims it.
//! Records are isolated from each other: a failing or panicking replay only
//! affects its own record.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::core::engine::ProcessEngine;
use crate::domain::{ExecutionRecord, ExecutionStatus};
use crate::error::EngineError;

fn default_workers() -> usize { 10 }
fn default_batch_size() -> usize { 100 }
fn default_interval_secs() -> u64 { 60 }
fn default_arm_retryable_failures() -> bool { true }

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Ignore records untouched for longer than this.
    #[serde(default)]
    pub max_age_secs: Option<u64>,
    /// Flip transient FAILED records to RETRY_PENDING before each pass.
    #[serde(default = "default_arm_retryable_failures")]
    pub arm_retryable_failures: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            batch_size: default_batch_size(),
            interval_secs: default_interval_secs(),
            max_age_secs: None,
            arm_retryable_failures: default_arm_retryable_failures(),
        }
    }
}

impl RecoveryConfig {
    fn max_age(&self) -> Option<chrono::Duration> {
        self.max_age_secs
            .map(|secs| chrono::Duration::seconds(secs.min(u64::from(u32::MAX)) as i64))
    }
}

/// Tally of one recovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Records armed from FAILED before the pass.
    pub armed: usize,
    /// Abandoned CREATED/RUNNING records scheduled for retry.
    pub reclaimed: usize,
    pub picked: usize,
    pub succeeded: usize,
    /// Failed again and scheduled for another pass.
    pub rearmed: usize,
    /// Failed again with no retries left.
    pub exhausted: usize,
    /// Already running elsewhere, or could not be processed.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    Rearmed,
    Exhausted,
    Skipped,
}

impl RecoveryReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Succeeded => self.succeeded += 1,
            Outcome::Rearmed => self.rearmed += 1,
            Outcome::Exhausted => self.exhausted += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

pub struct RecoveryJob {
    engine: Arc<ProcessEngine>,
    config: RecoveryConfig,
}

impl RecoveryJob {
    pub fn new(engine: Arc<ProcessEngine>, config: RecoveryConfig) -> Self {
        Self { engine, config }
    }

    /// One pass over the retryable records.
    pub async fn run_once(&self) -> Result<RecoveryReport, EngineError> {
        let mut report = RecoveryReport::default();
        let records = self.engine.records();
        let max_age = self.config.max_age();

        if let Some(idle) = self.engine.config().lease_timeout() {
            match records.arm_stale(idle, self.config.batch_size).await {
                Ok(reclaimed) => report.reclaimed = reclaimed,
                Err(e) => warn!(error = %e, "Failed to reclaim abandoned executions"),
            }
        }

        if self.config.arm_retryable_failures {
            match records
                .arm_retryable_failures(max_age, self.config.batch_size)
                .await
            {
                Ok(armed) => report.armed = armed,
                Err(e) => warn!(error = %e, "Failed to arm retryable executions"),
            }
        }

        let pending = records
            .list_retryable(max_age, self.config.batch_size)
            .await?;
        report.picked = pending.len();
        if pending.is_empty() {
            debug!("No executions to recover");
            return Ok(report);
        }

        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut tasks = JoinSet::new();
        for record in pending {
            let engine = Arc::clone(&self.engine);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return Outcome::Skipped;
                };
                recover(&engine, record).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!(error = %e, "Recovery task aborted");
                    report.skipped += 1;
                }
            }
        }

        info!(
            armed = report.armed,
            reclaimed = report.reclaimed,
            picked = report.picked,
            succeeded = report.succeeded,
            rearmed = report.rearmed,
            exhausted = report.exhausted,
            skipped = report.skipped,
            "Recovery pass finished"
        );
        Ok(report)
    }

    /// Run `run_once` every `intervalSecs` until the handle is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = Duration::from_secs(self.config.interval_secs.max(1));
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once().await {
                    error!(error = %e, "Recovery pass failed");
                }
            }
        })
    }
}

async fn recover(engine: &ProcessEngine, record: ExecutionRecord) -> Outcome {
    let execution_id = record.execution_id.as_str();
    let failure = match engine.replay_pending(execution_id).await {
        Ok(result) if result.is_success() => {
            info!(execution_id, "Execution recovered");
            return Outcome::Succeeded;
        }
        Ok(result) => result.message,
        Err(EngineError::NotRetryPending(_)) => {
            debug!(execution_id, "Execution no longer pending, skipped");
            return Outcome::Skipped;
        }
        Err(e) => {
            warn!(execution_id, error = %e, "Replay failed");
            e.to_string()
        }
    };

    match engine
        .records()
        .mark_for_retry(execution_id, Some(&failure))
        .await
    {
        Ok(ExecutionStatus::RetryPending) => Outcome::Rearmed,
        Ok(_) => {
            warn!(execution_id, retries = record.max_retry_count, "Execution retries exhausted");
            Outcome::Exhausted
        }
        Err(e) => {
            error!(execution_id, error = %e, "Failed to reschedule execution");
            Outcome::Skipped
        }
    }
}
