//! Bounded pool for fire-and-forget nodes.
//!
//! Mirrors a classic thread-pool executor: `core_workers` long-lived tasks
//! drain a queue of `queue_capacity` jobs; when the queue is full, up to
//! `max_workers - core_workers` overflow tasks are spawned; once those are
//! exhausted too, the job runs on the submitting task.

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

fn default_core_workers() -> usize { 10 }
fn default_max_workers() -> usize { 50 }
fn default_queue_capacity() -> usize { 1000 }

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncPoolConfig {
    #[serde(default = "default_core_workers")]
    pub core_workers: usize,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for AsyncPoolConfig {
    fn default() -> Self {
        Self {
            core_workers: default_core_workers(),
            max_workers: default_max_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

pub type Job = BoxFuture<'static, ()>;

/// Where a submitted job ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Queued,
    Overflow,
    CallerRuns,
}

pub struct AsyncNodePool {
    config: AsyncPoolConfig,
    queue: Mutex<Option<mpsc::Sender<Job>>>,
    overflow: Arc<Semaphore>,
}

impl AsyncNodePool {
    pub fn new(config: AsyncPoolConfig) -> Self {
        let overflow = config.max_workers.saturating_sub(config.core_workers);
        Self {
            config,
            queue: Mutex::new(None),
            overflow: Arc::new(Semaphore::new(overflow)),
        }
    }

    pub fn config(&self) -> &AsyncPoolConfig {
        &self.config
    }

    /// Submit a job. Returns once the job is queued or handed to a worker,
    /// or after it finished when the pool is saturated.
    pub async fn submit(&self, job: Job) -> Dispatch {
        let job = match self.sender() {
            Some(sender) => match sender.try_send(job) {
                Ok(()) => return Dispatch::Queued,
                Err(mpsc::error::TrySendError::Full(job))
                | Err(mpsc::error::TrySendError::Closed(job)) => job,
            },
            None => job,
        };

        match Arc::clone(&self.overflow).try_acquire_owned() {
            Ok(permit) => {
                tokio::spawn(async move {
                    job.await;
                    drop(permit);
                });
                Dispatch::Overflow
            }
            Err(_) => {
                warn!("Async pool saturated, running node on caller");
                job.await;
                Dispatch::CallerRuns
            }
        }
    }

    /// Lazily start the core workers on first use so the pool can be built
    /// outside a runtime.
    fn sender(&self) -> Option<mpsc::Sender<Job>> {
        if self.config.core_workers == 0 || self.config.queue_capacity == 0 {
            return None;
        }
        let mut guard = self.queue.lock();
        if let Some(sender) = guard.as_ref() {
            return Some(sender.clone());
        }

        let (tx, rx) = mpsc::channel::<Job>(self.config.queue_capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        for worker in 0..self.config.core_workers {
            let rx = Arc::clone(&rx);
            tokio::spawn(async move {
                loop {
                    let next = { rx.lock().await.recv().await };
                    match next {
                        Some(job) => job.await,
                        None => break,
                    }
                }
                debug!(worker, "Async pool worker stopped");
            });
        }
        *guard = Some(tx.clone());
        Some(tx)
    }
}
