//! Background worker that drains the Postgres task queue.
//!
//! ```text
//! TaskWorker
//!     │
//!     ├─► claim tasks (PostgresTaskQueue, SKIP LOCKED)
//!     ├─► TaskRunner::run(task) ─► TaskStatus
//!     └─► Done ─► mark_succeeded
//!         RetryLater / Failed ─► mark_failed (backoff, dead letter)
//!         failed Poll ─► mark_retry (backoff only)
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::queue::{ClaimedTask, PostgresTaskQueue};
use super::runner::TaskRunner;
use super::task::{Task, TaskStatus};

/// Configuration for the task worker.
#[derive(Debug, Clone)]
pub struct TaskWorkerConfig {
    /// Maximum number of tasks to claim at once
    pub batch_size: i64,
    /// How long to wait when no tasks are available
    pub poll_interval: Duration,
    /// Worker ID for this instance
    pub worker_id: String,
}

impl Default for TaskWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_secs(5),
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }
}

impl TaskWorkerConfig {
    /// Create a new config with a specific worker ID.
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }
}

pub struct TaskWorker {
    queue: Arc<PostgresTaskQueue>,
    runner: TaskRunner,
    config: TaskWorkerConfig,
}

impl TaskWorker {
    pub fn new(queue: Arc<PostgresTaskQueue>, runner: TaskRunner, config: TaskWorkerConfig) -> Self {
        Self {
            queue,
            runner,
            config,
        }
    }

    /// Run until `shutdown` is cancelled. Tasks already claimed finish first.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        info!(
            worker_id = %self.config.worker_id,
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "task worker starting"
        );

        while !shutdown.is_cancelled() {
            let processed = self.run_once().await;
            if processed == 0 {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }
        }

        info!(worker_id = %self.config.worker_id, "task worker stopped");
        Ok(())
    }

    /// Claim one batch and process it. Returns how many tasks were claimed.
    pub async fn run_once(&self) -> usize {
        let tasks = match self
            .queue
            .claim(&self.config.worker_id, self.config.batch_size)
            .await
        {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(error = %e, "failed to claim tasks");
                return 0;
            }
        };
        if tasks.is_empty() {
            return 0;
        }

        debug!(count = tasks.len(), "claimed tasks");
        let count = tasks.len();
        futures::future::join_all(tasks.into_iter().map(|task| self.process(task))).await;
        count
    }

    async fn process(&self, claimed: ClaimedTask) {
        let task_id = claimed.id;
        let task = match claimed.task {
            Ok(task) => task,
            Err(e) => {
                error!(task_id = %task_id, queue = %claimed.queue, error = %e, "undecodable task");
                if let Err(e) = self.queue.mark_failed(task_id, &e.to_string(), false).await {
                    error!(task_id = %task_id, error = %e, "failed to mark task as failed");
                }
                return;
            }
        };

        debug!(task_id = %task_id, task = %task, attempt = claimed.attempt, "running task");
        let result = match self.runner.run(&task).await {
            TaskStatus::Done => self.queue.mark_succeeded(task_id).await,
            TaskStatus::RetryLater => {
                debug!(task_id = %task_id, task = %task, "task asked to be retried");
                self.queue.mark_failed(task_id, "retry later", true).await
            }
            // A poll task carries its source's only schedule, so it is never
            // dead-lettered.
            TaskStatus::Failed if matches!(task, Task::Poll { .. }) => {
                warn!(task_id = %task_id, task = %task, "poll task failed");
                self.queue.mark_retry(task_id, "task failed").await
            }
            TaskStatus::Failed => {
                warn!(task_id = %task_id, task = %task, "task failed");
                self.queue.mark_failed(task_id, "task failed", true).await
            }
        };
        if let Err(e) = result {
            error!(task_id = %task_id, error = %e, "failed to record task result");
        }
    }
}
