//! PostgreSQL-backed task queue.
//!
//! Delivery is at-least-once: a claimed task whose claim lease expires
//! (crashed worker) is claimed again, and a failed task is re-queued with
//! exponential backoff until it runs out of attempts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::task::Task;

#[derive(Debug, Error)]
pub enum TaskQueueError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid {queue} task params: {reason}")]
    InvalidParams { queue: String, reason: String },

    #[error("unknown task queue: {0}")]
    UnknownQueue(String),

    #[error("task {0} not found")]
    NotFound(Uuid),

    #[error("task queue unavailable: {0}")]
    Unavailable(String),
}

/// Trait for enqueueing tasks.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a task to run at `eta`, or as soon as possible.
    async fn enqueue(&self, task: Task, eta: Option<DateTime<Utc>>) -> Result<(), TaskQueueError>;
}

/// A claimed task ready for execution.
#[derive(Debug)]
pub struct ClaimedTask {
    pub id: Uuid,
    pub queue: String,
    /// Attempt number of this delivery, starting at 1
    pub attempt: i32,
    /// The decoded task, or why the stored params could not be decoded
    pub task: Result<Task, TaskQueueError>,
}

pub struct PostgresTaskQueue {
    pool: PgPool,
    claim_lease_ms: i64,
    max_attempts: i32,
}

impl PostgresTaskQueue {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            claim_lease_ms: 10 * 60 * 1000,
            max_attempts: 10,
        }
    }

    /// Override how long a claim lasts before another worker may re-claim.
    pub fn with_claim_lease_ms(mut self, claim_lease_ms: i64) -> Self {
        self.claim_lease_ms = claim_lease_ms;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Insert a task and return its id.
    pub async fn insert(&self, task: &Task, eta: Option<DateTime<Utc>>) -> Result<Uuid, TaskQueueError> {
        let id = Uuid::now_v7();
        sqlx::query(
            r#"
            INSERT INTO tasks (id, queue, params, status, run_at, max_attempts)
            VALUES ($1, $2, $3, 'pending', COALESCE($4, NOW()), $5)
            "#,
        )
        .bind(id)
        .bind(task.queue())
        .bind(task.params())
        .bind(eta)
        .bind(self.max_attempts)
        .execute(&self.pool)
        .await?;

        info!(task_id = %id, task = %task, eta = ?eta, "task enqueued");
        Ok(id)
    }

    /// Claim up to `limit` ready tasks.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so concurrent workers never claim the
    /// same row; running tasks whose claim lease expired are claimable again.
    pub async fn claim(&self, worker_id: &str, limit: i64) -> Result<Vec<ClaimedTask>, TaskQueueError> {
        let rows = sqlx::query(
            r#"
            WITH next_tasks AS (
                SELECT id
                FROM tasks
                WHERE (status = 'pending' AND run_at <= NOW())
                   OR (status = 'running' AND lease_expires_at < NOW())
                ORDER BY run_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE tasks
            SET status = 'running',
                attempts = attempts + 1,
                lease_expires_at = NOW() + ($2 || ' milliseconds')::INTERVAL,
                worker_id = $3,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_tasks)
            RETURNING id, queue, params, attempts
            "#,
        )
        .bind(limit)
        .bind(self.claim_lease_ms.to_string())
        .bind(worker_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<ClaimedTask, TaskQueueError> {
                let queue: String = r.try_get("queue")?;
                let params: serde_json::Value = r.try_get("params")?;
                Ok(ClaimedTask {
                    id: r.try_get("id")?,
                    attempt: r.try_get("attempts")?,
                    task: Task::from_queue_params(&queue, params),
                    queue,
                })
            })
            .collect()
    }

    pub async fn mark_succeeded(&self, task_id: Uuid) -> Result<(), TaskQueueError> {
        sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'succeeded',
                lease_expires_at = NULL,
                last_error = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(task_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Re-queue a task with backoff, or dead-letter it.
    ///
    /// Non-retryable failures and tasks out of attempts go straight to
    /// `dead_letter`.
    pub async fn mark_failed(
        &self,
        task_id: Uuid,
        error: &str,
        retryable: bool,
    ) -> Result<(), TaskQueueError> {
        let (attempts, max_attempts) = self.attempts(task_id).await?;
        if retryable && attempts < max_attempts {
            return self.requeue(task_id, error, attempts).await;
        }

        warn!(task_id = %task_id, attempts, error, "task dead-lettered");
        sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'dead_letter',
                last_error = $1,
                lease_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(error)
        .bind(task_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Re-queue a task with backoff however many attempts it has used.
    pub async fn mark_retry(&self, task_id: Uuid, error: &str) -> Result<(), TaskQueueError> {
        let (attempts, _) = self.attempts(task_id).await?;
        self.requeue(task_id, error, attempts).await
    }

    async fn attempts(&self, task_id: Uuid) -> Result<(i32, i32), TaskQueueError> {
        let row = sqlx::query("SELECT attempts, max_attempts FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(TaskQueueError::NotFound(task_id))?;
        Ok((row.try_get("attempts")?, row.try_get("max_attempts")?))
    }

    async fn requeue(&self, task_id: Uuid, error: &str, attempts: i32) -> Result<(), TaskQueueError> {
        let retry_at = Utc::now() + chrono::Duration::seconds(retry_delay_secs(attempts));
        sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'pending',
                run_at = $1,
                last_error = $2,
                lease_expires_at = NULL,
                worker_id = NULL,
                updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(retry_at)
        .bind(error)
        .bind(task_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Tasks still waiting to run, for operators and tests.
    pub async fn pending_count(&self) -> Result<i64, TaskQueueError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl TaskQueue for PostgresTaskQueue {
    async fn enqueue(&self, task: Task, eta: Option<DateTime<Utc>>) -> Result<(), TaskQueueError> {
        self.insert(&task, eta).await.map(|_| ())
    }
}

/// Backoff before the next attempt: `2^attempts` seconds, at most one hour.
pub fn retry_delay_secs(attempts: i32) -> i64 {
    2i64.checked_pow(attempts.max(0) as u32)
        .unwrap_or(i64::MAX)
        .min(3600)
}
