//! Task infrastructure for the poll and propagate queues.
//!
//! - [`Task`] / [`TaskStatus`] - what the transport delivers and what it gets back
//! - [`TaskQueue`] / [`PostgresTaskQueue`] - durable enqueueing with retries
//! - [`TaskRunner`] - dispatches a task to its domain action
//! - [`TaskWorker`] - long-running service that drains the queue
//!
//! # Architecture
//!
//! ```text
//! poll_source() ──enqueue──► tasks table ◄──claim── TaskWorker
//!                                                      │
//! POST /_ah/queue/{poll,propagate} ───────────────────►├─► TaskRunner
//!                                                      └─► ack / backoff / dead letter
//! ```

mod queue;
mod runner;
mod task;
mod worker;

pub use queue::{retry_delay_secs, ClaimedTask, PostgresTaskQueue, TaskQueue, TaskQueueError};
pub use runner::{poll_status, propagate_status, TaskRunner};
pub use task::{PollParams, PropagateParams, Task, TaskStatus, POLL_QUEUE, PROPAGATE_QUEUE};
pub use worker::{TaskWorker, TaskWorkerConfig};
