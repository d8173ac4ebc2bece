//! Task invocations delivered by the queue transport.
//!
//! A task is a queue name plus flat string parameters, the same shape the
//! HTTP task endpoints receive as a form body and the `tasks` table stores
//! as JSON.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::queue::TaskQueueError;
use crate::common::time::{format_fence, parse_fence, to_fence};
use crate::common::{ResponseKey, SourceKey};

pub const POLL_QUEUE: &str = "poll";
pub const PROPAGATE_QUEUE: &str = "propagate";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Poll {
        source_key: SourceKey,
        last_polled: DateTime<Utc>,
    },
    Propagate {
        response_key: ResponseKey,
    },
}

/// Parameters of a poll task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollParams {
    pub source_key: String,
    /// Fence value in `%Y-%m-%d-%H-%M-%S` form
    pub last_polled: String,
}

/// Parameters of a propagate task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagateParams {
    pub response_key: String,
}

impl Task {
    pub fn poll(source_key: SourceKey, last_polled: DateTime<Utc>) -> Self {
        Task::Poll {
            source_key,
            last_polled: to_fence(last_polled),
        }
    }

    pub fn propagate(response_key: ResponseKey) -> Self {
        Task::Propagate { response_key }
    }

    pub fn queue(&self) -> &'static str {
        match self {
            Task::Poll { .. } => POLL_QUEUE,
            Task::Propagate { .. } => PROPAGATE_QUEUE,
        }
    }

    /// Parameters as stored in the task table.
    pub fn params(&self) -> serde_json::Value {
        match self {
            Task::Poll {
                source_key,
                last_polled,
            } => serde_json::json!({
                "source_key": source_key.as_str(),
                "last_polled": format_fence(*last_polled),
            }),
            Task::Propagate { response_key } => serde_json::json!({
                "response_key": response_key.as_str(),
            }),
        }
    }

    pub fn from_queue_params(queue: &str, params: serde_json::Value) -> Result<Self, TaskQueueError> {
        let invalid = |reason: String| TaskQueueError::InvalidParams {
            queue: queue.to_string(),
            reason,
        };
        match queue {
            POLL_QUEUE => {
                let params: PollParams =
                    serde_json::from_value(params).map_err(|e| invalid(e.to_string()))?;
                Task::try_from(params)
            }
            PROPAGATE_QUEUE => {
                let params: PropagateParams =
                    serde_json::from_value(params).map_err(|e| invalid(e.to_string()))?;
                Ok(Task::from(params))
            }
            other => Err(TaskQueueError::UnknownQueue(other.to_string())),
        }
    }
}

impl TryFrom<PollParams> for Task {
    type Error = TaskQueueError;

    fn try_from(params: PollParams) -> Result<Self, Self::Error> {
        let last_polled =
            parse_fence(&params.last_polled).map_err(|e| TaskQueueError::InvalidParams {
                queue: POLL_QUEUE.to_string(),
                reason: format!("bad last_polled {:?}: {}", params.last_polled, e),
            })?;
        Ok(Task::Poll {
            source_key: SourceKey::new(params.source_key),
            last_polled,
        })
    }
}

impl From<PropagateParams> for Task {
    fn from(params: PropagateParams) -> Self {
        Task::Propagate {
            response_key: ResponseKey::new(params.response_key),
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::Poll {
                source_key,
                last_polled,
            } => write!(f, "poll({}, {})", source_key, format_fence(*last_polled)),
            Task::Propagate { response_key } => write!(f, "propagate({})", response_key),
        }
    }
}

/// What the transport should do with a delivered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Finished; do not deliver again
    Done,
    /// Nothing went wrong, but the work is not finished; deliver again later
    RetryLater,
    /// Hard failure; the transport's retry policy applies
    Failed,
}

impl TaskStatus {
    pub fn http_status(self) -> StatusCode {
        match self {
            TaskStatus::Done => StatusCode::OK,
            TaskStatus::RetryLater => StatusCode::NOT_MODIFIED,
            TaskStatus::Failed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_done(self) -> bool {
        self == TaskStatus::Done
    }
}
