//! Task dispatch shared by the HTTP task endpoints and the background worker.
//!
//! ```text
//! TaskRunner::run(task)
//!     │
//!     ├─► Poll      ─► poll_source()        ─► TaskStatus
//!     └─► Propagate ─► propagate_response() ─► TaskStatus
//! ```

use std::sync::Arc;

use tracing::{error, info, warn};

use super::task::{Task, TaskStatus};
use crate::domains::polling::{poll_source, PollError, PollOutcome};
use crate::domains::propagation::{propagate_response, PropagateError, PropagateOutcome};
use crate::kernel::ServerDeps;

#[derive(Clone)]
pub struct TaskRunner {
    deps: Arc<ServerDeps>,
}

impl TaskRunner {
    pub fn new(deps: Arc<ServerDeps>) -> Self {
        Self { deps }
    }

    pub fn deps(&self) -> &ServerDeps {
        &self.deps
    }

    /// Run one task and report what the transport should do next.
    pub async fn run(&self, task: &Task) -> TaskStatus {
        let status = match task {
            Task::Poll {
                source_key,
                last_polled,
            } => poll_status(&poll_source(source_key, *last_polled, &self.deps).await),
            Task::Propagate { response_key } => {
                propagate_status(&propagate_response(response_key, &self.deps).await)
            }
        };
        info!(task = %task, status = ?status, "task finished");
        status
    }
}

/// Disabled, deleted and stale sources are all done; fetch and store
/// failures are hard failures so the transport retries the same fence.
pub fn poll_status(result: &Result<PollOutcome, PollError>) -> TaskStatus {
    match result {
        Ok(_) => TaskStatus::Done,
        Err(e) => {
            error!(error = %e, "poll failed");
            TaskStatus::Failed
        }
    }
}

/// Held leases, unfinished targets and missing responses ask for a later
/// retry; anything that raised is a hard failure.
pub fn propagate_status(result: &Result<PropagateOutcome, PropagateError>) -> TaskStatus {
    match result {
        Ok(PropagateOutcome::Complete)
        | Ok(PropagateOutcome::AlreadyComplete)
        | Ok(PropagateOutcome::SourceMissing) => TaskStatus::Done,
        Ok(PropagateOutcome::StillLeased) | Ok(PropagateOutcome::Incomplete { .. }) => {
            TaskStatus::RetryLater
        }
        Err(PropagateError::ResponseMissing(key)) => {
            warn!(response_key = %key, "propagate task for missing response");
            TaskStatus::RetryLater
        }
        Err(e) => {
            error!(error = %e, "propagate failed");
            TaskStatus::Failed
        }
    }
}
