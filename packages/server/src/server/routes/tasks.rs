//! Task queue push endpoints.
//!
//! The transport POSTs the task parameters as a form body and drives its
//! retry policy from the status code: 200 done, 304 retry later, 500 failed.

use axum::{extract::Extension, http::StatusCode, Form};
use tracing::warn;

use crate::kernel::jobs::{PollParams, PropagateParams, Task};
use crate::server::app::AppState;

pub async fn poll_task_handler(
    Extension(state): Extension<AppState>,
    Form(params): Form<PollParams>,
) -> StatusCode {
    let task = match Task::try_from(params) {
        Ok(task) => task,
        Err(e) => {
            warn!(error = %e, "rejecting poll task");
            return StatusCode::BAD_REQUEST;
        }
    };
    state.runner.run(&task).await.http_status()
}

pub async fn propagate_task_handler(
    Extension(state): Extension<AppState>,
    Form(params): Form<PropagateParams>,
) -> StatusCode {
    let task = Task::from(params);
    state.runner.run(&task).await.http_status()
}
