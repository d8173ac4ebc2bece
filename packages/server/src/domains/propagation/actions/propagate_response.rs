use futures::future::join_all;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::common::ResponseKey;
use crate::domains::propagation::classify::{classify, Resolution};
use crate::domains::propagation::lease::{acquire_lease, release_lease, Lease};
use crate::domains::responses::ResponseStatus;
use crate::kernel::ServerDeps;
use crate::storage::StoreError;

/// How a propagate delivery ended when nothing went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropagateOutcome {
    /// Every target resolved; the response is complete
    Complete,
    /// The response was already complete; nothing was sent
    AlreadyComplete,
    /// Another delivery holds the lease; nothing was sent
    StillLeased,
    /// Some targets failed and stay in `error` for the next delivery
    Incomplete { errors: Vec<String> },
    /// The owning source was deleted; nothing is sent on its behalf
    SourceMissing,
}

#[derive(Debug, Error)]
pub enum PropagateError {
    #[error("response {0} not found")]
    ResponseMissing(ResponseKey),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("sending to {target} failed: {source}")]
    Send {
        target: String,
        #[source]
        source: anyhow::Error,
    },

    /// The record changed under us while we held the lease
    #[error("lost lease on response {0}")]
    LeaseLost(ResponseKey),
}

/// Deliver one response to its pending targets.
///
/// Targets in `unsent` and `error` are all attempted; `sent` targets never
/// are. Progress is committed even when the delivery fails, and the lease is
/// always released on the way out.
pub async fn propagate_response(
    response_key: &ResponseKey,
    deps: &ServerDeps,
) -> Result<PropagateOutcome, PropagateError> {
    let response = deps
        .store
        .get_response(response_key)
        .await?
        .ok_or_else(|| PropagateError::ResponseMissing(response_key.clone()))?;

    if response.is_complete() {
        info!(response_key = %response_key, "response already complete");
        return Ok(PropagateOutcome::AlreadyComplete);
    }

    let Some(source) = deps.store.get_source(&response.source_key).await? else {
        warn!(
            response_key = %response_key,
            source_key = %response.source_key,
            "source no longer exists, not propagating"
        );
        return Ok(PropagateOutcome::SourceMissing);
    };

    let mut response = match acquire_lease(response, deps).await? {
        Lease::Acquired(response) => response,
        Lease::Held { leased_until } => {
            info!(response_key = %response_key, leased_until = ?leased_until, "response still leased");
            return Ok(PropagateOutcome::StillLeased);
        }
        Lease::Complete => return Ok(PropagateOutcome::AlreadyComplete),
        Lease::Missing => return Err(PropagateError::ResponseMissing(response_key.clone())),
    };

    let source_url = response.webmention_source_url(&deps.base_url, &source.silo);
    let candidates = response.candidates();
    info!(
        response_key = %response_key,
        source_url = %source_url,
        targets = candidates.len(),
        "propagating response"
    );

    let sends = candidates.iter().map(|target| {
        let source_url = source_url.as_str();
        async move { (target, deps.webmention.send(source_url, target).await) }
    });
    let results = join_all(sends).await;

    let mut failure: Option<PropagateError> = None;
    for (target, result) in results {
        match result {
            Ok(outcome) => match classify(&outcome) {
                Resolution::Sent => {
                    info!(
                        response_key = %response_key,
                        target = %target,
                        endpoint = ?outcome.receiver_endpoint,
                        "webmention sent"
                    );
                    response.mark_sent(target);
                }
                Resolution::GiveUp => {
                    info!(
                        response_key = %response_key,
                        target = %target,
                        "no webmention endpoint, giving up on target"
                    );
                    response.give_up(target);
                }
                Resolution::Retry => {
                    warn!(
                        response_key = %response_key,
                        target = %target,
                        code = ?outcome.error.as_ref().map(|c| c.as_str()),
                        status = ?outcome.http_status,
                        detail = ?outcome.detail,
                        "webmention failed, will retry"
                    );
                    response.mark_error(target);
                }
            },
            Err(e) => {
                error!(response_key = %response_key, target = %target, error = %e, "webmention send raised");
                response.mark_error(target);
                if failure.is_none() {
                    failure = Some(PropagateError::Send {
                        target: target.clone(),
                        source: e,
                    });
                }
            }
        }
    }

    let status = if failure.is_none() && response.error.is_empty() {
        ResponseStatus::Complete
    } else {
        ResponseStatus::Error
    };

    match release_lease(&mut response, status, deps).await {
        Ok(true) => {}
        Ok(false) => {
            error!(response_key = %response_key, "response changed while leased");
            return Err(PropagateError::LeaseLost(response_key.clone()));
        }
        Err(e) => {
            error!(response_key = %response_key, error = %e, "failed to commit response");
            // Keep whatever was confirmed sent and free the lease if we can.
            if let Err(release_err) = release_lease(&mut response, ResponseStatus::Error, deps).await {
                warn!(response_key = %response_key, error = %release_err, "failed to release lease");
            }
            return Err(PropagateError::Store(e));
        }
    }

    info!(
        response_key = %response_key,
        status = %response.status,
        sent = response.sent.len(),
        errors = response.error.len(),
        "response committed"
    );

    if let Some(failure) = failure {
        return Err(failure);
    }
    if status == ResponseStatus::Complete {
        Ok(PropagateOutcome::Complete)
    } else {
        Ok(PropagateOutcome::Incomplete {
            errors: response.error.to_vec(),
        })
    }
}
