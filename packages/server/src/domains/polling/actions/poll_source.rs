use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::common::time::{format_fence, to_fence};
use crate::common::urls::{domain_from_link, is_same_or_subdomain};
use crate::common::{SourceKey, TargetSet};
use crate::domains::polling::extractor::extract_targets;
use crate::domains::responses::{Response, ResponseKind};
use crate::domains::sources::{Activity, Silo, SiloError, Source, SourceStatus};
use crate::kernel::jobs::{Task, TaskQueueError};
use crate::kernel::ServerDeps;
use crate::storage::StoreError;

/// How a poll delivery ended when nothing went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Fetched and recorded; `created` responses are new, `existing` were
    /// already stored and left alone
    Polled { created: usize, existing: usize },
    /// The source was deleted; the task is dropped
    SourceMissing,
    /// A newer poll already ran; this delivery is a duplicate
    StaleFence,
    /// The source does not have the listen feature
    NotListening,
    /// The source is, or just became, disabled
    Disabled,
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Silo(SiloError),

    #[error("no silo adapter named {0}")]
    UnknownSilo(String),

    #[error("failed to enqueue task: {0}")]
    Enqueue(#[from] TaskQueueError),

    #[error("failed to serialize activity: {0}")]
    Json(#[from] serde_json::Error),
}

/// Poll one source.
///
/// `expected_last_polled` is the fence carried by the task; a delivery
/// whose fence no longer matches the stored one is a duplicate and does
/// nothing.
pub async fn poll_source(
    source_key: &SourceKey,
    expected_last_polled: DateTime<Utc>,
    deps: &ServerDeps,
) -> Result<PollOutcome, PollError> {
    let expected = to_fence(expected_last_polled);

    let Some(mut source) = deps.store.get_source(source_key).await? else {
        info!(source_key = %source_key, "source no longer exists, dropping poll");
        return Ok(PollOutcome::SourceMissing);
    };

    if source.last_polled != expected {
        info!(
            source_key = %source_key,
            expected = %format_fence(expected),
            stored = %format_fence(source.last_polled),
            "stale poll task, dropping"
        );
        return Ok(PollOutcome::StaleFence);
    }
    if source.status == SourceStatus::Disabled {
        info!(source_key = %source_key, "source disabled, dropping poll");
        return Ok(PollOutcome::Disabled);
    }
    if !source.is_listening() {
        info!(source_key = %source_key, "source not listening, dropping poll");
        return Ok(PollOutcome::NotListening);
    }

    let now = deps.clock.now();
    info!(source_key = %source_key, silo = %source.silo, "polling source");

    let Some(silo) = deps.silos.get(&source.silo) else {
        warn!(source_key = %source_key, silo = %source.silo, "unknown silo");
        mark_source(&mut source, SourceStatus::Error, expected, now, deps).await;
        return Err(PollError::UnknownSilo(source.silo.clone()));
    };

    let activities = match silo.get_activities(&source).await {
        Ok(activities) => activities,
        Err(SiloError::Disable { reason }) => {
            info!(source_key = %source_key, reason = %reason, "silo disabled source");
            source.status = SourceStatus::Disabled;
            source.updated_at = now;
            deps.store.update_source_if_polled(&source, expected).await?;
            return Ok(PollOutcome::Disabled);
        }
        Err(e) => {
            warn!(source_key = %source_key, error = %e, "silo fetch failed");
            mark_source(&mut source, SourceStatus::Error, expected, now, deps).await;
            return Err(PollError::Silo(e));
        }
    };

    let blocked = deps.blocked_domains();
    let mut created = 0;
    let mut existing = 0;

    for activity in &activities {
        for response in responses_for_activity(&source, activity, silo.as_ref(), &blocked)? {
            if deps.store.create_response_if_absent(&response).await? {
                info!(
                    source_key = %source_key,
                    response_key = %response.key,
                    kind = %response.kind,
                    targets = response.unsent.len(),
                    "response created"
                );
                deps.task_queue
                    .enqueue(Task::propagate(response.key.clone()), None)
                    .await?;
                created += 1;
            } else {
                debug!(response_key = %response.key, "response already exists");
                existing += 1;
                // Its propagate task may be lost or dead-lettered; send another.
                let stored = deps.store.get_response(&response.key).await?;
                if stored.is_some_and(|r| r.needs_delivery(now)) {
                    debug!(response_key = %response.key, "response unfinished, enqueueing propagate");
                    deps.task_queue
                        .enqueue(Task::propagate(response.key.clone()), None)
                        .await?;
                }
            }
        }
    }

    source.mark_polled(now);
    if !deps.store.update_source_if_polled(&source, expected).await? {
        info!(source_key = %source_key, "fence moved during poll, not rescheduling");
        return Ok(PollOutcome::StaleFence);
    }

    let period = source.poll_period(deps.poll_interval);
    let eta = now + chrono::Duration::from_std(period).unwrap_or_else(|_| chrono::Duration::minutes(30));
    deps.task_queue
        .enqueue(Task::poll(source.key.clone(), source.last_polled), Some(eta))
        .await?;

    info!(
        source_key = %source_key,
        activities = activities.len(),
        created,
        existing,
        next_poll = %eta,
        "poll complete"
    );
    Ok(PollOutcome::Polled { created, existing })
}

/// Persist a status change without moving the fence. Failures are logged;
/// the caller is already reporting an error.
async fn mark_source(
    source: &mut Source,
    status: SourceStatus,
    expected: DateTime<Utc>,
    now: DateTime<Utc>,
    deps: &ServerDeps,
) {
    source.status = status;
    source.updated_at = now;
    match deps.store.update_source_if_polled(source, expected).await {
        Ok(true) => {}
        Ok(false) => debug!(source_key = %source.key, "fence moved before status update"),
        Err(e) => warn!(source_key = %source.key, error = %e, "failed to record source status"),
    }
}

/// Responses an activity yields, each with the activity's targets.
///
/// Replies, likes and shares always become responses. The activity itself
/// becomes a `post` response only when it links somewhere.
fn responses_for_activity(
    source: &Source,
    activity: &Activity,
    silo: &dyn Silo,
    blocked: &[String],
) -> Result<Vec<Response>, serde_json::Error> {
    let Some(activity_id) = activity.effective_id() else {
        debug!(source_key = %source.key, "activity without id, skipping");
        return Ok(Vec::new());
    };
    let Some(object) = &activity.object else {
        return Ok(Vec::new());
    };

    let targets: TargetSet = extract_targets(object)
        .iter()
        .filter_map(|url| silo.canonicalize_url(url))
        .filter(|url| !is_blocked(url, blocked))
        .collect();
    let activity_json = serde_json::to_value(activity)?;

    let mut responses = Vec::new();
    for candidate in activity.response_candidates() {
        let Some(key) = candidate.object.id.as_deref().filter(|id| !id.is_empty()) else {
            debug!(activity_id, kind = %candidate.kind, "response without id, skipping");
            continue;
        };
        responses.push(
            Response::builder()
                .key(key)
                .source_key(source.key.clone())
                .activity_id(activity_id)
                .kind(candidate.kind)
                .unsent(targets.clone())
                .activity_json(activity_json.clone())
                .response_json(serde_json::to_value(candidate.object)?)
                .build(),
        );
    }

    if !targets.is_empty() {
        responses.push(
            Response::builder()
                .key(activity_id)
                .source_key(source.key.clone())
                .activity_id(activity_id)
                .kind(ResponseKind::Post)
                .unsent(targets)
                .response_json(serde_json::to_value(object)?)
                .activity_json(activity_json)
                .build(),
        );
    }

    Ok(responses)
}

fn is_blocked(url: &str, blocked: &[String]) -> bool {
    domain_from_link(url)
        .is_some_and(|domain| blocked.iter().any(|b| is_same_or_subdomain(&domain, b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_blocked() {
        let blocked = vec!["fa.ke".to_string(), "twitter.com".to_string()];
        assert!(is_blocked("http://fa.ke/post/1", &blocked));
        assert!(is_blocked("https://mobile.twitter.com/x", &blocked));
        assert!(!is_blocked("http://my.blog/post", &blocked));
    }
}
