//! Per-response leases.
//!
//! A lease is `status = processing` plus a future `leased_until` on the
//! response itself. Acquiring and releasing are version compare-and-set
//! writes, so two deliveries racing for the same response cannot both win.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domains::responses::{Response, ResponseStatus};
use crate::kernel::ServerDeps;
use crate::storage::StoreError;

/// Re-reads allowed after losing a compare-and-set race.
const MAX_ACQUIRE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum Lease {
    /// This delivery owns the response; holds the written record
    Acquired(Response),
    /// Another delivery owns it until the given time
    Held { leased_until: Option<DateTime<Utc>> },
    /// Nothing left to do
    Complete,
    /// The response disappeared while we were acquiring
    Missing,
}

/// Try to take the lease on `response`.
///
/// An expired lease is reclaimable; a crashed delivery is recovered this way.
pub async fn acquire_lease(mut response: Response, deps: &ServerDeps) -> Result<Lease, StoreError> {
    for _ in 0..MAX_ACQUIRE_ATTEMPTS {
        if response.is_complete() {
            return Ok(Lease::Complete);
        }
        let now = deps.clock.now();
        if response.is_leased(now) {
            debug!(
                response_key = %response.key,
                leased_until = ?response.leased_until,
                "response is leased"
            );
            return Ok(Lease::Held {
                leased_until: response.leased_until,
            });
        }

        let expected = response.version;
        let mut claimed = response.clone();
        claimed.status = ResponseStatus::Processing;
        claimed.leased_until = Some(now + deps.lease_length);

        if deps
            .store
            .update_response_if_version(&mut claimed, expected)
            .await?
        {
            info!(
                response_key = %claimed.key,
                leased_until = ?claimed.leased_until,
                "lease acquired"
            );
            return Ok(Lease::Acquired(claimed));
        }

        debug!(response_key = %response.key, "lost lease race, re-reading");
        response = match deps.store.get_response(&response.key).await? {
            Some(current) => current,
            None => return Ok(Lease::Missing),
        };
    }

    Ok(Lease::Held {
        leased_until: response.leased_until,
    })
}

/// Write `response` with its lease cleared and the given status.
///
/// Returns false if someone else wrote the record since it was read.
pub async fn release_lease(
    response: &mut Response,
    status: ResponseStatus,
    deps: &ServerDeps,
) -> Result<bool, StoreError> {
    response.status = status;
    response.leased_until = None;
    let expected = response.version;
    deps.store
        .update_response_if_version(response, expected)
        .await
}
