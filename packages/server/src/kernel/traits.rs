// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Poll and propagate are domain functions that use these traits.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use webmention::{ErrorCode, SendOutcome};

// =============================================================================
// Webmention sender
// =============================================================================

#[async_trait]
pub trait WebmentionSender: Send + Sync {
    /// Send one webmention.
    ///
    /// Delivery failures come back as `Ok` with a structured error code.
    /// `Err` means the send itself blew up and nothing is known about the target.
    async fn send(&self, source_url: &str, target_url: &str) -> Result<SendOutcome>;
}

// =============================================================================
// Cache
// =============================================================================

/// Key-value cache for memoized lookups. Writes never fail; a bounded
/// implementation drops old entries instead.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: String);

    async fn remove(&self, key: &str);
}

// =============================================================================
// Clock
// =============================================================================

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
