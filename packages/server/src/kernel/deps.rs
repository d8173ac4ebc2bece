//! Server dependencies for poll and propagate (using traits for testability)
//!
//! This module provides the central dependency container handed to every
//! task. All external services sit behind trait objects so tests can swap
//! them for the mocks in `test_dependencies`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use tracing::debug;
use url::Url;
use webmention::{Discovery, WebmentionClient};

use crate::common::urls::domain_from_link;
use crate::config::Config;
use crate::domains::sources::SiloRegistry;
use crate::kernel::jobs::TaskQueue;
use crate::kernel::{Cache, Clock, ErrorCode, SendOutcome, WebmentionSender};
use crate::storage::RecordStore;

// =============================================================================
// WebmentionClient Adapter (implements WebmentionSender trait)
// =============================================================================

/// Wrapper around `WebmentionClient` that memoizes endpoint discovery.
///
/// Discovered endpoints are cached per scheme and domain under
/// `W {scheme} {domain}`, so later targets on the same site skip discovery.
pub struct WebmentionAdapter {
    client: WebmentionClient,
    cache: Arc<dyn Cache>,
}

impl WebmentionAdapter {
    pub fn new(client: WebmentionClient, cache: Arc<dyn Cache>) -> Self {
        Self { client, cache }
    }

    pub fn endpoint_cache_key(target: &Url) -> Option<String> {
        let domain = domain_from_link(target.as_str())?;
        Some(format!("W {} {}", target.scheme(), domain))
    }
}

#[async_trait]
impl WebmentionSender for WebmentionAdapter {
    async fn send(&self, source_url: &str, target_url: &str) -> Result<SendOutcome> {
        let target = match Url::parse(target_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            _ => return Ok(SendOutcome::failed(ErrorCode::BadTargetUrl)),
        };
        let Some(cache_key) = Self::endpoint_cache_key(&target) else {
            return Ok(SendOutcome::failed(ErrorCode::BadTargetUrl));
        };

        if let Some(endpoint) = self.cache.get(&cache_key).await {
            debug!(cache_key = %cache_key, endpoint = %endpoint, "webmention endpoint cache hit");
            let outcome = self
                .client
                .send_to_endpoint(&endpoint, source_url, target_url)
                .await;
            if outcome.error == Some(ErrorCode::ReceiverError) {
                // The site may have moved its endpoint; rediscover next time.
                debug!(cache_key = %cache_key, endpoint = %endpoint, "dropping cached webmention endpoint");
                self.cache.remove(&cache_key).await;
            }
            return Ok(outcome);
        }

        match self.client.discover_endpoint(&target).await {
            Ok(Discovery::Found(endpoint)) => {
                let outcome = self
                    .client
                    .send_to_endpoint(endpoint.as_str(), source_url, target_url)
                    .await;
                if outcome.success {
                    self.cache.set(&cache_key, endpoint.to_string()).await;
                }
                Ok(outcome)
            }
            Ok(Discovery::NotFound) => Ok(SendOutcome::failed(ErrorCode::NoEndpoint)),
            Err(outcome) => Ok(outcome),
        }
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to tasks (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn RecordStore>,
    pub task_queue: Arc<dyn TaskQueue>,
    pub webmention: Arc<dyn WebmentionSender>,
    pub silos: SiloRegistry,
    pub clock: Arc<dyn Clock>,
    /// Public base URL for webmention source URLs
    pub base_url: String,
    pub lease_length: Duration,
    /// Poll period for sources that do not set their own
    pub poll_interval: std::time::Duration,
    /// Configured domains that never receive webmentions
    pub blocklist: Vec<String>,
}

impl ServerDeps {
    /// Create new ServerDeps with the given dependencies
    pub fn new(
        config: &Config,
        store: Arc<dyn RecordStore>,
        task_queue: Arc<dyn TaskQueue>,
        webmention: Arc<dyn WebmentionSender>,
        silos: SiloRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            task_queue,
            webmention,
            silos,
            clock,
            base_url: config.base_url.clone(),
            lease_length: Duration::from_std(config.lease_length)
                .unwrap_or_else(|_| Duration::minutes(30)),
            poll_interval: config.poll_interval,
            blocklist: config.webmention_blocklist.clone(),
        }
    }

    /// Silo domains plus the configured blocklist.
    pub fn blocked_domains(&self) -> Vec<String> {
        let mut domains = self.silos.all_domains();
        domains.extend(self.blocklist.iter().cloned());
        domains
    }
}
