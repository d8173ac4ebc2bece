//! Silo adapters.
//!
//! A silo adapter turns one linked account into a list of activities. The
//! poller only ever talks to the [`Silo`] trait; the registry picks the
//! adapter named by `Source::silo`.

mod activity_streams;

pub use activity_streams::ActivityStreamsSilo;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use super::models::{Activity, Source};
use crate::common::urls::normalize_http_url;

/// Errors a silo adapter can report.
#[derive(Debug, Error)]
pub enum SiloError {
    /// The account can never be polled again (revoked token, deleted account)
    #[error("source disabled by silo: {reason}")]
    Disable { reason: String },

    /// Anything else; the poll is retried later
    #[error("silo fetch failed: {0}")]
    Transient(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SiloError {
    pub fn disable(reason: impl Into<String>) -> Self {
        SiloError::Disable {
            reason: reason.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        SiloError::Transient(message.into().into())
    }

    pub fn is_disable(&self) -> bool {
        matches!(self, SiloError::Disable { .. })
    }
}

#[async_trait]
pub trait Silo: Send + Sync {
    /// Name stored in `Source::silo`
    fn short_name(&self) -> &str;

    /// Domains owned by the silo; never webmention targets
    fn domains(&self) -> Vec<String> {
        Vec::new()
    }

    /// Fetch recent activities for a source, newest first
    async fn get_activities(&self, source: &Source) -> Result<Vec<Activity>, SiloError>;

    /// Canonical form of a URL as this silo sees it
    fn canonicalize_url(&self, url: &str) -> Option<String> {
        normalize_http_url(url)
    }
}

/// Adapters by short name.
#[derive(Clone, Default)]
pub struct SiloRegistry {
    silos: HashMap<String, Arc<dyn Silo>>,
}

impl SiloRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, silo: Arc<dyn Silo>) -> Self {
        self.silos.insert(silo.short_name().to_string(), silo);
        self
    }

    pub fn get(&self, short_name: &str) -> Option<Arc<dyn Silo>> {
        self.silos.get(short_name).cloned()
    }

    /// Domains of every registered silo
    pub fn all_domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.silos.values().flat_map(|s| s.domains()).collect();
        domains.sort();
        domains.dedup();
        domains
    }
}

impl std::fmt::Debug for SiloRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.silos.keys().collect();
        names.sort();
        f.debug_struct("SiloRegistry").field("silos", &names).finish()
    }
}
