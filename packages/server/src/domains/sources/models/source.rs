use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use typed_builder::TypedBuilder;

use crate::common::time::{never_polled, to_fence};
use crate::common::SourceKey;

/// Source - one linked silo account whose activity is bridged to webmentions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct Source {
    #[builder(setter(into))]
    pub key: SourceKey,
    /// Short name of the silo adapter that reads this source
    #[builder(setter(into))]
    pub silo: String,
    #[builder(default, setter(into))]
    pub name: String,
    #[builder(default, setter(strip_option, into))]
    pub feed_url: Option<String>,
    /// The user's own site URLs
    #[builder(default)]
    pub domain_urls: Vec<String>,
    #[builder(default = SourceStatus::Enabled)]
    pub status: SourceStatus,
    #[builder(default = vec![Feature::Listen])]
    pub features: Vec<Feature>,
    /// Fence: start time of the last successful poll
    #[builder(default = never_polled())]
    pub last_polled: DateTime<Utc>,
    /// Seconds between polls; the configured interval applies when unset
    #[builder(default, setter(strip_option))]
    pub poll_period_secs: Option<i64>,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl Source {
    pub fn is_listening(&self) -> bool {
        self.features.contains(&Feature::Listen)
    }

    pub fn poll_period(&self, fallback: Duration) -> Duration {
        match self.poll_period_secs {
            Some(secs) if secs > 0 => Duration::from_secs(secs as u64),
            _ => fallback,
        }
    }

    /// Record a successful fetch: the source is healthy and `at` is the new fence.
    pub fn mark_polled(&mut self, at: DateTime<Utc>) {
        self.status = SourceStatus::Enabled;
        self.last_polled = to_fence(at);
        self.updated_at = at;
    }
}

/// Source status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Enabled,
    Disabled,
    Error,
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceStatus::Enabled => write!(f, "enabled"),
            SourceStatus::Disabled => write!(f, "disabled"),
            SourceStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for SourceStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "enabled" => Ok(SourceStatus::Enabled),
            "disabled" => Ok(SourceStatus::Disabled),
            "error" => Ok(SourceStatus::Error),
            _ => Err(anyhow::anyhow!("Invalid source status: {}", s)),
        }
    }
}

/// Capabilities a user switched on for a source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Poll the silo and propagate responses as webmentions
    Listen,
    Publish,
    Webmention,
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feature::Listen => write!(f, "listen"),
            Feature::Publish => write!(f, "publish"),
            Feature::Webmention => write!(f, "webmention"),
        }
    }
}

impl std::str::FromStr for Feature {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "listen" => Ok(Feature::Listen),
            "publish" => Ok(Feature::Publish),
            "webmention" => Ok(Feature::Webmention),
            _ => Err(anyhow::anyhow!("Invalid source feature: {}", s)),
        }
    }
}
