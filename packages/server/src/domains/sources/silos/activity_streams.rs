use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::{Silo, SiloError};
use crate::domains::sources::models::{Activity, Source};

/// Reads a source's `feed_url` as an ActivityStreams 1.0 feed.
///
/// The feed may be `{"items": [...]}` or a bare array of activities.
pub struct ActivityStreamsSilo {
    client: reqwest::Client,
    fetch_count: usize,
    domains: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Feed {
    Collection { items: Vec<Activity> },
    Bare(Vec<Activity>),
}

impl ActivityStreamsSilo {
    pub const SHORT_NAME: &'static str = "activitystreams";

    pub fn new(client: reqwest::Client, fetch_count: usize) -> Self {
        Self {
            client,
            fetch_count,
            domains: Vec::new(),
        }
    }

    /// Domains served by the feed host; links back to them are never targets.
    pub fn with_domains(mut self, domains: Vec<String>) -> Self {
        self.domains = domains;
        self
    }
}

#[async_trait]
impl Silo for ActivityStreamsSilo {
    fn short_name(&self) -> &str {
        Self::SHORT_NAME
    }

    fn domains(&self) -> Vec<String> {
        self.domains.clone()
    }

    async fn get_activities(&self, source: &Source) -> Result<Vec<Activity>, SiloError> {
        let feed_url = source
            .feed_url
            .as_deref()
            .ok_or_else(|| SiloError::disable(format!("source {} has no feed_url", source.key)))?;

        let response = self
            .client
            .get(feed_url)
            .query(&[("count", self.fetch_count)])
            .header(reqwest::header::ACCEPT, "application/stream+json, application/json")
            .send()
            .await
            .map_err(|e| SiloError::Transient(Box::new(e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SiloError::disable(format!(
                "{} returned {}",
                feed_url, status
            )));
        }
        if !status.is_success() {
            return Err(SiloError::transient(format!(
                "{} returned {}",
                feed_url, status
            )));
        }

        let feed: Feed = response
            .json()
            .await
            .map_err(|e| SiloError::Transient(Box::new(e)))?;
        let mut activities = match feed {
            Feed::Collection { items } => items,
            Feed::Bare(items) => items,
        };
        activities.truncate(self.fetch_count);

        debug!(
            source_key = %source.key,
            count = activities.len(),
            "fetched activities"
        );
        Ok(activities)
    }
}
