//! In-memory record store for tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{RecordStore, StoreError};
use crate::common::{ResponseKey, SourceKey};
use crate::domains::responses::Response;
use crate::domains::sources::Source;

/// Every compare-and-set holds the write lock for its whole check-and-write.
#[derive(Default)]
pub struct MemoryStore {
    sources: RwLock<HashMap<SourceKey, Source>>,
    responses: RwLock<HashMap<ResponseKey, Response>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn source_count(&self) -> usize {
        self.sources.read().await.len()
    }

    pub async fn response_count(&self) -> usize {
        self.responses.read().await.len()
    }

    /// Unconditional write, for seeding fixtures.
    pub async fn put_response(&self, response: Response) {
        self.responses
            .write()
            .await
            .insert(response.key.clone(), response);
    }

    /// Unconditional write, for seeding fixtures.
    pub async fn put_source(&self, source: Source) {
        self.sources.write().await.insert(source.key.clone(), source);
    }

    pub async fn delete_source(&self, key: &SourceKey) -> bool {
        self.sources.write().await.remove(key).is_some()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_source(&self, key: &SourceKey) -> Result<Option<Source>, StoreError> {
        Ok(self.sources.read().await.get(key).cloned())
    }

    async fn insert_source(&self, source: &Source) -> Result<bool, StoreError> {
        let mut sources = self.sources.write().await;
        if sources.contains_key(&source.key) {
            return Ok(false);
        }
        sources.insert(source.key.clone(), source.clone());
        Ok(true)
    }

    async fn update_source_if_polled(
        &self,
        source: &Source,
        expected_last_polled: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut sources = self.sources.write().await;
        match sources.get_mut(&source.key) {
            Some(stored) if stored.last_polled == expected_last_polled => {
                *stored = source.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_response(&self, key: &ResponseKey) -> Result<Option<Response>, StoreError> {
        Ok(self.responses.read().await.get(key).cloned())
    }

    async fn create_response_if_absent(&self, response: &Response) -> Result<bool, StoreError> {
        let mut responses = self.responses.write().await;
        if responses.contains_key(&response.key) {
            return Ok(false);
        }
        responses.insert(response.key.clone(), response.clone());
        Ok(true)
    }

    async fn update_response_if_version(
        &self,
        response: &mut Response,
        expected_version: i64,
    ) -> Result<bool, StoreError> {
        let mut responses = self.responses.write().await;
        match responses.get_mut(&response.key) {
            Some(stored) if stored.version == expected_version => {
                response.version = expected_version + 1;
                response.updated_at = Utc::now();
                *stored = response.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_responses_for_source(
        &self,
        key: &SourceKey,
    ) -> Result<Vec<Response>, StoreError> {
        let mut found: Vec<Response> = self
            .responses
            .read()
            .await
            .values()
            .filter(|r| &r.source_key == key)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.key.cmp(&b.key)));
        Ok(found)
    }
}
