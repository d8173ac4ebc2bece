//! Record store for sources and responses.
//!
//! Both pipelines depend on single-record atomic compare-and-set: the poll
//! fence on `Source::last_polled` and the lease on `Response::version`.
//! Creation is create-if-absent so duplicate poll deliveries never reset a
//! response's progress.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::common::{ResponseKey, SourceKey};
use crate::domains::responses::Response;
use crate::domains::sources::Source;

/// Errors from a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be mapped back into a record
    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_source(&self, key: &SourceKey) -> Result<Option<Source>, StoreError>;

    /// Insert a source unless one with the same key exists.
    async fn insert_source(&self, source: &Source) -> Result<bool, StoreError>;

    /// Overwrite a source only if its stored `last_polled` still equals
    /// `expected_last_polled`. Returns false when the fence moved.
    async fn update_source_if_polled(
        &self,
        source: &Source,
        expected_last_polled: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn get_response(&self, key: &ResponseKey) -> Result<Option<Response>, StoreError>;

    /// Insert a response unless one with the same key exists. An existing
    /// record is left untouched and false is returned.
    async fn create_response_if_absent(&self, response: &Response) -> Result<bool, StoreError>;

    /// Overwrite a response only if its stored version equals
    /// `expected_version`. On success the stored and in-memory version both
    /// become `expected_version + 1`.
    async fn update_response_if_version(
        &self,
        response: &mut Response,
        expected_version: i64,
    ) -> Result<bool, StoreError>;

    async fn list_responses_for_source(&self, key: &SourceKey)
        -> Result<Vec<Response>, StoreError>;
}
