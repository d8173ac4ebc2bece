use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::{RecordStore, StoreError};
use crate::common::{ResponseKey, SourceKey, TargetSet};
use crate::domains::responses::{Response, ResponseKind, ResponseStatus};
use crate::domains::sources::{Feature, Source, SourceStatus};

const SOURCE_COLUMNS: &str = "key, silo, name, feed_url, domain_urls, status, features, \
     last_polled, poll_period_secs, created_at, updated_at";

const RESPONSE_COLUMNS: &str = "key, source_key, activity_id, kind, status, unsent, sent, error, \
     leased_until, activity_json, response_json, version, created_at, updated_at";

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn corrupt(key: &str, reason: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn source_from_row(r: &PgRow) -> Result<Source, StoreError> {
    let key: String = r.try_get("key")?;
    let status: String = r.try_get("status")?;
    let features: Vec<String> = r.try_get("features")?;

    Ok(Source {
        status: status.parse::<SourceStatus>().map_err(|e| corrupt(&key, e))?,
        features: features
            .iter()
            .map(|f| f.parse::<Feature>())
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| corrupt(&key, e))?,
        silo: r.try_get("silo")?,
        name: r.try_get("name")?,
        feed_url: r.try_get("feed_url")?,
        domain_urls: r.try_get("domain_urls")?,
        last_polled: r.try_get("last_polled")?,
        poll_period_secs: r.try_get("poll_period_secs")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
        key: SourceKey::new(key),
    })
}

fn response_from_row(r: &PgRow) -> Result<Response, StoreError> {
    let key: String = r.try_get("key")?;
    let kind: String = r.try_get("kind")?;
    let status: String = r.try_get("status")?;

    Ok(Response {
        kind: kind.parse::<ResponseKind>().map_err(|e| corrupt(&key, e))?,
        status: status.parse::<ResponseStatus>().map_err(|e| corrupt(&key, e))?,
        source_key: SourceKey::new(r.try_get::<String, _>("source_key")?),
        activity_id: r.try_get("activity_id")?,
        unsent: TargetSet::from(r.try_get::<Vec<String>, _>("unsent")?),
        sent: TargetSet::from(r.try_get::<Vec<String>, _>("sent")?),
        error: TargetSet::from(r.try_get::<Vec<String>, _>("error")?),
        leased_until: r.try_get("leased_until")?,
        activity_json: r.try_get("activity_json")?,
        response_json: r.try_get("response_json")?,
        version: r.try_get("version")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
        key: ResponseKey::new(key),
    })
}

fn feature_names(source: &Source) -> Vec<String> {
    source.features.iter().map(|f| f.to_string()).collect()
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn get_source(&self, key: &SourceKey) -> Result<Option<Source>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM sources WHERE key = $1", SOURCE_COLUMNS))
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(source_from_row).transpose()
    }

    async fn insert_source(&self, source: &Source) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO sources (
                key, silo, name, feed_url, domain_urls, status, features,
                last_polled, poll_period_secs, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(&source.key)
        .bind(&source.silo)
        .bind(&source.name)
        .bind(&source.feed_url)
        .bind(&source.domain_urls)
        .bind(source.status.to_string())
        .bind(feature_names(source))
        .bind(source.last_polled)
        .bind(source.poll_period_secs)
        .bind(source.created_at)
        .bind(source.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_source_if_polled(
        &self,
        source: &Source,
        expected_last_polled: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sources
            SET silo = $2, name = $3, feed_url = $4, domain_urls = $5, status = $6,
                features = $7, last_polled = $8, poll_period_secs = $9, updated_at = NOW()
            WHERE key = $1 AND last_polled = $10
            "#,
        )
        .bind(&source.key)
        .bind(&source.silo)
        .bind(&source.name)
        .bind(&source.feed_url)
        .bind(&source.domain_urls)
        .bind(source.status.to_string())
        .bind(feature_names(source))
        .bind(source.last_polled)
        .bind(source.poll_period_secs)
        .bind(expected_last_polled)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_response(&self, key: &ResponseKey) -> Result<Option<Response>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM responses WHERE key = $1",
            RESPONSE_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(response_from_row).transpose()
    }

    async fn create_response_if_absent(&self, response: &Response) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO responses (
                key, source_key, activity_id, kind, status, unsent, sent, error,
                leased_until, activity_json, response_json, version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(&response.key)
        .bind(&response.source_key)
        .bind(&response.activity_id)
        .bind(response.kind.to_string())
        .bind(response.status.to_string())
        .bind(response.unsent.to_vec())
        .bind(response.sent.to_vec())
        .bind(response.error.to_vec())
        .bind(response.leased_until)
        .bind(&response.activity_json)
        .bind(&response.response_json)
        .bind(response.version)
        .bind(response.created_at)
        .bind(response.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_response_if_version(
        &self,
        response: &mut Response,
        expected_version: i64,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE responses
            SET status = $2, unsent = $3, sent = $4, error = $5, leased_until = $6,
                activity_json = $7, response_json = $8,
                version = version + 1, updated_at = NOW()
            WHERE key = $1 AND version = $9
            RETURNING version, updated_at
            "#,
        )
        .bind(&response.key)
        .bind(response.status.to_string())
        .bind(response.unsent.to_vec())
        .bind(response.sent.to_vec())
        .bind(response.error.to_vec())
        .bind(response.leased_until)
        .bind(&response.activity_json)
        .bind(&response.response_json)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => {
                response.version = r.try_get("version")?;
                response.updated_at = r.try_get("updated_at")?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_responses_for_source(
        &self,
        key: &SourceKey,
    ) -> Result<Vec<Response>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM responses WHERE source_key = $1 ORDER BY created_at, key",
            RESPONSE_COLUMNS
        ))
        .bind(key)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(response_from_row).collect()
    }
}
