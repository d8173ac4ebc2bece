use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Public base URL; webmention source URLs are built under it
    pub base_url: String,
    pub lease_length: Duration,
    pub poll_interval: Duration,
    pub activity_fetch_count: usize,
    pub http_timeout: Duration,
    pub cache_max_entries: usize,
    /// Extra domains that never receive webmentions (on top of silo domains)
    pub webmention_blocklist: Vec<String>,
    /// Domains owned by the ActivityStreams silo; links to them are never targets
    pub silo_domains: Vec<String>,
    pub worker_enabled: bool,
    pub worker_batch_size: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: parse_var("PORT", 8080).context("PORT must be a valid number")?,
            base_url: env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string())
                .trim_end_matches('/')
                .to_string(),
            lease_length: Duration::from_secs(
                parse_var("LEASE_LENGTH_SECS", 1800)
                    .context("LEASE_LENGTH_SECS must be a number of seconds")?,
            ),
            poll_interval: Duration::from_secs(
                parse_var("POLL_INTERVAL_SECS", 1800)
                    .context("POLL_INTERVAL_SECS must be a number of seconds")?,
            ),
            activity_fetch_count: parse_var("ACTIVITY_FETCH_COUNT", 20)
                .context("ACTIVITY_FETCH_COUNT must be a valid number")?,
            http_timeout: Duration::from_secs(
                parse_var("HTTP_TIMEOUT_SECS", 15)
                    .context("HTTP_TIMEOUT_SECS must be a number of seconds")?,
            ),
            cache_max_entries: parse_var("CACHE_MAX_ENTRIES", 5000)
                .context("CACHE_MAX_ENTRIES must be a valid number")?,
            webmention_blocklist: env::var("WEBMENTION_BLOCKLIST")
                .map(|raw| parse_domain_list(&raw))
                .unwrap_or_default(),
            silo_domains: env::var("SILO_DOMAINS")
                .map(|raw| parse_domain_list(&raw))
                .unwrap_or_default(),
            worker_enabled: parse_var("WORKER_ENABLED", true)
                .context("WORKER_ENABLED must be true or false")?,
            worker_batch_size: parse_var("WORKER_BATCH_SIZE", 10)
                .context("WORKER_BATCH_SIZE must be a valid number")?,
        })
    }

    /// Configuration for tests and local tools that never touch the environment.
    pub fn for_tests() -> Self {
        Self {
            database_url: String::new(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            lease_length: Duration::from_secs(1800),
            poll_interval: Duration::from_secs(1800),
            activity_fetch_count: 20,
            http_timeout: Duration::from_secs(15),
            cache_max_entries: 5000,
            webmention_blocklist: Vec::new(),
            silo_domains: Vec::new(),
            worker_enabled: false,
            worker_batch_size: 10,
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => Ok(raw.trim().parse()?),
        _ => Ok(default),
    }
}

fn parse_domain_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|d| d.trim().trim_start_matches("www.").to_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_domain_list() {
        assert_eq!(
            parse_domain_list(" www.Example.com, ,foo.org "),
            vec!["example.com".to_string(), "foo.org".to_string()]
        );
    }

    #[test]
    fn test_for_tests_defaults() {
        let config = Config::for_tests();
        assert_eq!(config.lease_length, Duration::from_secs(1800));
        assert!(!config.worker_enabled);
    }
}
