// https://www.w3.org/TR/webmention/#sender-discovers-receiver-webmention-endpoint

use std::time::Duration;

pub mod discovery;
pub mod models;

use reqwest::{header, Client};
use thiserror::Error;
use url::Url;

pub use crate::models::{ErrorCode, SendOutcome};

#[derive(Debug, Error)]
pub enum WebmentionError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct WebmentionOptions {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for WebmentionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: concat!("webmention-rs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Result of looking up a target's endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Found(Url),
    NotFound,
}

#[derive(Debug, Clone)]
pub struct WebmentionClient {
    client: Client,
}

impl WebmentionClient {
    pub fn new(options: WebmentionOptions) -> Result<Self, WebmentionError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch the target and look for its webmention endpoint.
    pub async fn discover_endpoint(&self, target: &Url) -> Result<Discovery, SendOutcome> {
        let response = self
            .client
            .get(target.clone())
            .header(header::ACCEPT, "text/html, */*")
            .send()
            .await
            .map_err(|e| SendOutcome::failed(ErrorCode::BadTargetUrl).with_detail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendOutcome::failed(ErrorCode::BadTargetUrl)
                .with_status(status.as_u16())
                .with_detail(format!("target returned {}", status)));
        }

        let base = response.url().clone();
        let link_headers: Vec<String> = response
            .headers()
            .get_all(header::LINK)
            .iter()
            .filter_map(|value| value.to_str().ok().map(str::to_string))
            .collect();

        if let Some(endpoint) =
            discovery::endpoint_from_link_header(&base, link_headers.iter().map(String::as_str))
        {
            return Ok(Discovery::Found(endpoint));
        }

        let is_html = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("html"))
            .unwrap_or(true);
        if !is_html {
            return Ok(Discovery::NotFound);
        }

        let body = response
            .text()
            .await
            .map_err(|e| SendOutcome::failed(ErrorCode::BadTargetUrl).with_detail(e.to_string()))?;

        Ok(match discovery::endpoint_from_html(&base, &body) {
            Some(endpoint) => Discovery::Found(endpoint),
            None => Discovery::NotFound,
        })
    }

    /// Discover the target's endpoint and send a webmention to it.
    pub async fn send(&self, source_url: &str, target_url: &str) -> SendOutcome {
        if Url::parse(source_url).is_err() {
            return SendOutcome::failed(ErrorCode::BadSourceUrl);
        }
        let target = match Url::parse(target_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            _ => return SendOutcome::failed(ErrorCode::BadTargetUrl),
        };

        match self.discover_endpoint(&target).await {
            Ok(Discovery::Found(endpoint)) => {
                self.send_to_endpoint(endpoint.as_str(), source_url, target_url)
                    .await
            }
            Ok(Discovery::NotFound) => SendOutcome::failed(ErrorCode::NoEndpoint),
            Err(outcome) => outcome,
        }
    }

    /// Send a webmention to an already known endpoint.
    pub async fn send_to_endpoint(
        &self,
        endpoint: &str,
        source_url: &str,
        target_url: &str,
    ) -> SendOutcome {
        let form = [("source", source_url), ("target", target_url)];

        let response = self
            .client
            .post(endpoint)
            .header(header::ACCEPT, "*/*")
            .form(&form)
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    tracing::debug!(endpoint, target_url, status = status.as_u16(), "webmention accepted");
                    SendOutcome::sent(endpoint, status.as_u16())
                } else {
                    let body = response.text().await.unwrap_or_default();
                    tracing::debug!(endpoint, target_url, status = status.as_u16(), "webmention rejected");
                    SendOutcome::failed(ErrorCode::ReceiverError)
                        .with_endpoint(endpoint)
                        .with_status(status.as_u16())
                        .with_detail(body)
                }
            }
            Err(e) => SendOutcome::failed(ErrorCode::ReceiverError)
                .with_endpoint(endpoint)
                .with_detail(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_urls_without_network() {
        let client = WebmentionClient::new(WebmentionOptions::default()).unwrap();

        let outcome = client.send("not a url", "http://example.zz/").await;
        assert_eq!(outcome.error, Some(ErrorCode::BadSourceUrl));

        let outcome = client.send("http://source/", "ftp://example.zz/").await;
        assert_eq!(outcome.error, Some(ErrorCode::BadTargetUrl));
        assert!(!outcome.success);
    }
}
