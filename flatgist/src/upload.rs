#![doc = "GitHub Gist client: the networked implementation of the core `Publisher` trait."]
//
//! # Publisher integration (CLI <-> Core)
//!
//! [`GistClient`] talks to the GitHub REST API with `reqwest`. It holds no
//! credentials; the token is passed per call, as the [`Publisher`] contract asks.
//!
//! - Non-201 responses to a create request are returned as
//!   [`PublishOutcome::Rejected`] with the status code and response body.
//! - File contents in the payload are already escaped and go into the request
//!   body as-is, via [`GistPayload::to_request_body`].
//! - Only transport problems (timeout, DNS, refused connection, undecodable
//!   success body) are returned as `Err`.

use async_trait::async_trait;
use flatgist_core::contract::{GistPayload, PublishError, PublishOutcome, Publisher, RateLimit};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("flatgist/", env!("CARGO_PKG_VERSION"));

pub struct GistClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct CreatedGist {
    html_url: String,
}

#[derive(Deserialize)]
struct RateLimitResponse {
    rate: RateLimit,
}

impl GistClient {
    /// Client with the default timeout and user agent.
    pub fn new(base_url: impl Into<String>) -> Result<Self, PublishError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Client over a caller-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::info!(base_url = %base_url, "Initialized GistClient");
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn token_header(token: &str) -> String {
    format!("token {}", token.trim())
}

#[async_trait]
impl Publisher for GistClient {
    async fn publish(
        &self,
        payload: &GistPayload,
        token: &str,
    ) -> Result<PublishOutcome, PublishError> {
        tracing::info!(
            files = payload.files.len(),
            description = %payload.description,
            "Creating gist"
        );
        let body = payload.to_request_body()?;
        let response = self
            .http
            .post(self.url("/gists"))
            .header(AUTHORIZATION, token_header(token))
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, "Gist create request failed");
                e
            })?;

        let status = response.status();
        if status == StatusCode::CREATED {
            let created: CreatedGist = response.json().await?;
            tracing::info!(url = %created.html_url, "Successfully created gist");
            return Ok(PublishOutcome::Created {
                url: created.html_url,
            });
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = status.as_u16(), body = %body, "Gist create request rejected");
        Ok(PublishOutcome::Rejected {
            message: format!(
                "Failed to create Gist. Status code: {}. Error: {}",
                status.as_u16(),
                body
            ),
        })
    }

    async fn check_connection(&self) -> Result<u16, PublishError> {
        let response = self
            .http
            .get(self.url("/"))
            .header(ACCEPT, GITHUB_ACCEPT)
            .send()
            .await?;
        let status = response.status().as_u16();
        tracing::info!(status, "Checked API connection");
        Ok(status)
    }

    async fn rate_limit(&self, token: &str) -> Result<RateLimit, PublishError> {
        let response = self
            .http
            .get(self.url("/rate_limit"))
            .header(AUTHORIZATION, token_header(token))
            .header(ACCEPT, GITHUB_ACCEPT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "Rate limit query rejected");
            return Err(format!("rate limit query returned {}: {}", status.as_u16(), body).into());
        }

        let parsed: RateLimitResponse = response.json().await?;
        tracing::info!(
            remaining = parsed.rate.remaining,
            limit = parsed.rate.limit,
            "Fetched rate limit"
        );
        Ok(parsed.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let client = GistClient::with_client(reqwest::Client::new(), "https://example.test/api/");
        assert_eq!(client.url("/gists"), "https://example.test/api/gists");
    }

    #[test]
    fn token_header_trims_whitespace() {
        assert_eq!(token_header("  ghp_abc\n"), "token ghp_abc");
    }

    #[test]
    fn rate_limit_response_reads_the_rate_object() {
        let body = r#"{
            "resources": { "core": { "limit": 5000, "remaining": 1, "reset": 1, "used": 4999 } },
            "rate": { "limit": 5000, "remaining": 4990, "reset": 1700000000, "used": 10 }
        }"#;
        let parsed: RateLimitResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.rate.remaining, 4990);
        assert_eq!(parsed.rate.used, 10);
    }
}
