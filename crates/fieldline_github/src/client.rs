//! GitHub REST client.
//!
//! Thin wrapper over `reqwest` implementing [`IssueFetcher`] against the
//! live issues endpoint. The client receives an already-authorized
//! [`GithubContext`]; it does not obtain or validate credentials.

use crate::sync::{IssueFetcher, SyncError};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

const GITHUB_API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "fieldline-sync";

/// Authorized coordinates of one GitHub-backed list.
#[derive(Debug, Clone)]
pub struct GithubContext {
    pub access_token: String,
    pub owner: String,
    pub repo_name: String,
}

/// Issues-endpoint client for one repository.
pub struct GithubClient {
    http: reqwest::Client,
    context: GithubContext,
    base_url: String,
}

impl GithubClient {
    pub fn new(context: GithubContext) -> Self {
        Self {
            http: reqwest::Client::new(),
            context,
            base_url: GITHUB_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API host (proxy or test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl IssueFetcher for GithubClient {
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Vec<Value>, SyncError> {
        let url = format!(
            "{}/repos/{}/{}/issues",
            self.base_url, self.context.owner, self.context.repo_name
        );
        debug!(url, page, per_page, "fetching issue page");

        let per_page = per_page.to_string();
        let page_param = page.to_string();
        let response = self
            .http
            .get(&url)
            .query(&[
                ("state", "all"),
                ("per_page", per_page.as_str()),
                ("page", page_param.as_str()),
            ])
            .bearer_auth(&self.context.access_token)
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await?;

        let status = response.status().as_u16();
        // Rate limiting is transient: surface it distinctly so the caller
        // can reschedule instead of treating the sync as broken.
        if status == 403 || status == 429 {
            return Err(SyncError::RateLimited { status, page });
        }
        if !response.status().is_success() {
            return Err(SyncError::Status { status, page });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_with_context() {
        let client = GithubClient::new(GithubContext {
            access_token: "token".to_string(),
            owner: "acme".to_string(),
            repo_name: "widgets".to_string(),
        });
        assert_eq!(client.base_url, GITHUB_API_BASE);

        let client = client.with_base_url("http://localhost:9999");
        assert_eq!(client.base_url, "http://localhost:9999");
    }
}
