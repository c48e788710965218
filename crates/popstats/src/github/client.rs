//! GitHub client over the shared HTTP transport.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};

use super::error::{GitHubError, is_rate_limit_error, short_error_message};
use super::types::{GitHubAccount, GitHubRepo, RepoListing};
use crate::http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::retry::with_retry;
use crate::source::ApiRateLimiter;
use crate::sync::{GITHUB_PAGE_SIZE, ProgressCallback};

/// Default REST API base URL.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Default web base URL for repository pages.
pub const GITHUB_WEB_URL: &str = "https://github.com";

/// GitHub client.
///
/// API requests carry the bearer token when one is configured. Repository
/// pages are fetched anonymously.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    api_url: String,
    web_url: String,
    token: Option<String>,
    /// Optional pacing shared with every clone of this client.
    rate_limiter: Option<ApiRateLimiter>,
}

impl GitHubClient {
    /// Create a client against github.com.
    pub fn new(
        token: Option<&str>,
        rate_limiter: Option<ApiRateLimiter>,
    ) -> Result<Self, GitHubError> {
        let transport = ReqwestTransport::with_timeout(StdDuration::from_secs(30))
            .map_err(|e| GitHubError::Http(e.to_string()))?;

        Ok(Self::new_with_transport(
            GITHUB_API_URL,
            GITHUB_WEB_URL,
            token,
            rate_limiter,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        api_url: &str,
        web_url: &str,
        token: Option<&str>,
        rate_limiter: Option<ApiRateLimiter>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            api_url: api_url.trim_end_matches('/').to_string(),
            web_url: web_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()).map(str::to_string),
            rate_limiter,
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn web_url(&self) -> &str {
        &self.web_url
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, GitHubError> {
        self.wait_for_rate_limit().await;
        self.transport
            .send(request)
            .await
            .map_err(|e| GitHubError::Http(e.to_string()))
    }

    /// Make an API GET request and decode the JSON body.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, GitHubError> {
        let mut request = HttpRequest::get(format!("{}{}", self.api_url, path))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(ref token) = self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = self.send(request).await?;
        if let Some(err) = rate_limit_error(&response) {
            return Err(err);
        }
        if !response.is_success() {
            return Err(GitHubError::Api {
                status: response.status,
                message: response.text(),
            });
        }

        serde_json::from_slice(&response.body).map_err(GitHubError::Json)
    }

    /// Look up an owner's account.
    pub async fn get_account(&self, owner: &str) -> Result<GitHubAccount, GitHubError> {
        match self.get_json(&format!("/users/{owner}")).await {
            Err(GitHubError::Api { status: 404, .. }) => {
                Err(GitHubError::OwnerNotFound(owner.to_string()))
            }
            other => other,
        }
    }

    /// Fetch one page of an owner's repositories.
    pub async fn list_repos(
        &self,
        owner: &str,
        listing: RepoListing,
        page: u32,
    ) -> Result<Vec<GitHubRepo>, GitHubError> {
        let path = format!(
            "{}?per_page={}&page={}",
            listing.path(owner),
            GITHUB_PAGE_SIZE,
            page
        );
        match self.get_json(&path).await {
            Err(GitHubError::Api { status: 404, .. }) => {
                Err(GitHubError::OwnerNotFound(owner.to_string()))
            }
            other => other,
        }
    }

    /// [`GitHubClient::list_repos`], retried with backoff while rate limited.
    pub async fn list_repos_with_retry(
        &self,
        owner: &str,
        listing: RepoListing,
        page: u32,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<GitHubRepo>, GitHubError> {
        let label = format!("page {page}");
        with_retry(
            || self.list_repos(owner, listing, page),
            is_rate_limit_error,
            short_error_message,
            owner,
            &label,
            on_progress,
        )
        .await
    }

    /// Fetch the rendered HTML page of a repository.
    pub async fn fetch_repo_markup(&self, owner: &str, name: &str) -> Result<String, GitHubError> {
        let request = HttpRequest::get(format!("{}/{}/{}", self.web_url, owner, name))
            .header("Accept", "text/html");

        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(GitHubError::Api {
                status: response.status,
                message: format!("repository page {owner}/{name}"),
            });
        }
        Ok(response.text())
    }
}

/// Recognize primary (403 with no remaining quota) and secondary (429) limits.
fn rate_limit_error(response: &HttpResponse) -> Option<GitHubError> {
    let exhausted = response.status == 403 && response.header("x-ratelimit-remaining") == Some("0");
    if response.status != 429 && !exhausted {
        return None;
    }

    let reset_at = response
        .header("x-ratelimit-reset")
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|epoch| DateTime::<Utc>::from_timestamp(epoch, 0));
    Some(GitHubError::RateLimited { reset_at })
}
