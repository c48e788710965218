//! npm client over the shared HTTP transport.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::NaiveDate;
use url::Url;

use super::error::{NpmError, is_rate_limit_error, short_error_message};
use super::types::{DownloadRange, NpmPackage, OrgListingResponse, SCOPE_NOT_FOUND_MESSAGE};
use crate::http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::retry::with_retry;
use crate::source::{ApiRateLimiter, Page};
use crate::sync::ProgressCallback;

/// Default website URL serving organization listings.
pub const NPM_WEBSITE_URL: &str = "https://www.npmjs.com";

/// Default downloads API URL.
pub const NPM_DOWNLOADS_URL: &str = "https://api.npmjs.org";

/// npm client.
#[derive(Clone)]
pub struct NpmClient {
    transport: Arc<dyn HttpTransport>,
    website_url: String,
    downloads_url: String,
    rate_limiter: Option<ApiRateLimiter>,
}

impl NpmClient {
    pub fn new(rate_limiter: Option<ApiRateLimiter>) -> Result<Self, NpmError> {
        let transport = ReqwestTransport::with_timeout(StdDuration::from_secs(30))
            .map_err(|e| NpmError::Http(e.to_string()))?;

        Ok(Self::new_with_transport(
            NPM_WEBSITE_URL,
            NPM_DOWNLOADS_URL,
            rate_limiter,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        website_url: &str,
        downloads_url: &str,
        rate_limiter: Option<ApiRateLimiter>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            website_url: website_url.trim_end_matches('/').to_string(),
            downloads_url: downloads_url.trim_end_matches('/').to_string(),
            rate_limiter,
        }
    }

    pub fn website_url(&self) -> &str {
        &self.website_url
    }

    pub fn downloads_url(&self) -> &str {
        &self.downloads_url
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, NpmError> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }
        self.transport
            .send(request)
            .await
            .map_err(|e| NpmError::Http(e.to_string()))
    }

    /// URL of the organization listing for a 1-based `cursor`.
    ///
    /// The website numbers its pages from zero.
    pub fn org_listing_url(&self, org: &str, cursor: u32) -> Result<Url, NpmError> {
        let mut url = Url::parse(&format!("{}/org/{}", self.website_url, org))?;
        url.query_pairs_mut()
            .append_pair("page", &cursor.saturating_sub(1).to_string());
        Ok(url)
    }

    /// Fetch one page of an organization's packages.
    ///
    /// An unknown scope and a user scope are both errors, as is a body with
    /// neither a scope nor a package list. A scope with no package list
    /// yields an empty terminal page.
    pub async fn list_org_packages(
        &self,
        org: &str,
        cursor: u32,
    ) -> Result<Page<NpmPackage>, NpmError> {
        let url = self.org_listing_url(org, cursor)?;
        let request = HttpRequest::get(url.as_str())
            .header("Accept", "application/json")
            .header("cache-control", "no-cache")
            .header("x-spiferack", "1");

        let response = self.send(request).await?;
        let listing: OrgListingResponse = match serde_json::from_slice(&response.body) {
            Ok(listing) => listing,
            Err(_) if !response.is_success() => {
                return Err(NpmError::Api {
                    status: response.status,
                    message: response.text(),
                });
            }
            Err(e) => return Err(NpmError::Json(e)),
        };

        if listing.packages.is_none()
            && listing.message.as_deref() == Some(SCOPE_NOT_FOUND_MESSAGE)
        {
            return Err(NpmError::OrgNotFound(org.to_string()));
        }
        if listing
            .scope
            .as_ref()
            .is_some_and(|scope| scope.scope_type == "user")
        {
            return Err(NpmError::ScopeIsUser(org.to_string()));
        }
        if !response.is_success() {
            return Err(NpmError::Api {
                status: response.status,
                message: listing.message.unwrap_or_else(|| response.text()),
            });
        }

        if listing.scope.is_none() && listing.packages.is_none() {
            return Err(NpmError::Malformed(format!(
                "org listing for {org} has neither scope nor packages"
            )));
        }
        let Some(packages) = listing.packages else {
            return Ok(Page::terminal(cursor));
        };

        Ok(Page {
            cursor,
            has_more: packages.urls.has_next(),
            items: packages.objects.into_iter().map(NpmPackage::from).collect(),
        })
    }

    /// [`NpmClient::list_org_packages`], retried with backoff while throttled.
    pub async fn list_org_packages_with_retry(
        &self,
        org: &str,
        cursor: u32,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Page<NpmPackage>, NpmError> {
        let label = format!("page {cursor}");
        with_retry(
            || self.list_org_packages(org, cursor),
            is_rate_limit_error,
            short_error_message,
            org,
            &label,
            on_progress,
        )
        .await
    }

    /// Daily downloads of `package` between two days, inclusive.
    pub async fn download_range(
        &self,
        package: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<DownloadRange, NpmError> {
        let url = Url::parse(&format!(
            "{}/downloads/range/{}:{}/{}",
            self.downloads_url,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d"),
            package
        ))?;

        let response = self
            .send(HttpRequest::get(url.as_str()).header("Accept", "application/json"))
            .await?;
        if !response.is_success() {
            return Err(NpmError::Api {
                status: response.status,
                message: response.text(),
            });
        }

        serde_json::from_slice(&response.body).map_err(NpmError::Json)
    }
}
