//! GitHub repository listing, repository page scraping, and star events.
//!
//! Stars come from the REST listing API. Contributor and dependent counts are
//! not exposed by the API, so they are scraped from the repository's HTML
//! page with [`scrape::scrape_repo_counters`].

pub mod client;
pub mod error;
pub mod scrape;
pub mod source;
pub mod types;

pub use client::{GITHUB_API_URL, GITHUB_WEB_URL, GitHubClient};
pub use error::{GitHubError, is_rate_limit_error, short_error_message};
pub use scrape::{RepoCounters, ScrapeResult, parse_repo_counters, scrape_repo_counters};
pub use source::GitHubRepoSource;
pub use types::{GitHubAccount, GitHubRepo, RepoListing, RepositoryEventPayload};
