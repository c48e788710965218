//! Repository listing as a page source.

use std::sync::Arc;

use async_trait::async_trait;

use super::client::GitHubClient;
use super::scrape::scrape_repo_counters;
use super::types::{GitHubRepo, RepoListing};
use crate::entity::source_kind::SourceKind;
use crate::metrics::Metrics;
use crate::source::{DetailRecord, Page, PageSource, Result};
use crate::sync::{DEFAULT_SCRAPE_ATTEMPTS, ProgressCallback};

/// Lists an owner's repositories a page at a time.
///
/// Pagination ends at the first empty page. Star counts come from the
/// listing; contributor and dependent counts are scraped per repository.
pub struct GitHubRepoSource {
    client: GitHubClient,
    owner: String,
    listing: RepoListing,
    scrape_attempts: u32,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl GitHubRepoSource {
    pub fn new(client: GitHubClient, owner: impl Into<String>, listing: RepoListing) -> Self {
        Self {
            client,
            owner: owner.into(),
            listing,
            scrape_attempts: DEFAULT_SCRAPE_ATTEMPTS,
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_scrape_attempts(mut self, attempts: u32) -> Self {
        self.scrape_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Option<Arc<ProgressCallback>>) -> Self {
        self.on_progress = on_progress;
        self
    }

    pub fn listing(&self) -> RepoListing {
        self.listing
    }
}

#[async_trait]
impl PageSource for GitHubRepoSource {
    type Item = GitHubRepo;

    fn source_kind(&self) -> SourceKind {
        SourceKind::GitHub
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    async fn fetch_page(&self, cursor: u32) -> Result<Page<GitHubRepo>> {
        let repos = self
            .client
            .list_repos_with_retry(
                &self.owner,
                self.listing,
                cursor,
                self.on_progress.as_deref(),
            )
            .await?;

        Ok(Page {
            cursor,
            has_more: !repos.is_empty(),
            items: repos,
        })
    }

    fn item_name(item: &GitHubRepo) -> String {
        item.name.clone()
    }

    async fn resolve_detail(&self, repo: GitHubRepo) -> Result<DetailRecord> {
        let scraped = scrape_repo_counters(
            &self.client,
            &self.owner,
            &repo.name,
            self.scrape_attempts,
            self.on_progress.as_deref(),
        )
        .await;

        Ok(DetailRecord {
            source: SourceKind::GitHub,
            owner: self.owner.clone(),
            metrics: Metrics::repository(
                repo.stargazers_count,
                scraped.contributor_count,
                scraped.dependent_count,
            ),
            name: repo.name,
        })
    }
}
