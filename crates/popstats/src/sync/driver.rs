//! One page of synchronization work per chain step.
//!
//! A step fetches a page, resolves its items with bounded concurrency,
//! merges them, and then either schedules the step for the next page or
//! recomputes the owner aggregate. The page cursor inside [`ChainStep`] is
//! the only state carried from one step to the next.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::entity::source_kind::SourceKind;
use crate::github::{GitHubClient, GitHubRepoSource, RepoListing};
use crate::npm::{NpmClient, NpmPackageSource};
use crate::source::{PageSource, SourceError};

use super::aggregate::recompute_owner;
use super::errors::SyncError;
use super::fetcher::RateLimitedFetcher;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::scheduler::TaskScheduler;
use super::types::{MergeReport, StepOutcome, StepReport, SyncOptions};
use super::upsert::merge_batch;

/// A schedulable unit of work: which listing, and which page of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainStep {
    #[serde(rename = "github_repos")]
    GitHubRepos {
        owner: String,
        listing: RepoListing,
        page: u32,
    },
    NpmPackages { org: String, page: u32 },
}

impl ChainStep {
    pub fn source(&self) -> SourceKind {
        match self {
            ChainStep::GitHubRepos { .. } => SourceKind::GitHub,
            ChainStep::NpmPackages { .. } => SourceKind::Npm,
        }
    }

    pub fn owner(&self) -> &str {
        match self {
            ChainStep::GitHubRepos { owner, .. } => owner,
            ChainStep::NpmPackages { org, .. } => org,
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            ChainStep::GitHubRepos { page, .. } | ChainStep::NpmPackages { page, .. } => *page,
        }
    }

    /// The same listing one page further.
    #[must_use]
    pub fn next_page(&self) -> Self {
        let mut next = self.clone();
        match &mut next {
            ChainStep::GitHubRepos { page, .. } | ChainStep::NpmPackages { page, .. } => {
                *page = page.saturating_add(1);
            }
        }
        next
    }
}

impl fmt::Display for ChainStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} page {}", self.source(), self.owner(), self.page())
    }
}

/// Everything a chain step needs besides its cursor.
pub struct SyncContext {
    db: DatabaseConnection,
    scheduler: Arc<dyn TaskScheduler>,
    options: SyncOptions,
    github: Option<GitHubClient>,
    npm: Option<NpmClient>,
    as_of: Option<NaiveDate>,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl SyncContext {
    pub fn new(
        db: DatabaseConnection,
        scheduler: Arc<dyn TaskScheduler>,
        options: SyncOptions,
    ) -> Self {
        Self {
            db,
            scheduler,
            options,
            github: None,
            npm: None,
            as_of: None,
            on_progress: None,
        }
    }

    #[must_use]
    pub fn with_github(mut self, client: GitHubClient) -> Self {
        self.github = Some(client);
        self
    }

    #[must_use]
    pub fn with_npm(mut self, client: NpmClient) -> Self {
        self.npm = Some(client);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Arc<ProgressCallback>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Pin the day download windows end on.
    #[must_use]
    pub fn with_as_of(mut self, today: NaiveDate) -> Self {
        self.as_of = Some(today);
        self
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn scheduler(&self) -> &Arc<dyn TaskScheduler> {
        &self.scheduler
    }

    pub(crate) fn progress(&self) -> Option<&ProgressCallback> {
        self.on_progress.as_deref()
    }
}

/// Resolve a GitHub owner's listing and schedule its first page.
pub async fn start_github_chain(ctx: &SyncContext, owner: &str) -> Result<ChainStep, SyncError> {
    let owner = owner.trim();
    if owner.is_empty() {
        return Err(SyncError::InvalidInput("owner must not be empty".to_string()));
    }
    let client = ctx.github.as_ref().ok_or(SyncError::MissingClient("github"))?;

    let account = client.get_account(owner).await.map_err(SourceError::from)?;
    let step = ChainStep::GitHubRepos {
        owner: account.login.clone(),
        listing: account.listing(),
        page: 1,
    };
    start_chain(ctx, step)
}

/// Schedule the first page of an npm organization.
pub fn start_npm_chain(ctx: &SyncContext, org: &str) -> Result<ChainStep, SyncError> {
    let org = org.trim();
    if org.is_empty() {
        return Err(SyncError::InvalidInput("org must not be empty".to_string()));
    }
    if ctx.npm.is_none() {
        return Err(SyncError::MissingClient("npm"));
    }

    start_chain(
        ctx,
        ChainStep::NpmPackages {
            org: org.to_string(),
            page: 1,
        },
    )
}

fn start_chain(ctx: &SyncContext, step: ChainStep) -> Result<ChainStep, SyncError> {
    info!(%step, "starting chain");
    emit(
        ctx.progress(),
        SyncProgress::ChainStarted {
            source: step.source(),
            owner: step.owner().to_string(),
        },
    );
    ctx.scheduler.schedule(step.clone(), Duration::ZERO)?;
    Ok(step)
}

/// Run one chain step to completion.
///
/// On success the step has either scheduled its continuation or finalized
/// the owner. On error nothing was scheduled and the aggregate was not
/// touched; detail rows merged before the failure stay in place.
pub async fn run_step(ctx: &SyncContext, step: &ChainStep) -> Result<StepReport, SyncError> {
    match step {
        ChainStep::GitHubRepos { owner, listing, .. } => {
            let client = ctx.github.clone().ok_or(SyncError::MissingClient("github"))?;
            let source = GitHubRepoSource::new(client, owner.clone(), *listing)
                .with_scrape_attempts(ctx.options.scrape_attempts)
                .with_progress(ctx.on_progress.clone());
            drive_page(ctx, Arc::new(source), step).await
        }
        ChainStep::NpmPackages { org, .. } => {
            let client = ctx.npm.clone().ok_or(SyncError::MissingClient("npm"))?;
            let mut source =
                NpmPackageSource::new(client, org.clone()).with_progress(ctx.on_progress.clone());
            if let Some(today) = ctx.as_of {
                source = source.as_of(today);
            }
            drive_page(ctx, Arc::new(source), step).await
        }
    }
}

async fn drive_page<S>(
    ctx: &SyncContext,
    source: Arc<S>,
    step: &ChainStep,
) -> Result<StepReport, SyncError>
where
    S: PageSource + 'static,
{
    let kind = source.source_kind();
    let owner = source.owner().to_string();
    let cursor = step.page();

    emit(
        ctx.progress(),
        SyncProgress::FetchingPage {
            source: kind,
            owner: owner.clone(),
            page: cursor,
        },
    );
    let page = source.fetch_page(cursor).await?;
    emit(
        ctx.progress(),
        SyncProgress::FetchedPage {
            source: kind,
            owner: owner.clone(),
            page: cursor,
            count: page.items.len(),
            has_more: page.has_more,
        },
    );

    if page.is_terminal() {
        debug!(%step, "empty page, finalizing");
        return finalize(ctx, kind, owner, cursor, 0, Vec::new(), MergeReport::default()).await;
    }

    let listed = page.items.len();
    let has_more = page.has_more;
    let names: Vec<String> = page.items.iter().map(S::item_name).collect();

    let resolver = Arc::clone(&source);
    let results = RateLimitedFetcher::new(ctx.options.concurrency)
        .run(page.items, move |item| {
            let source = Arc::clone(&resolver);
            async move { source.resolve_detail(item).await.map_err(SyncError::from) }
        })
        .await;

    let mut records = Vec::with_capacity(listed);
    let mut failed = Vec::new();
    for (name, result) in names.into_iter().zip(results) {
        match result {
            Ok(record) => {
                emit(
                    ctx.progress(),
                    SyncProgress::ResolvedDetail {
                        owner: owner.clone(),
                        name,
                    },
                );
                records.push(record);
            }
            Err(e) => {
                warn!(%owner, item = %name, error = %e, "failed to resolve detail");
                emit(
                    ctx.progress(),
                    SyncProgress::DetailError {
                        owner: owner.clone(),
                        name: name.clone(),
                        error: e.to_string(),
                    },
                );
                failed.push((name, e.to_string()));
            }
        }
    }

    let merge = merge_batch(&ctx.db, &records, Utc::now()).await;
    emit(
        ctx.progress(),
        SyncProgress::Merged {
            source: kind,
            owner: owner.clone(),
            page: cursor,
            inserted: merge.inserted,
            patched: merge.patched,
            unchanged: merge.unchanged,
            errors: merge.errors.len(),
        },
    );

    if !has_more {
        return finalize(ctx, kind, owner, cursor, listed, failed, merge).await;
    }

    let next = step.next_page();
    let next_page = next.page();
    ctx.scheduler.schedule(next, ctx.options.continuation_delay)?;
    debug!(%step, next_page, "continuation scheduled");
    emit(
        ctx.progress(),
        SyncProgress::ContinuationScheduled {
            source: kind,
            owner: owner.clone(),
            next_page,
        },
    );

    Ok(StepReport {
        source: kind,
        owner,
        page: cursor,
        listed,
        failed,
        merge,
        outcome: StepOutcome::Continued { next_page },
    })
}

async fn finalize(
    ctx: &SyncContext,
    source: SourceKind,
    owner: String,
    page: u32,
    listed: usize,
    failed: Vec<(String, String)>,
    merge: MergeReport,
) -> Result<StepReport, SyncError> {
    let aggregate = recompute_owner(&ctx.db, source, &owner, Utc::now()).await?;
    let totals = aggregate.owner.metrics();

    info!(
        %source,
        %owner,
        pages = page,
        details = aggregate.details,
        stars = totals.star_count,
        downloads = totals.download_count,
        "chain finalized"
    );
    emit(
        ctx.progress(),
        SyncProgress::Finalized {
            source,
            owner: owner.clone(),
            details: aggregate.details,
            star_count: totals.star_count,
            download_count: totals.download_count,
        },
    );

    Ok(StepReport {
        source,
        owner,
        page,
        listed,
        failed,
        merge,
        outcome: StepOutcome::Finalized {
            owner: aggregate.owner,
        },
    })
}

#[cfg(test)]
mod step_tests {
    use super::*;

    #[test]
    fn next_page_keeps_the_listing() {
        let step = ChainStep::GitHubRepos {
            owner: "TanStack".to_string(),
            listing: RepoListing::Organization,
            page: 4,
        };
        let next = step.next_page();
        assert_eq!(next.page(), 5);
        assert_eq!(next.owner(), "TanStack");
        assert!(matches!(
            next,
            ChainStep::GitHubRepos {
                listing: RepoListing::Organization,
                ..
            }
        ));
        assert_eq!(step.to_string(), "github:TanStack page 4");
    }

    #[test]
    fn steps_serialize_as_tagged_arguments() {
        let step = ChainStep::NpmPackages {
            org: "tanstack".to_string(),
            page: 2,
        };
        let json = serde_json::to_value(&step).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"kind": "npm_packages", "org": "tanstack", "page": 2})
        );

        let github: ChainStep = serde_json::from_value(serde_json::json!({
            "kind": "github_repos", "owner": "octocat", "listing": "user", "page": 1
        }))
        .expect("deserialize");
        assert_eq!(github.source(), SourceKind::GitHub);
    }
}
