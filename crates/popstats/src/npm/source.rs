//! Organization package listing as a page source.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use super::client::NpmClient;
use super::downloads::{day_of_week_averages, downloads_epoch, lifetime_downloads};
use super::types::NpmPackage;
use crate::entity::source_kind::SourceKind;
use crate::metrics::Metrics;
use crate::source::{DetailRecord, Page, PageSource, Result};
use crate::sync::ProgressCallback;

/// Lists an npm organization's packages a page at a time.
///
/// Pagination continues while the listing advertises a next page. Each
/// package resolves to its lifetime downloads and weekday averages.
pub struct NpmPackageSource {
    client: NpmClient,
    org: String,
    as_of: Option<NaiveDate>,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl NpmPackageSource {
    pub fn new(client: NpmClient, org: impl Into<String>) -> Self {
        Self {
            client,
            org: org.into(),
            as_of: None,
            on_progress: None,
        }
    }

    /// Pin "today" instead of reading the clock.
    #[must_use]
    pub fn as_of(mut self, today: NaiveDate) -> Self {
        self.as_of = Some(today);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: Option<Arc<ProgressCallback>>) -> Self {
        self.on_progress = on_progress;
        self
    }

    fn today(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Utc::now().date_naive())
    }
}

#[async_trait]
impl PageSource for NpmPackageSource {
    type Item = NpmPackage;

    fn source_kind(&self) -> SourceKind {
        SourceKind::Npm
    }

    fn owner(&self) -> &str {
        &self.org
    }

    async fn fetch_page(&self, cursor: u32) -> Result<Page<NpmPackage>> {
        Ok(self
            .client
            .list_org_packages_with_retry(&self.org, cursor, self.on_progress.as_deref())
            .await?)
    }

    fn item_name(item: &NpmPackage) -> String {
        item.name.clone()
    }

    async fn resolve_detail(&self, package: NpmPackage) -> Result<DetailRecord> {
        let today = self.today();
        let created = package
            .created
            .map(|created| created.date_naive())
            .unwrap_or_else(downloads_epoch);

        let downloads = lifetime_downloads(&self.client, &package.name, created, today).await?;
        let averages = day_of_week_averages(&self.client, &package.name, today).await?;

        Ok(DetailRecord {
            source: SourceKind::Npm,
            owner: self.org.clone(),
            metrics: Metrics::package(downloads, averages),
            name: package.name,
        })
    }
}
