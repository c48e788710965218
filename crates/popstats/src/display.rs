//! Read-side projections of the stored aggregates.

use chrono::{DateTime, Datelike, Days, Utc};
use sea_orm::ConnectionTrait;
use serde::Serialize;

use crate::entity::owner::Model as OwnerModel;
use crate::entity::source_kind::SourceKind;
use crate::metrics::DayOfWeekAverages;
use crate::store::{StoreError, owner};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Download count extrapolated from the last sync.
///
/// Starting at the stored count, the value climbs linearly towards one
/// day's worth of downloads (the average for tomorrow's weekday) over the
/// 24 hours after `updated_at`, then holds there. It never drops below the
/// stored count.
pub fn projected_download_count(owner: &OwnerModel, now: DateTime<Utc>) -> u64 {
    let metrics = owner.metrics();
    let tomorrow = now
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap_or(now.date_naive());
    let daily = metrics
        .day_of_week_averages
        .for_weekday(tomorrow.weekday().num_days_from_sunday() as usize);

    let elapsed = (now - owner.updated_at.with_timezone(&Utc))
        .num_milliseconds()
        .clamp(0, DAY_MS);
    let extra = u128::from(daily) * elapsed as u128 / DAY_MS as u128;

    metrics
        .download_count
        .saturating_add(u64::try_from(extra).unwrap_or(u64::MAX))
}

/// Combined counters for a GitHub owner and an npm organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub github_owner: Option<String>,
    pub npm_org: Option<String>,
    pub star_count: u64,
    pub contributor_count: u64,
    pub dependent_count: u64,
    pub download_count: u64,
    pub projected_download_count: u64,
    pub day_of_week_averages: DayOfWeekAverages,
    pub github_updated_at: Option<DateTime<Utc>>,
    pub npm_updated_at: Option<DateTime<Utc>>,
}

/// Load the snapshot for the given owners. Unknown owners contribute zeros.
pub async fn get_stats<C: ConnectionTrait>(
    db: &C,
    github_owner: Option<&str>,
    npm_org: Option<&str>,
    now: DateTime<Utc>,
) -> Result<StatsSnapshot, StoreError> {
    let mut snapshot = StatsSnapshot {
        github_owner: github_owner.map(str::to_string),
        npm_org: npm_org.map(str::to_string),
        ..Default::default()
    };

    if let Some(name) = github_owner
        && let Some(row) = owner::find(db, SourceKind::GitHub, name).await?
    {
        let metrics = row.metrics();
        snapshot.star_count = metrics.star_count;
        snapshot.contributor_count = metrics.contributor_count;
        snapshot.dependent_count = metrics.dependent_count;
        snapshot.github_updated_at = Some(row.updated_at.with_timezone(&Utc));
    }

    if let Some(name) = npm_org
        && let Some(row) = owner::find(db, SourceKind::Npm, name).await?
    {
        let metrics = row.metrics();
        snapshot.download_count = metrics.download_count;
        snapshot.projected_download_count = projected_download_count(&row, now);
        snapshot.day_of_week_averages = metrics.day_of_week_averages;
        snapshot.npm_updated_at = Some(row.updated_at.with_timezone(&Utc));
    }

    Ok(snapshot)
}
