//! npm website and downloads API payloads.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

/// Message the website returns for an unknown scope.
pub const SCOPE_NOT_FOUND_MESSAGE: &str = "NotFoundError: Scope not found";

/// JSON rendering of `https://www.npmjs.com/org/{org}` (`x-spiferack: 1`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrgListingResponse {
    pub scope: Option<Scope>,
    pub packages: Option<PackageList>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scope {
    /// `"org"` or `"user"`.
    #[serde(rename = "type")]
    pub scope_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageList {
    #[serde(default)]
    pub objects: Vec<PackageObject>,
    #[serde(default)]
    pub urls: PackageUrls,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackageObject {
    pub name: String,
    pub created: Option<Timestamp>,
}

/// Millisecond epoch wrapper used throughout the website JSON.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Timestamp {
    pub ts: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageUrls {
    pub next: Option<String>,
}

impl PackageUrls {
    pub fn has_next(&self) -> bool {
        self.next.as_deref().is_some_and(|next| !next.is_empty())
    }
}

/// A listed package before its downloads are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpmPackage {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
}

impl From<PackageObject> for NpmPackage {
    fn from(object: PackageObject) -> Self {
        Self {
            name: object.name,
            created: object
                .created
                .and_then(|created| DateTime::<Utc>::from_timestamp_millis(created.ts)),
        }
    }
}

/// Response of `/downloads/range/{from}:{to}/{package}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadRange {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub downloads: Vec<DailyDownloads>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailyDownloads {
    pub day: String,
    pub downloads: u64,
}

impl DownloadRange {
    pub fn total(&self) -> u64 {
        self.downloads
            .iter()
            .fold(0u64, |acc, day| acc.saturating_add(day.downloads))
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        parse_day(&self.end)
    }
}

/// Parse a `YYYY-MM-DD` day.
pub fn parse_day(day: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
