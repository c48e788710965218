//! Sync constants and options.

use std::time::Duration;

use crate::entity::owner::Model as OwnerModel;
use crate::entity::source_kind::SourceKind;

/// Default number of concurrent detail resolutions per page.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Attempts made to scrape the repository counters before giving up.
pub const DEFAULT_SCRAPE_ATTEMPTS: u32 = 3;

/// Page size of the repository listing API.
pub const GITHUB_PAGE_SIZE: u32 = 100;

/// Width of a single downloads-range request.
pub const DOWNLOAD_WINDOW_DAYS: i64 = 17 * 30;

/// Trailing window used for weekday download averages.
pub const DAY_OF_WEEK_WINDOW_DAYS: i64 = 30;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Maximum in-place retries of a rate limited listing request.
pub const MAX_LISTING_RETRIES: usize = 5;

/// Maximum deliveries of a single chain step by the local scheduler.
pub const DEFAULT_MAX_DELIVERIES: u32 = 5;

/// Options shared by every chain step.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Maximum concurrent detail resolutions within one page.
    pub concurrency: usize,
    /// Scrape attempts per repository page.
    pub scrape_attempts: u32,
    /// Delay before a continuation step runs.
    pub continuation_delay: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            scrape_attempts: DEFAULT_SCRAPE_ATTEMPTS,
            continuation_delay: Duration::ZERO,
        }
    }
}

/// Per-page result of the diffing merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: usize,
    pub patched: usize,
    pub unchanged: usize,
    /// `(item, message)` for every record that failed to merge.
    pub errors: Vec<(String, String)>,
}

impl MergeReport {
    /// Number of records that produced a write.
    pub fn written(&self) -> usize {
        self.inserted + self.patched
    }
}

/// How a chain step ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// More pages remain; the step for `next_page` was scheduled.
    Continued { next_page: u32 },
    /// Pagination ended and the owner aggregate was recomputed.
    Finalized { owner: OwnerModel },
}

/// Summary of one chain step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub source: SourceKind,
    pub owner: String,
    pub page: u32,
    /// Items listed on the page.
    pub listed: usize,
    /// Items whose detail resolution failed and were left out of the merge.
    pub failed: Vec<(String, String)>,
    pub merge: MergeReport,
    pub outcome: StepOutcome,
}
