//! Progress reporting types for chain steps.
//!
//! The library never prints. Everything a user might want to watch is emitted
//! as a [`SyncProgress`] event through an optional callback; the CLI turns
//! these into progress bars or structured log lines.

use crate::entity::source_kind::SourceKind;

/// Progress events emitted while a chain runs.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// A new chain was started for an owner.
    ChainStarted {
        source: SourceKind,
        owner: String,
    },

    /// Fetching a listing page.
    FetchingPage {
        source: SourceKind,
        owner: String,
        /// Page number (1-indexed).
        page: u32,
    },

    /// Fetched a listing page.
    FetchedPage {
        source: SourceKind,
        owner: String,
        page: u32,
        /// Items on the page.
        count: usize,
        has_more: bool,
    },

    /// A listed item was resolved into a detail record.
    ResolvedDetail { owner: String, name: String },

    /// Resolving one item failed; the rest of the page carries on.
    DetailError {
        owner: String,
        name: String,
        error: String,
    },

    /// The repository counters were incomplete and will be scraped again.
    ScrapeRetry {
        owner: String,
        name: String,
        /// The attempt that came back incomplete.
        attempt: u32,
    },

    /// Scraping gave up; unresolved counters were stored as zero.
    ScrapeDegraded {
        owner: String,
        name: String,
        attempts: u32,
    },

    /// The resolved page was merged into the store.
    Merged {
        source: SourceKind,
        owner: String,
        page: u32,
        inserted: usize,
        patched: usize,
        unchanged: usize,
        errors: usize,
    },

    /// The step for the next page was handed to the scheduler.
    ContinuationScheduled {
        source: SourceKind,
        owner: String,
        next_page: u32,
    },

    /// Pagination ended and the aggregate was recomputed.
    Finalized {
        source: SourceKind,
        owner: String,
        details: usize,
        star_count: u64,
        download_count: u64,
    },

    /// A chain step failed.
    StepFailed {
        source: SourceKind,
        owner: String,
        page: u32,
        error: String,
        /// Fatal failures end the chain; others are redelivered.
        fatal: bool,
    },

    /// A failed step was scheduled for another delivery.
    StepRedelivered {
        source: SourceKind,
        owner: String,
        page: u32,
        delivery: u32,
        retry_after_ms: u64,
    },

    /// Rate limited, backing off before retry.
    RateLimitBackoff {
        owner: String,
        name: String,
        retry_after_ms: u64,
        attempt: u32,
    },

    /// Warning message (non-fatal).
    Warning { message: String },
}

/// Callback for progress updates during sync operations.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
