//! The chained synchronization pipeline.
//!
//! # Module Structure
//!
//! - [`types`] - Constants, `SyncOptions`, and per-step reports
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`fetcher`] - Bounded fan-out of detail resolution
//! - [`upsert`] - Diffing merge of resolved records
//! - [`aggregate`] - Owner recomputation from detail rows
//! - [`driver`] - One page per chain step
//! - [`scheduler`] - Deferred delivery of chain steps
//! - [`events`] - Inbound star-count changes

pub mod aggregate;
pub mod driver;
mod errors;
pub mod events;
pub mod fetcher;
mod progress;
pub mod scheduler;
mod types;
pub mod upsert;

pub use types::{MergeReport, StepOutcome, StepReport, SyncOptions};

pub use types::{
    DAY_OF_WEEK_WINDOW_DAYS, DEFAULT_CONCURRENCY, DEFAULT_MAX_DELIVERIES, DEFAULT_SCRAPE_ATTEMPTS,
    DOWNLOAD_WINDOW_DAYS, GITHUB_PAGE_SIZE, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_LISTING_RETRIES,
};

pub use progress::{ProgressCallback, SyncProgress, emit};

pub use aggregate::{Aggregate, recompute_owner};
pub use driver::{ChainStep, SyncContext, run_step, start_github_chain, start_npm_chain};
pub use errors::SyncError;
pub use events::{EventOutcome, StarCountChanged, apply_star_change};
pub use fetcher::RateLimitedFetcher;
pub use scheduler::{DrainSummary, LocalScheduler, SchedulerError, StepQueue, TaskScheduler};
pub use upsert::{MergeOutcome, merge_batch, merge_detail};
