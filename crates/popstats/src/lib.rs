//! Popstats - popularity metrics for source-hosting owners and registry orgs.
//!
//! This library keeps star, contributor, dependent and download counts for
//! GitHub owners and npm organizations in a local database. Upstream data is
//! pulled one page at a time by chained steps, merged into per-item detail
//! rows, and folded into an owner-level aggregate once the chain ends.
//!
//! # Features
//!
//! - `migrate` - Enables database migration support through
//!   [`connect_and_migrate`].
//! - `server` - Enables the HTTP surface for inbound star events and stats.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use popstats::sync::{LocalScheduler, SyncContext, SyncOptions, start_github_chain};
//!
//! let db = popstats::connect_and_migrate("sqlite://popstats.db?mode=rwc").await?;
//! let (scheduler, mut queue) = LocalScheduler::new();
//! let ctx = SyncContext::new(db, Arc::new(scheduler), SyncOptions::default())
//!     .with_github(github_client);
//!
//! start_github_chain(&ctx, "tanstack").await?;
//! let summary = queue.drain(&ctx, &|| false).await;
//! ```

pub mod db;
pub mod display;
pub mod entity;
pub mod github;
pub mod http;
pub mod metrics;
pub mod npm;
pub mod retry;
pub mod source;
pub mod store;
pub mod sync;

#[cfg(feature = "migrate")]
pub mod migration;

#[cfg(feature = "server")]
pub mod server;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use http::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport, header_get};
pub use metrics::{DayOfWeekAverages, Metrics, normalize_name};
pub use source::{ApiRateLimiter, DetailRecord, Page, PageSource, SourceError, rate_limits};
pub use store::StoreError;
pub use sync::SyncError;
