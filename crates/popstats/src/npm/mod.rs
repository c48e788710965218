//! npm organization listing and package download statistics.

pub mod client;
pub mod downloads;
pub mod error;
pub mod source;
pub mod types;

pub use client::{NPM_DOWNLOADS_URL, NPM_WEBSITE_URL, NpmClient};
pub use downloads::{day_of_week_averages, lifetime_downloads, weekday_averages};
pub use error::{NpmError, is_rate_limit_error, short_error_message};
pub use source::NpmPackageSource;
pub use types::{DownloadRange, NpmPackage, OrgListingResponse};
