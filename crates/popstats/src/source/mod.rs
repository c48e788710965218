//! Upstream page sources.
//!
//! A [`PageSource`] yields one page of listed items per cursor and resolves
//! each listed item into a full [`DetailRecord`]. The GitHub repository
//! listing and the npm organization listing are the two implementations.

mod errors;
mod rate_limit;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entity::source_kind::SourceKind;
use crate::metrics::Metrics;

pub use errors::{Result, SourceError, short_error_message};
pub use rate_limit::{ApiRateLimiter, rate_limits};

/// One page of listed items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// The cursor this page was fetched with (1-based).
    pub cursor: u32,
    pub items: Vec<T>,
    /// Whether a page at `cursor + 1` should be fetched.
    pub has_more: bool,
}

impl<T> Page<T> {
    /// A page that ends pagination.
    pub fn terminal(cursor: u32) -> Self {
        Self {
            cursor,
            items: Vec::new(),
            has_more: false,
        }
    }

    /// Whether pagination stops here without any items to process.
    pub fn is_terminal(&self) -> bool {
        self.items.is_empty()
    }
}

/// A fully resolved item, ready to merge into the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub source: SourceKind,
    pub owner: String,
    pub name: String,
    pub metrics: Metrics,
}

impl DetailRecord {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Capability shared by every paginated upstream.
///
/// Implementations are bound to a single owner; the cursor is the only
/// state that varies between calls.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// A listed item before detail resolution.
    type Item: Send + 'static;

    fn source_kind(&self) -> SourceKind;

    /// The owner or organization this source lists.
    fn owner(&self) -> &str;

    /// Fetch the page at `cursor` (1-based).
    async fn fetch_page(&self, cursor: u32) -> Result<Page<Self::Item>>;

    /// Display name of a listed item, used in progress and logs.
    fn item_name(item: &Self::Item) -> String;

    /// Resolve a listed item into its full record.
    async fn resolve_detail(&self, item: Self::Item) -> Result<DetailRecord>;
}
