//! Inbound star-count changes.

use chrono::{DateTime, Utc};
use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::entity::source_kind::SourceKind;
use crate::github::RepositoryEventPayload;
use crate::metrics::Metrics;
use crate::source::DetailRecord;
use crate::store::StoreError;

use super::aggregate::{Aggregate, recompute_owner};
use super::upsert::{MergeOutcome, merge_detail};

/// A repository's star count changed upstream.
///
/// Signature verification happens before an event reaches this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarCountChanged {
    pub owner: String,
    pub item: String,
    pub star_count: u64,
}

impl From<RepositoryEventPayload> for StarCountChanged {
    fn from(payload: RepositoryEventPayload) -> Self {
        Self {
            owner: payload.repository.owner.login,
            item: payload.repository.name,
            star_count: payload.repository.stargazers_count,
        }
    }
}

/// Result of applying a star event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventOutcome {
    pub merge: MergeOutcome,
    pub aggregate: Aggregate,
}

/// Apply a star change to its repository row, then recompute the owner.
///
/// The change merges like a freshly listed repository whose scraped
/// counters are unresolved, so stored contributor and dependent counts
/// survive. An unknown repository is inserted.
pub async fn apply_star_change<C: TransactionTrait>(
    db: &C,
    event: &StarCountChanged,
    now: DateTime<Utc>,
) -> Result<EventOutcome, StoreError> {
    let record = DetailRecord {
        source: SourceKind::GitHub,
        owner: event.owner.clone(),
        name: event.item.clone(),
        metrics: Metrics::repository(event.star_count, 0, 0),
    };

    let merge = merge_detail(db, &record, now).await?;
    let aggregate = recompute_owner(db, SourceKind::GitHub, &event.owner, now).await?;

    info!(
        owner = %event.owner,
        item = %event.item,
        stars = event.star_count,
        ?merge,
        "applied star change"
    );
    Ok(EventOutcome { merge, aggregate })
}
