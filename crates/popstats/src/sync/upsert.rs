//! Diffing merge of resolved records into the detail store.

use chrono::{DateTime, Utc};
use sea_orm::TransactionTrait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::retry::with_store_retry;
use crate::source::DetailRecord;
use crate::store::{StoreError, detail};

use super::types::MergeReport;

/// What a single merge did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeOutcome {
    Inserted,
    Patched,
    Unchanged,
}

impl std::fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeOutcome::Inserted => write!(f, "inserted"),
            MergeOutcome::Patched => write!(f, "patched"),
            MergeOutcome::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Merge one record into its detail row.
///
/// The read and the write share a transaction. A new key is inserted; an
/// existing row is patched with [`Metrics::merge_fresh`] and left untouched
/// when that yields the stored values.
///
/// A transaction that loses a race with a concurrent writer of the same key
/// runs again from the read.
///
/// [`Metrics::merge_fresh`]: crate::metrics::Metrics::merge_fresh
pub async fn merge_detail<C: TransactionTrait>(
    db: &C,
    record: &DetailRecord,
    now: DateTime<Utc>,
) -> Result<MergeOutcome, StoreError> {
    let label = format!("{}/{}", record.owner, record.name);
    with_store_retry(|| merge_detail_once(db, record, now), &label).await
}

async fn merge_detail_once<C: TransactionTrait>(
    db: &C,
    record: &DetailRecord,
    now: DateTime<Utc>,
) -> Result<MergeOutcome, StoreError> {
    let txn = db.begin().await?;

    let outcome = match detail::find(&txn, record.source, &record.owner, &record.name).await? {
        None => {
            detail::insert(
                &txn,
                record.source,
                &record.owner,
                &record.name,
                &record.metrics,
                now,
            )
            .await?;
            MergeOutcome::Inserted
        }
        Some(existing) => {
            let current = existing.metrics();
            let merged = current.merge_fresh(&record.metrics);
            if merged == current {
                MergeOutcome::Unchanged
            } else {
                detail::patch_metrics(&txn, existing, &merged, now).await?;
                MergeOutcome::Patched
            }
        }
    };

    txn.commit().await?;
    debug!(owner = %record.owner, item = %record.name, ?outcome, "merged detail");
    Ok(outcome)
}

/// Merge a page of records, isolating failures per record.
pub async fn merge_batch<C: TransactionTrait>(
    db: &C,
    records: &[DetailRecord],
    now: DateTime<Utc>,
) -> MergeReport {
    let mut report = MergeReport::default();

    for record in records {
        match merge_detail(db, record, now).await {
            Ok(MergeOutcome::Inserted) => report.inserted += 1,
            Ok(MergeOutcome::Patched) => report.patched += 1,
            Ok(MergeOutcome::Unchanged) => report.unchanged += 1,
            Err(e) => {
                warn!(owner = %record.owner, item = %record.name, error = %e, "failed to merge detail");
                report.errors.push((record.name.clone(), e.to_string()));
            }
        }
    }

    report
}
