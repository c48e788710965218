//! Owner aggregates recomputed from their detail rows.

use chrono::{DateTime, Utc};
use sea_orm::TransactionTrait;
use tracing::debug;

use crate::entity::detail::Model as DetailModel;
use crate::entity::owner::Model as OwnerModel;
use crate::entity::source_kind::SourceKind;
use crate::metrics::Metrics;
use crate::retry::with_store_retry;
use crate::store::{StoreError, detail, owner};

/// An owner row after recomputation.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub owner: OwnerModel,
    /// Number of detail rows summed into it.
    pub details: usize,
}

/// Sum every detail row of `name` into its owner row.
///
/// The owner is inserted with zeroed counters when missing. Running this
/// any number of times over the same details yields the same row, and the
/// row is only written when a sum changed. A transaction that loses a race
/// with another writer runs again, so the last one to commit has summed
/// every committed detail.
pub async fn recompute_owner<C: TransactionTrait>(
    db: &C,
    source: SourceKind,
    name: &str,
    now: DateTime<Utc>,
) -> Result<Aggregate, StoreError> {
    with_store_retry(|| recompute_owner_once(db, source, name, now), name).await
}

async fn recompute_owner_once<C: TransactionTrait>(
    db: &C,
    source: SourceKind,
    name: &str,
    now: DateTime<Utc>,
) -> Result<Aggregate, StoreError> {
    let txn = db.begin().await?;

    let existing = owner::find_or_insert(&txn, source, name, now).await?;
    let details = detail::list_for_owner(&txn, source, name).await?;
    let totals: Metrics = details.iter().map(DetailModel::metrics).sum();

    let updated = if existing.metrics() == totals {
        existing
    } else {
        owner::patch_metrics(&txn, existing, &totals, now).await?
    };

    txn.commit().await?;
    debug!(%source, owner = %updated.name, details = details.len(), "recomputed aggregate");

    Ok(Aggregate {
        owner: updated,
        details: details.len(),
    })
}

#[cfg(all(test, feature = "sqlite", feature = "migrate"))]
mod tests {
    use sea_orm::DatabaseConnection;

    use super::*;
    use crate::connect_and_migrate;
    use crate::metrics::DayOfWeekAverages;

    async fn setup_db() -> DatabaseConnection {
        connect_and_migrate("sqlite::memory:")
            .await
            .expect("test db should migrate")
    }

    #[tokio::test]
    async fn owner_without_details_is_zeroed() {
        let db = setup_db().await;

        let aggregate = recompute_owner(&db, SourceKind::GitHub, "ghost", Utc::now())
            .await
            .expect("recompute");
        assert_eq!(aggregate.details, 0);
        assert_eq!(aggregate.owner.metrics(), Metrics::default());
    }

    #[tokio::test]
    async fn sums_details_of_one_owner_and_source_only() {
        let db = setup_db().await;
        let now = Utc::now();

        for (name, stars, contributors) in [("query", 10, 4), ("router", 5, 2)] {
            detail::insert(
                &db,
                SourceKind::GitHub,
                "tanstack",
                name,
                &Metrics::repository(stars, contributors, 1),
                now,
            )
            .await
            .expect("insert");
        }
        detail::insert(&db, SourceKind::GitHub, "other", "x", &Metrics::repository(99, 9, 9), now)
            .await
            .expect("insert other");
        detail::insert(
            &db,
            SourceKind::Npm,
            "tanstack",
            "@tanstack/query-core",
            &Metrics::package(1000, DayOfWeekAverages([1; 7])),
            now,
        )
        .await
        .expect("insert npm");

        let github = recompute_owner(&db, SourceKind::GitHub, "TanStack", now)
            .await
            .expect("recompute");
        assert_eq!(github.details, 2);
        assert_eq!(github.owner.metrics(), Metrics::repository(15, 6, 2));

        let npm = recompute_owner(&db, SourceKind::Npm, "tanstack", now)
            .await
            .expect("recompute npm");
        assert_eq!(npm.owner.metrics().download_count, 1000);
        assert_eq!(npm.owner.metrics().day_of_week_averages, DayOfWeekAverages([1; 7]));
    }

    #[tokio::test]
    async fn repeated_recompute_converges_without_rewrites() {
        let db = setup_db().await;
        let now = Utc::now();
        detail::insert(&db, SourceKind::GitHub, "tanstack", "query", &Metrics::repository(3, 0, 0), now)
            .await
            .expect("insert");

        let first = recompute_owner(&db, SourceKind::GitHub, "tanstack", now)
            .await
            .expect("first");
        let second = recompute_owner(&db, SourceKind::GitHub, "tanstack", now + chrono::Duration::hours(1))
            .await
            .expect("second");

        assert_eq!(first.owner.id, second.owner.id);
        assert_eq!(first.owner.updated_at, second.owner.updated_at);
        assert_eq!(second.owner.metrics().star_count, 3);
    }
}
