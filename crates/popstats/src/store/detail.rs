//! Detail row operations.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entity::detail::{ActiveModel, Column, Entity as Detail, Model};
use crate::entity::source_kind::SourceKind;
use crate::metrics::{Metrics, normalize_name, to_db_count};

use super::errors::{Result, StoreError};

/// Find a detail row by its composite key.
pub async fn find<C: ConnectionTrait>(
    db: &C,
    source: SourceKind,
    owner: &str,
    name: &str,
) -> Result<Option<Model>> {
    Detail::find()
        .filter(Column::Source.eq(source))
        .filter(Column::OwnerNormalized.eq(normalize_name(owner)))
        .filter(Column::NameNormalized.eq(normalize_name(name)))
        .one(db)
        .await
        .map_err(StoreError::from)
}

/// All detail rows belonging to an owner, ordered by name.
pub async fn list_for_owner<C: ConnectionTrait>(
    db: &C,
    source: SourceKind,
    owner: &str,
) -> Result<Vec<Model>> {
    Detail::find()
        .filter(Column::Source.eq(source))
        .filter(Column::OwnerNormalized.eq(normalize_name(owner)))
        .order_by_asc(Column::NameNormalized)
        .all(db)
        .await
        .map_err(StoreError::from)
}

/// Insert a new detail row.
///
/// # Errors
/// Returns `StoreError::InvalidInput` for a blank owner or name and
/// `StoreError::Database` on a natural key conflict.
pub async fn insert<C: ConnectionTrait>(
    db: &C,
    source: SourceKind,
    owner: &str,
    name: &str,
    metrics: &Metrics,
    now: DateTime<Utc>,
) -> Result<Model> {
    let owner_normalized = normalize_name(owner);
    let name_normalized = normalize_name(name);
    if owner_normalized.is_empty() || name_normalized.is_empty() {
        return Err(StoreError::invalid_input(format!(
            "detail key must not be empty: {owner:?}/{name:?}"
        )));
    }

    let now = now.fixed_offset();
    ActiveModel {
        id: Set(Uuid::new_v4()),
        source: Set(source),
        owner: Set(owner.trim().to_string()),
        owner_normalized: Set(owner_normalized),
        name: Set(name.trim().to_string()),
        name_normalized: Set(name_normalized),
        star_count: Set(to_db_count(metrics.star_count)),
        contributor_count: Set(to_db_count(metrics.contributor_count)),
        dependent_count: Set(to_db_count(metrics.dependent_count)),
        download_count: Set(to_db_count(metrics.download_count)),
        day_of_week_averages: Set(metrics.day_of_week_averages.to_json()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .map_err(StoreError::from)
}

/// Patch only the counters that differ from the stored row.
///
/// Returns the stored row untouched when nothing differs, so `updated_at`
/// only moves on a real change.
pub async fn patch_metrics<C: ConnectionTrait>(
    db: &C,
    existing: Model,
    metrics: &Metrics,
    now: DateTime<Utc>,
) -> Result<Model> {
    let current = existing.metrics();
    if current == *metrics {
        return Ok(existing);
    }

    let mut active = existing.into_active_model();
    if current.star_count != metrics.star_count {
        active.star_count = Set(to_db_count(metrics.star_count));
    }
    if current.contributor_count != metrics.contributor_count {
        active.contributor_count = Set(to_db_count(metrics.contributor_count));
    }
    if current.dependent_count != metrics.dependent_count {
        active.dependent_count = Set(to_db_count(metrics.dependent_count));
    }
    if current.download_count != metrics.download_count {
        active.download_count = Set(to_db_count(metrics.download_count));
    }
    if current.day_of_week_averages != metrics.day_of_week_averages {
        active.day_of_week_averages = Set(metrics.day_of_week_averages.to_json());
    }
    active.updated_at = Set(now.fixed_offset());
    active.update(db).await.map_err(StoreError::from)
}

#[cfg(all(test, feature = "sqlite", feature = "migrate"))]
mod tests {
    use chrono::Duration;
    use sea_orm::DatabaseConnection;

    use super::*;
    use crate::connect_and_migrate;

    async fn setup_db() -> DatabaseConnection {
        connect_and_migrate("sqlite::memory:")
            .await
            .expect("test db should migrate")
    }

    #[tokio::test]
    async fn insert_then_find_by_case_insensitive_key() {
        let db = setup_db().await;
        let metrics = Metrics::repository(42, 3, 1);

        let inserted = insert(&db, SourceKind::GitHub, "TanStack", "Query", &metrics, Utc::now())
            .await
            .expect("insert");
        let found = find(&db, SourceKind::GitHub, "tanstack", "QUERY")
            .await
            .expect("find")
            .expect("row exists");

        assert_eq!(inserted.id, found.id);
        assert_eq!(found.full_name(), "TanStack/Query");
        assert_eq!(found.metrics(), metrics);
    }

    #[tokio::test]
    async fn list_for_owner_only_returns_that_owners_rows() {
        let db = setup_db().await;
        let now = Utc::now();
        for (owner, name) in [("tanstack", "query"), ("tanstack", "router"), ("other", "query")] {
            insert(&db, SourceKind::GitHub, owner, name, &Metrics::default(), now)
                .await
                .expect("insert");
        }
        insert(&db, SourceKind::Npm, "tanstack", "@tanstack/query-core", &Metrics::default(), now)
            .await
            .expect("insert npm");

        let rows = list_for_owner(&db, SourceKind::GitHub, "TanStack")
            .await
            .expect("list");
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["query", "router"]);
    }

    #[tokio::test]
    async fn patch_metrics_is_a_noop_for_identical_values() {
        let db = setup_db().await;
        let created = Utc::now() - Duration::hours(3);
        let metrics = Metrics::repository(5, 5, 5);
        let row = insert(&db, SourceKind::GitHub, "o", "r", &metrics, created)
            .await
            .expect("insert");

        let same = patch_metrics(&db, row.clone(), &metrics, Utc::now())
            .await
            .expect("noop patch");
        assert_eq!(same.updated_at, row.updated_at);

        let changed = patch_metrics(&db, row.clone(), &Metrics::repository(6, 5, 5), Utc::now())
            .await
            .expect("patch");
        assert_eq!(changed.star_count, 6);
        assert!(changed.updated_at > row.updated_at);
    }
}
