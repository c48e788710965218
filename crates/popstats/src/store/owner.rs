//! Owner row operations.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entity::owner::{ActiveModel, Column, Entity as Owner, Model};
use crate::entity::source_kind::SourceKind;
use crate::metrics::{Metrics, normalize_name, to_db_count};

use super::errors::{Result, StoreError};

/// Find an owner by its normalized name.
pub async fn find<C: ConnectionTrait>(db: &C, source: SourceKind, name: &str) -> Result<Option<Model>> {
    Owner::find()
        .filter(Column::Source.eq(source))
        .filter(Column::NameNormalized.eq(normalize_name(name)))
        .one(db)
        .await
        .map_err(StoreError::from)
}

/// All owners of a source, ordered by name.
pub async fn list<C: ConnectionTrait>(db: &C, source: SourceKind) -> Result<Vec<Model>> {
    Owner::find()
        .filter(Column::Source.eq(source))
        .order_by_asc(Column::NameNormalized)
        .all(db)
        .await
        .map_err(StoreError::from)
}

/// A new owner row with every counter at zero.
fn zeroed(source: SourceKind, name: &str, now: DateTime<Utc>) -> Result<ActiveModel> {
    let name_normalized = normalize_name(name);
    if name_normalized.is_empty() {
        return Err(StoreError::invalid_input("owner name must not be empty"));
    }

    let now = now.fixed_offset();
    Ok(ActiveModel {
        id: Set(Uuid::new_v4()),
        source: Set(source),
        name: Set(name.trim().to_string()),
        name_normalized: Set(name_normalized),
        star_count: Set(0),
        contributor_count: Set(0),
        dependent_count: Set(0),
        download_count: Set(0),
        day_of_week_averages: Set(Metrics::default().day_of_week_averages.to_json()),
        created_at: Set(now),
        updated_at: Set(now),
    })
}

/// Find an owner, inserting a zeroed row if it does not exist yet.
///
/// The insert skips a row another writer created first, so callers racing
/// on a new owner all get the same row back.
///
/// # Errors
/// Returns `StoreError::InvalidInput` for a blank name.
pub async fn find_or_insert<C: ConnectionTrait>(
    db: &C,
    source: SourceKind,
    name: &str,
    now: DateTime<Utc>,
) -> Result<Model> {
    if let Some(existing) = find(db, source, name).await? {
        return Ok(existing);
    }

    Owner::insert(zeroed(source, name, now)?)
        .on_conflict(
            OnConflict::columns([Column::Source, Column::NameNormalized])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    find(db, source, name).await?.ok_or_else(|| {
        StoreError::Database(DbErr::RecordNotFound(format!("{source} owner {name}")))
    })
}

/// Overwrite the aggregate counters of an owner.
pub async fn patch_metrics<C: ConnectionTrait>(
    db: &C,
    existing: Model,
    metrics: &Metrics,
    now: DateTime<Utc>,
) -> Result<Model> {
    let mut active = existing.into_active_model();
    active.star_count = Set(to_db_count(metrics.star_count));
    active.contributor_count = Set(to_db_count(metrics.contributor_count));
    active.dependent_count = Set(to_db_count(metrics.dependent_count));
    active.download_count = Set(to_db_count(metrics.download_count));
    active.day_of_week_averages = Set(metrics.day_of_week_averages.to_json());
    active.updated_at = Set(now.fixed_offset());
    active.update(db).await.map_err(StoreError::from)
}
