//! Owner entity - the aggregate row for a GitHub owner or npm organization.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::source_kind::SourceKind;
use crate::metrics::{DayOfWeekAverages, Metrics, from_db_count};

/// Owner model.
///
/// Every counter is the sum of the owner's detail rows as of the last
/// aggregate recompute. Nothing writes these columns directly.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "owners")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // ─── Identity ────────────────────────────────────────────────────────────
    pub source: SourceKind,
    /// Name as first observed upstream.
    pub name: String,
    /// Lookup key, see [`crate::metrics::normalize_name`].
    pub name_normalized: String,

    // ─── Aggregates ──────────────────────────────────────────────────────────
    pub star_count: i64,
    pub contributor_count: i64,
    pub dependent_count: i64,
    pub download_count: i64,
    /// Seven-element JSON array, Sunday first.
    #[sea_orm(column_type = "Json")]
    pub day_of_week_averages: serde_json::Value,

    // ─── Tracking ────────────────────────────────────────────────────────────
    pub created_at: DateTimeWithTimeZone,
    /// When the aggregate last changed.
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// The aggregate counters as domain metrics.
    pub fn metrics(&self) -> Metrics {
        Metrics {
            star_count: from_db_count(self.star_count),
            contributor_count: from_db_count(self.contributor_count),
            dependent_count: from_db_count(self.dependent_count),
            download_count: from_db_count(self.download_count),
            day_of_week_averages: DayOfWeekAverages::from_json(&self.day_of_week_averages),
        }
    }
}
