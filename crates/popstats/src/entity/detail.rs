//! Detail entity - one repository or package belonging to an owner.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::source_kind::SourceKind;
use crate::metrics::{DayOfWeekAverages, Metrics, from_db_count};

/// Detail model, unique on `(source, owner_normalized, name_normalized)`.
///
/// Rows are created the first time an item is listed and patched in place
/// afterwards. Items that disappear upstream are left alone.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "details")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // ─── Identity ────────────────────────────────────────────────────────────
    pub source: SourceKind,
    pub owner: String,
    pub owner_normalized: String,
    /// Repository name or package name (scoped packages keep their `@scope/`).
    pub name: String,
    pub name_normalized: String,

    // ─── Counters ────────────────────────────────────────────────────────────
    pub star_count: i64,
    pub contributor_count: i64,
    pub dependent_count: i64,
    pub download_count: i64,
    #[sea_orm(column_type = "Json")]
    pub day_of_week_averages: serde_json::Value,

    // ─── Tracking ────────────────────────────────────────────────────────────
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn metrics(&self) -> Metrics {
        Metrics {
            star_count: from_db_count(self.star_count),
            contributor_count: from_db_count(self.contributor_count),
            dependent_count: from_db_count(self.dependent_count),
            download_count: from_db_count(self.download_count),
            day_of_week_averages: DayOfWeekAverages::from_json(&self.day_of_week_averages),
        }
    }

    /// Compute the full name (owner/name).
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}
