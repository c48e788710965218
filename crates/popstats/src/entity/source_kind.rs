//! Upstream data source discriminator.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which upstream an owner or detail row was synchronized from.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Repositories listed by the source-hosting API.
    #[sea_orm(string_value = "github")]
    GitHub,
    /// Packages published under a registry organization.
    #[sea_orm(string_value = "npm")]
    Npm,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::GitHub => write!(f, "github"),
            SourceKind::Npm => write!(f, "npm"),
        }
    }
}
