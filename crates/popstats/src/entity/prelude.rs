//! Common re-exports for convenient entity usage.

pub use super::detail::{
    ActiveModel as DetailActiveModel, Column as DetailColumn, Entity as Detail,
    Model as DetailModel,
};
pub use super::owner::{
    ActiveModel as OwnerActiveModel, Column as OwnerColumn, Entity as Owner, Model as OwnerModel,
};
pub use super::source_kind::SourceKind;
