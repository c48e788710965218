//! SeaORM entity definitions for the popstats database schema.

pub mod detail;
pub mod owner;
pub mod prelude;
pub mod source_kind;
