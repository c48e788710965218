//! Keyed store operations over owner and detail rows.
//!
//! All functions are generic over [`sea_orm::ConnectionTrait`] so they run
//! equally against a pooled connection or inside a transaction. Callers that
//! need a read-modify-write to be atomic open a transaction and pass it in.

mod errors;

pub mod detail;
pub mod owner;

pub use errors::{Result, StoreError};
