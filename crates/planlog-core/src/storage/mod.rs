//! Persistence layer
//!
//! SQLite-based storage for:
//! - Plan records keyed by plan id
//! - Ordered cursors over integer-keyed tables
//! - Point and range queries over plans

mod cursor;
mod database;
mod plans;
mod query;

#[cfg(test)]
mod database_tests;

pub use cursor::{Cursor, Decoder};
pub use database::{Database, SharedDatabase};
pub use plans::PlanStore;
pub use query::PlanIdRange;

pub(crate) use plans::StoreShared;
