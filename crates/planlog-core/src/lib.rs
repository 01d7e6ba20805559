//! planlog core - bounded plan storage for a cluster admin service
//!
//! This crate provides:
//! - A crash-consistent plan record store over SQLite
//! - Resumable ordered cursors and plan queries
//! - Background retention that keeps the store near its configured limit
//!
//! ```no_run
//! use std::sync::Arc;
//! use planlog_core::{Database, DetachedHost, Plan, PlanStore, PlanStoreConfig};
//!
//! # fn main() -> planlog_core::Result<()> {
//! let db = Database::new(std::path::Path::new("plans.db"))?.into_shared();
//! let store = PlanStore::open(db, PlanStoreConfig::default(), Arc::new(DetachedHost))?;
//! store.with_transaction(|txn| store.put(txn, &Plan::new(1, "deploy")))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod host;
pub mod plan;
pub mod retention;
pub mod storage;

// Re-exports for convenience
pub use config::PlanStoreConfig;
pub use error::{Error, Result};
pub use host::{DetachedHost, PlanHost};
pub use plan::{Plan, PlanState};
pub use retention::{PruneObserver, PruneStats};
pub use storage::{Database, PlanIdRange, PlanStore, SharedDatabase};
