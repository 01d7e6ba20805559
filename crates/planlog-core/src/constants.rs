//! Store constants and configuration defaults
//!
//! Centralized location for magic numbers and default values

use std::time::Duration;

/// Retention configuration
pub mod retention {
    use super::*;

    /// Capacity whose excess triggers pruning
    pub const DEFAULT_PLAN_LIMIT: u64 = 1000;

    /// Estimate must exceed `plan_limit` by more than this before a run starts
    pub const PRUNE_TRIGGER_SLACK: u64 = 10;

    /// Rows visited per pruning sub-transaction
    pub const DEFAULT_MAX_PER_SCAN: usize = 100;

    /// Age windows in descending order: one hour, ten minutes, no floor
    pub const DEFAULT_AGE_WINDOWS_MS: [u64; 3] = [3_600_000, 600_000, 0];

    /// How long `close()` waits for an active run to notice shutdown
    pub const DEFAULT_SHUTDOWN_WAIT: Duration = Duration::from_millis(500);

    /// Poll interval while waiting on a pruning thread
    pub const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);
}

/// Query configuration
pub mod query {
    /// Hard cap on entries returned by a single range fetch
    pub const MAX_RANGE_PLANS: usize = 20;
}

/// Storage configuration
pub mod storage {
    use super::*;

    /// Table holding serialized plans keyed by id
    pub const PLANS_TABLE: &str = "plans";

    /// SQLite busy timeout for lock contention
    pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
}
