//! Hooks around pruning runs

use super::stats::PruneStats;

/// Callbacks invoked from the pruning thread
///
/// All methods default to no-ops. No transaction is open while a hook
/// runs.
pub trait PruneObserver: Send + Sync {
    /// Before the first sub-transaction of a run
    fn before_run(&self) {}

    /// After each committed sub-transaction
    fn after_scan(&self, _stats: &PruneStats) {}

    /// After reconciliation, with the final accounting
    fn after_run(&self, _stats: &PruneStats) {}
}
