//! Admin runtime the store is embedded in
//!
//! The store never executes plans. It only needs the runtime to cancel a
//! stale plan, to attach live context to plans handed back as active, and
//! to say when the process is going down.

use anyhow::{bail, Result};

use crate::plan::Plan;

/// Hooks into the admin runtime that owns plan execution
pub trait PlanHost: Send + Sync {
    /// Cancel a plan so it reaches a terminal state
    ///
    /// Best-effort: the plan may already have moved on, in which case the
    /// error is ignored by the caller.
    fn cancel_plan(&self, id: u64) -> Result<()>;

    /// Attach runtime context to a plan returned by `active_plans`
    fn rehydrate(&self, _plan: &mut Plan) {}

    /// Whether the admin process is shutting down
    fn is_shutting_down(&self) -> bool {
        false
    }
}

/// Host for tooling that opens a store without an admin runtime
///
/// Cancellation is unavailable, so pruning can only reclaim plans that are
/// already terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedHost;

impl PlanHost for DetachedHost {
    fn cancel_plan(&self, id: u64) -> Result<()> {
        bail!("no admin runtime attached, cannot cancel plan {}", id)
    }
}
