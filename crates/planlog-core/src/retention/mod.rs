//! Background retention for the plan store
//!
//! A write that pushes the live-count estimate past `plan_limit + 10`
//! starts a one-shot pruning thread. The run:
//! - removes finished system plans unconditionally
//! - removes the oldest finished plans, one age window at a time
//! - cancels stale plans that are still waiting to run when a window
//!   cannot free enough room, then sweeps that window again
//! - resets the estimate to the exact count before exiting
//!
//! At most one run is alive per store. Runs poll a stop flag between rows,
//! so `close()` never interrupts a sub-transaction.

mod observer;
mod pruner;
mod stats;


pub use observer::PruneObserver;
pub use stats::{PruneStats, SkippedPlan};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{error, warn};

use crate::constants::retention::JOIN_POLL_INTERVAL;
use crate::storage::PlanStore;
use pruner::Pruner;

/// Handle to a pruning thread
pub(crate) struct PrunerHandle {
    shutdown: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl PrunerHandle {
    fn is_alive(&self) -> bool {
        !self.thread.is_finished()
    }

    fn join(self) {
        if self.thread.join().is_err() {
            error!("Plan pruning thread panicked");
        }
    }
}

impl PlanStore {
    /// Start a pruning run unless one is already alive
    ///
    /// Returns whether a new run was started. Writes call this when the
    /// estimate crosses the trigger; it can also be called directly.
    pub fn start_pruning(&self) -> bool {
        if self.is_closed() {
            return false;
        }

        let mut slot = self.pruner.lock();
        if slot.as_ref().is_some_and(PrunerHandle::is_alive) {
            return false;
        }
        if let Some(finished) = slot.take() {
            finished.join();
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let pruner = Pruner::new(Arc::clone(&self.shared), Arc::clone(&shutdown));
        match std::thread::Builder::new()
            .name("plan-pruner".into())
            .spawn(move || pruner.run())
        {
            Ok(thread) => {
                *slot = Some(PrunerHandle { shutdown, thread });
                true
            }
            Err(e) => {
                warn!("Failed to spawn plan pruning thread: {}", e);
                false
            }
        }
    }

    /// Whether a pruning run is alive
    pub fn is_pruning(&self) -> bool {
        self.pruner.lock().as_ref().is_some_and(PrunerHandle::is_alive)
    }

    /// Wait up to `timeout` for the current run to exit
    ///
    /// Returns true when no run is alive afterwards.
    pub fn await_pruning(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut slot = self.pruner.lock();
                if !slot.as_ref().is_some_and(PrunerHandle::is_alive) {
                    if let Some(finished) = slot.take() {
                        finished.join();
                    }
                    return true;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(JOIN_POLL_INTERVAL);
        }
    }

    /// Ask the current run to stop and wait up to `wait` for it
    pub(crate) fn stop_pruning(&self, wait: Duration) {
        if let Some(handle) = self.pruner.lock().as_ref() {
            handle.shutdown.store(true, Ordering::SeqCst);
        }
        if !self.await_pruning(wait) {
            warn!("Plan pruning still running after {:?}, detaching", wait);
        }
    }
}
