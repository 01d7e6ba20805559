//! One pruning run
//!
//! Every scan below walks plans in id order through short sub-transactions
//! of at most `max_per_scan` rows. Ids are treated as a proxy for age: a
//! windowed scan stops at the first plan newer than the window cutoff even
//! though concurrent writers may have committed ids out of order.

use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration as TimeDelta, Utc};
use tracing::{debug, error, info, warn};

use super::stats::{PruneStats, SkippedPlan};
use crate::constants::storage::PLANS_TABLE;
use crate::error::Result;
use crate::plan::Plan;
use crate::storage::{Cursor, StoreShared};

/// What a scan is looking for
#[derive(Debug, Clone, Copy)]
enum Pass {
    /// Finished system plans of any age
    System,
    /// Finished plans created at or before the cutoff
    Terminal { cutoff: DateTime<Utc> },
    /// Cancelable user plans created at or before the cutoff
    Escalate { cutoff: DateTime<Utc> },
}

impl Pass {
    fn cutoff(self) -> Option<DateTime<Utc>> {
        match self {
            Pass::System => None,
            Pass::Terminal { cutoff } | Pass::Escalate { cutoff } => Some(cutoff),
        }
    }
}

/// Result of one sub-transaction
#[derive(Default)]
struct Chunk {
    first_scanned: Option<u64>,
    pruned: Vec<u64>,
    skipped: Vec<SkippedPlan>,
    /// Plans picked for cancellation
    to_cancel: Vec<u64>,
    /// Where the next sub-transaction resumes; `None` when the scan is done
    resume_from: Option<u64>,
}

pub(crate) struct Pruner {
    shared: Arc<StoreShared>,
    shutdown: Arc<AtomicBool>,
    stats: PruneStats,
    /// Plans already counted as skipped; every window rescans them
    skipped_ids: BTreeSet<u64>,
}

impl Pruner {
    pub(crate) fn new(shared: Arc<StoreShared>, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            shared,
            shutdown,
            stats: PruneStats::default(),
            skipped_ids: BTreeSet::new(),
        }
    }

    /// Run to completion, then reconcile the live-count estimate
    pub(crate) fn run(mut self) {
        info!(
            "Plan pruning started: estimate {}, limit {}",
            self.shared.estimate.load(Ordering::SeqCst),
            self.shared.config.plan_limit
        );
        if let Some(observer) = &self.shared.observer {
            observer.before_run();
        }

        match catch_unwind(AssertUnwindSafe(|| self.prune())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Plan pruning aborted: {}", e),
            Err(_) => error!("Plan pruning panicked"),
        }

        self.reconcile();

        let summary = self.stats.to_string();
        info!("Plan pruning finished: {}", summary);
        *self.shared.latest_pruning.lock() = Some(summary);
        if let Some(observer) = &self.shared.observer {
            observer.after_run(&self.stats);
        }
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
            || self.shared.closed.load(Ordering::SeqCst)
            || self.shared.host.is_shutting_down()
    }

    fn reconcile(&self) {
        match self.shared.count() {
            Ok(count) => self.shared.estimate.store(count as i64, Ordering::SeqCst),
            Err(e) => warn!("Failed to reconcile plan count after pruning: {}", e),
        }
    }

    fn prune(&mut self) -> Result<()> {
        self.sweep(Pass::System, u64::MAX)?;

        let limit = self.shared.config.plan_limit as i64;
        let mut excess = self.shared.estimate.load(Ordering::SeqCst) - limit;

        for window_ms in self.shared.config.age_windows_ms.clone() {
            if excess <= 0 || self.stopping() {
                break;
            }
            // A window older than the clock can represent holds nothing
            let Some(cutoff) = Utc::now().checked_sub_signed(TimeDelta::milliseconds(
                i64::try_from(window_ms).unwrap_or(i64::MAX),
            )) else {
                continue;
            };

            excess -= self.sweep(Pass::Terminal { cutoff }, excess as u64)? as i64;
            if excess <= 0 || self.stopping() {
                break;
            }

            let canceled = self.escalate(cutoff, excess as u64)?;
            if canceled > 0 {
                excess -= self.sweep(Pass::Terminal { cutoff }, excess as u64)? as i64;
            }
        }
        Ok(())
    }

    /// Scan from the lowest id, removing up to `target` plans
    fn sweep(&mut self, pass: Pass, target: u64) -> Result<u64> {
        let mut removed = 0;
        let mut next_id = 1;

        while removed < target && !self.stopping() {
            let chunk = match self.scan_chunk(pass, next_id, target - removed) {
                Ok(chunk) => chunk,
                Err(e) if e.is_transient() => {
                    debug!("Plan pruning hit a store conflict, retrying next pass: {}", e);
                    break;
                }
                Err(e) => return Err(e),
            };

            removed += chunk.pruned.len() as u64;
            self.shared
                .estimate
                .fetch_sub(chunk.pruned.len() as i64, Ordering::SeqCst);
            self.record(&chunk);

            match chunk.resume_from {
                Some(id) => next_id = id,
                None => break,
            }
        }
        Ok(removed)
    }

    /// Cancel up to `target` stale plans that are still waiting to run
    fn escalate(&mut self, cutoff: DateTime<Utc>, target: u64) -> Result<u64> {
        let mut canceled = 0;
        let mut attempted = 0;
        let mut next_id = 1;

        while attempted < target && !self.stopping() {
            let chunk = match self.scan_chunk(Pass::Escalate { cutoff }, next_id, target - attempted)
            {
                Ok(chunk) => chunk,
                Err(e) if e.is_transient() => {
                    debug!("Plan escalation hit a store conflict, retrying next pass: {}", e);
                    break;
                }
                Err(e) => return Err(e),
            };
            self.record(&chunk);

            // Outside any transaction: cancellation writes through the store
            for id in &chunk.to_cancel {
                attempted += 1;
                match self.shared.host.cancel_plan(*id) {
                    Ok(()) => {
                        canceled += 1;
                        self.stats.canceled += 1;
                    }
                    Err(e) => debug!("Cancel of stale plan {} failed: {}", id, e),
                }
            }

            match chunk.resume_from {
                Some(id) => next_id = id,
                None => break,
            }
        }

        if canceled > 0 {
            info!("Canceled {} stale plans before {}", canceled, cutoff.to_rfc3339());
        }
        Ok(canceled)
    }

    fn record(&mut self, chunk: &Chunk) {
        if let Some(id) = chunk.first_scanned {
            self.stats.note_scanned(id);
        }
        for id in &chunk.pruned {
            self.stats.note_pruned(*id);
        }
        for skipped in &chunk.skipped {
            if self.skipped_ids.insert(skipped.id) {
                self.stats.note_skipped(skipped.clone());
            }
        }
        if let Some(observer) = &self.shared.observer {
            observer.after_scan(&self.stats);
        }
    }

    /// One bounded sub-transaction starting at `from_id`
    ///
    /// Accounting is only returned once the transaction has committed.
    fn scan_chunk(&self, pass: Pass, from_id: u64, target: u64) -> Result<Chunk> {
        let max_rows = self.shared.config.max_per_scan;
        let mut chunk = Chunk::default();

        let mut db = self.shared.db.lock();
        let txn = db.conn_mut().transaction()?;
        {
            let mut cursor = Cursor::open(&txn, PLANS_TABLE, Plan::decode, Some(from_id));
            let mut scanned = 0;
            let mut entry = cursor.first()?;

            while let Some((id, plan)) = entry {
                if self.stopping() {
                    break;
                }
                if scanned >= max_rows {
                    chunk.resume_from = Some(id);
                    break;
                }
                scanned += 1;
                chunk.first_scanned.get_or_insert(id);

                if pass.cutoff().is_some_and(|cutoff| plan.create_time > cutoff) {
                    break;
                }

                match pass {
                    Pass::System => {
                        if plan.is_system_plan
                            && plan.state.is_terminal()
                            && cursor.delete_at_cursor()?
                        {
                            chunk.pruned.push(id);
                        }
                    }
                    Pass::Terminal { .. } => {
                        if !plan.state.is_terminal() {
                            chunk.skipped.push(SkippedPlan::from(&plan));
                        } else if cursor.delete_at_cursor()? {
                            chunk.pruned.push(id);
                        }
                    }
                    Pass::Escalate { .. } => {
                        if !plan.is_system_plan && plan.state.is_cancelable() {
                            chunk.to_cancel.push(id);
                        }
                    }
                }

                let found = chunk.pruned.len() + chunk.to_cancel.len();
                if found as u64 >= target {
                    break;
                }
                entry = cursor.next()?;
            }
        }
        txn.commit()?;
        Ok(chunk)
    }
}
