//! Read-side queries over the plan store
//!
//! All queries skip system plans; they exist for operators, not for the
//! admin's own housekeeping.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use super::plans::PlanStore;
use crate::constants::query::MAX_RANGE_PLANS;
use crate::error::Result;
use crate::plan::Plan;

/// A logical run of plan ids selected by creation time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanIdRange {
    /// Lowest id in the run, `None` when nothing matched
    pub first_id: Option<u64>,
    pub count: usize,
}

impl PlanIdRange {
    fn include(&mut self, id: u64) {
        self.first_id = Some(self.first_id.map_or(id, |first| first.min(id)));
        self.count += 1;
    }
}

impl PlanStore {
    /// Point lookup
    pub fn get_plan_by_id(&self, txn: &Connection, id: u64) -> Result<Option<Plan>> {
        self.get(txn, id)
    }

    /// Every user plan that has not finished, rehydrated by the host
    pub fn active_plans(&self, txn: &Connection) -> Result<Vec<Plan>> {
        self.ensure_open()?;
        let mut cursor = self.plan_cursor(txn, None);
        let mut active = Vec::new();

        let mut entry = cursor.first()?;
        while let Some((_, mut plan)) = entry {
            if !plan.is_system_plan && !plan.state.is_terminal() {
                self.shared.host.rehydrate(&mut plan);
                active.push(plan);
            }
            entry = cursor.next()?;
        }
        Ok(active)
    }

    /// Find a run of user plan ids by creation time
    ///
    /// The bounds select the mode:
    /// - only `start` (or neither): scan forward for up to `how_many` plans
    ///   created at or after `start`
    /// - only `end`: scan backward for up to `how_many` plans created
    ///   strictly before `end`
    /// - both: every plan created within `[start, end]`; `how_many` is
    ///   ignored
    ///
    /// With `owner` set, only that owner's plans count.
    pub fn plan_id_range(
        &self,
        txn: &Connection,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        how_many: usize,
        owner: Option<&str>,
    ) -> Result<PlanIdRange> {
        self.ensure_open()?;
        let mut range = PlanIdRange::default();
        let mut cursor = self.plan_cursor(txn, None);
        let counts = |plan: &Plan| !plan.is_system_plan && plan.owned_by(owner);

        match (start, end) {
            (start, None) => {
                let mut entry = cursor.first()?;
                while let Some((id, plan)) = entry {
                    if range.count >= how_many {
                        break;
                    }
                    if counts(&plan) && start.map_or(true, |start| plan.create_time >= start) {
                        range.include(id);
                    }
                    entry = cursor.next()?;
                }
            }
            (None, Some(end)) => {
                let mut entry = cursor.last()?;
                while let Some((id, plan)) = entry {
                    if range.count >= how_many {
                        break;
                    }
                    if counts(&plan) && plan.create_time < end {
                        range.include(id);
                    }
                    entry = cursor.prev()?;
                }
            }
            (Some(start), Some(end)) => {
                let mut entry = cursor.first()?;
                while let Some((id, plan)) = entry {
                    if counts(&plan) && plan.create_time >= start && plan.create_time <= end {
                        range.include(id);
                    }
                    entry = cursor.next()?;
                }
            }
        }
        Ok(range)
    }

    /// Fetch user plans from `first_id` upward, stripped for display
    ///
    /// Returns at most `min(how_many, 20)` plans.
    pub fn plan_range(
        &self,
        txn: &Connection,
        first_id: u64,
        how_many: usize,
        owner: Option<&str>,
    ) -> Result<BTreeMap<u64, Plan>> {
        self.ensure_open()?;
        let limit = how_many.min(MAX_RANGE_PLANS);
        let mut plans = BTreeMap::new();
        let mut cursor = self.plan_cursor(txn, Some(first_id));

        let mut entry = cursor.first()?;
        while let Some((id, mut plan)) = entry {
            if plans.len() >= limit {
                break;
            }
            if !plan.is_system_plan && plan.owned_by(owner) {
                plan.strip();
                plans.insert(id, plan);
            }
            entry = cursor.next()?;
        }
        Ok(plans)
    }
}
