//! Pruning run accounting

use chrono::{DateTime, Utc};

use crate::plan::{Plan, PlanState};

/// First plan a run had to leave in place, kept for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPlan {
    pub id: u64,
    pub state: PlanState,
    pub create_time: DateTime<Utc>,
}

impl From<&Plan> for SkippedPlan {
    fn from(plan: &Plan) -> Self {
        Self {
            id: plan.id,
            state: plan.state,
            create_time: plan.create_time,
        }
    }
}

/// Counters collected over one pruning run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruneStats {
    pub pruned: u64,
    pub first_scanned_id: Option<u64>,
    pub first_pruned_id: Option<u64>,
    pub last_pruned_id: Option<u64>,
    /// Distinct stale plans left alone because they were not terminal
    pub skipped: u64,
    pub first_skipped: Option<SkippedPlan>,
    /// Plans escalation managed to cancel
    pub canceled: u64,
}

impl PruneStats {
    pub(crate) fn note_scanned(&mut self, id: u64) {
        self.first_scanned_id.get_or_insert(id);
    }

    pub(crate) fn note_pruned(&mut self, id: u64) {
        self.pruned += 1;
        self.first_pruned_id.get_or_insert(id);
        self.last_pruned_id = Some(id);
    }

    pub(crate) fn note_skipped(&mut self, plan: SkippedPlan) {
        self.skipped += 1;
        if self.first_skipped.is_none() {
            self.first_skipped = Some(plan);
        }
    }
}

fn id_or_dash(id: Option<u64>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

impl std::fmt::Display for PruneStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pruned {} plans (first id {}, last id {}), first scanned id {}, canceled {}, skipped {}",
            self.pruned,
            id_or_dash(self.first_pruned_id),
            id_or_dash(self.last_pruned_id),
            id_or_dash(self.first_scanned_id),
            self.canceled,
            self.skipped,
        )?;
        if let Some(skipped) = &self.first_skipped {
            write!(
                f,
                " (first skipped plan {} in state {} created {})",
                skipped.id,
                skipped.state,
                skipped.create_time.to_rfc3339()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_summary() {
        assert_eq!(
            PruneStats::default().to_string(),
            "pruned 0 plans (first id -, last id -), first scanned id -, canceled 0, skipped 0"
        );
    }

    #[test]
    fn test_tracks_first_and_last() {
        let mut stats = PruneStats::default();
        stats.note_scanned(3);
        stats.note_scanned(4);
        stats.note_pruned(3);
        stats.note_pruned(9);
        let plan = Plan::new(4, "stuck").with_state(PlanState::Running);
        stats.note_skipped(SkippedPlan::from(&plan));
        stats.note_skipped(SkippedPlan::from(&Plan::new(5, "later")));

        assert_eq!(stats.first_scanned_id, Some(3));
        assert_eq!(stats.first_pruned_id, Some(3));
        assert_eq!(stats.last_pruned_id, Some(9));
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.first_skipped.as_ref().map(|s| s.id), Some(4));

        let summary = stats.to_string();
        assert!(summary.starts_with("pruned 2 plans (first id 3, last id 9)"));
        assert!(summary.contains("first skipped plan 4 in state running"));
    }
}
