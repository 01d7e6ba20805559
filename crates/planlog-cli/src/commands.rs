//! Subcommand handlers
//!
//! Each handler runs against an open store and returns a JSON document for
//! `main` to print.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use planlog_core::{Database, DetachedHost, PlanStore, PlanStoreConfig};

/// Open the store at `db_path`, reading settings from `config_path` if given
pub fn open_store(db_path: &Path, config_path: Option<&Path>) -> Result<PlanStore> {
    let config = match config_path {
        Some(path) => PlanStoreConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PlanStoreConfig::default(),
    };
    let db = Database::new(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?
        .into_shared();

    // No admin is attached, so cancellation is refused
    Ok(PlanStore::open(db, config, Arc::new(DetachedHost))?)
}

/// Parse epoch milliseconds; 0 means unbounded
fn bound(ms: i64) -> Result<Option<DateTime<Utc>>> {
    if ms == 0 {
        return Ok(None);
    }
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(Some)
        .ok_or_else(|| anyhow!("timestamp {} is out of range", ms))
}

pub fn stats(store: &PlanStore) -> Result<Value> {
    Ok(json!({
        "cached_num_plans": store.cached_num_plans(),
        "actual_num_plans": store.actual_num_plans()?,
        "plan_limit": store.config().plan_limit,
        "prune_trigger": store.config().prune_trigger(),
        "pruning": store.is_pruning(),
        "latest_pruning": store.latest_pruning_info(),
    }))
}

pub fn show(store: &PlanStore, id: u64) -> Result<Value> {
    let plan = store
        .with_transaction(|txn| store.get_plan_by_id(txn, id))?
        .ok_or_else(|| anyhow!("plan {} not found", id))?;
    Ok(serde_json::to_value(plan)?)
}

pub fn list(store: &PlanStore, from: u64, limit: usize, owner: Option<&str>) -> Result<Value> {
    let plans = store.with_transaction(|txn| store.plan_range(txn, from, limit, owner))?;
    Ok(serde_json::to_value(plans.into_values().collect::<Vec<_>>())?)
}

pub fn active(store: &PlanStore) -> Result<Value> {
    let plans = store.with_transaction(|txn| store.active_plans(txn))?;
    Ok(serde_json::to_value(plans)?)
}

pub fn range(
    store: &PlanStore,
    start_ms: i64,
    end_ms: i64,
    count: usize,
    owner: Option<&str>,
) -> Result<Value> {
    let (start, end) = (bound(start_ms)?, bound(end_ms)?);
    let found = store.with_transaction(|txn| store.plan_id_range(txn, start, end, count, owner))?;
    Ok(json!({
        "first_id": found.first_id,
        "count": found.count,
    }))
}

/// Run one pruning pass in the foreground
pub fn prune(store: &PlanStore, timeout: Duration) -> Result<Value> {
    let before = store.actual_num_plans()?;
    if !store.start_pruning() {
        tracing::info!("Pruning already in progress, waiting for it");
    }
    if !store.await_pruning(timeout) {
        return Err(anyhow!("pruning did not finish within {:?}", timeout));
    }

    Ok(json!({
        "before": before,
        "after": store.actual_num_plans()?,
        "summary": store.latest_pruning_info(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use planlog_core::{Plan, PlanState};
    use tempfile::TempDir;

    fn seeded_store(temp: &TempDir, config: Option<&Path>) -> PlanStore {
        let store = open_store(&temp.path().join("plans.db"), config).unwrap();
        store
            .with_transaction(|txn| {
                for id in 1..=6u64 {
                    let state = if id % 2 == 0 {
                        PlanState::Succeeded
                    } else {
                        PlanState::Running
                    };
                    let created = DateTime::<Utc>::from_timestamp_millis(id as i64 * 1000).unwrap();
                    let plan = Plan::new(id, format!("plan-{}", id))
                        .with_state(state)
                        .with_owner("ops")
                        .with_create_time(created);
                    store.put(txn, &plan)?;
                }
                Ok(())
            })
            .unwrap();
        store
    }

    #[test]
    fn test_stats_reports_counts() {
        let temp = TempDir::new().unwrap();
        let store = seeded_store(&temp, None);

        let stats = stats(&store).unwrap();
        assert_eq!(stats["actual_num_plans"], 6);
        assert_eq!(stats["cached_num_plans"], 6);
        assert_eq!(stats["plan_limit"], 1000);
        assert_eq!(stats["latest_pruning"], Value::Null);
    }

    #[test]
    fn test_show_missing_plan_fails() {
        let temp = TempDir::new().unwrap();
        let store = seeded_store(&temp, None);

        assert_eq!(show(&store, 2).unwrap()["name"], "plan-2");
        assert!(show(&store, 42).is_err());
    }

    #[test]
    fn test_list_and_active() {
        let temp = TempDir::new().unwrap();
        let store = seeded_store(&temp, None);

        let listed = list(&store, 3, 2, Some("ops")).unwrap();
        let ids: Vec<u64> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![3, 4]);

        assert!(list(&store, 1, 10, Some("nobody")).unwrap().as_array().unwrap().is_empty());
        assert_eq!(active(&store).unwrap().as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_range_uses_zero_as_unbounded() {
        let temp = TempDir::new().unwrap();
        let store = seeded_store(&temp, None);

        let found = range(&store, 0, 4000, 10, None).unwrap();
        assert_eq!(found, json!({"first_id": 1, "count": 3}));

        let found = range(&store, 2000, 0, 2, None).unwrap();
        assert_eq!(found, json!({"first_id": 2, "count": 2}));
    }

    #[test]
    fn test_prune_with_config_file() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("planlog.toml");
        std::fs::write(&config_path, "plan_limit = 3\n").unwrap();
        let store = seeded_store(&temp, Some(&config_path));

        let result = prune(&store, Duration::from_secs(10)).unwrap();
        assert_eq!(result["before"], 6);
        // Only the finished plans can go
        assert_eq!(result["after"], 3);
        assert!(result["summary"].as_str().unwrap().starts_with("pruned 3 plans"));
    }

    #[test]
    fn test_bad_config_is_reported() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("planlog.toml");
        std::fs::write(&config_path, "max_per_scan = 0\n").unwrap();

        let err = open_store(&temp.path().join("plans.db"), Some(&config_path)).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }
}
