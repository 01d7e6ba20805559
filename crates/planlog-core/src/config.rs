//! Plan store configuration
//!
//! Passed explicitly at construction; every field has a default so a TOML
//! file only needs to name what it overrides:
//! ```toml
//! plan_limit = 5000
//! max_per_scan = 200
//! age_windows_ms = [3600000, 600000, 0]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::constants::retention::{
    DEFAULT_AGE_WINDOWS_MS, DEFAULT_MAX_PER_SCAN, DEFAULT_PLAN_LIMIT, DEFAULT_SHUTDOWN_WAIT,
    PRUNE_TRIGGER_SLACK,
};
use crate::error::{Error, Result};

/// Configuration for a [`PlanStore`](crate::storage::PlanStore)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlanStoreConfig {
    /// Capacity whose excess triggers pruning
    pub plan_limit: u64,
    /// Maximum rows visited by one pruning sub-transaction
    pub max_per_scan: usize,
    /// Age windows in milliseconds, from most to least conservative
    pub age_windows_ms: Vec<u64>,
    /// Best-effort wait for an active run during `close()`
    pub shutdown_wait_ms: u64,
}

impl Default for PlanStoreConfig {
    fn default() -> Self {
        Self {
            plan_limit: DEFAULT_PLAN_LIMIT,
            max_per_scan: DEFAULT_MAX_PER_SCAN,
            age_windows_ms: DEFAULT_AGE_WINDOWS_MS.to_vec(),
            shutdown_wait_ms: DEFAULT_SHUTDOWN_WAIT.as_millis() as u64,
        }
    }
}

impl PlanStoreConfig {
    /// Set the plan limit
    pub fn plan_limit(mut self, limit: u64) -> Self {
        self.plan_limit = limit;
        self
    }

    /// Set the sub-transaction batch size
    pub fn max_per_scan(mut self, rows: usize) -> Self {
        self.max_per_scan = rows;
        self
    }

    /// Replace the age windows
    pub fn age_windows(mut self, windows: &[Duration]) -> Self {
        self.age_windows_ms = windows.iter().map(|w| w.as_millis() as u64).collect();
        self
    }

    /// Estimate threshold above which a write starts a pruning run
    pub fn prune_trigger(&self) -> u64 {
        self.plan_limit.saturating_add(PRUNE_TRIGGER_SLACK)
    }

    /// Age windows as durations
    pub fn windows(&self) -> Vec<Duration> {
        self.age_windows_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }

    pub fn shutdown_wait(&self) -> Duration {
        Duration::from_millis(self.shutdown_wait_ms)
    }

    /// Reject configurations the pruning algorithm cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_per_scan == 0 {
            return Err(Error::Config("max_per_scan must be at least 1".into()));
        }
        if self.age_windows_ms.is_empty() {
            return Err(Error::Config("age_windows_ms must not be empty".into()));
        }
        if self.age_windows_ms.windows(2).any(|pair| pair[0] < pair[1]) {
            return Err(Error::Config(format!(
                "age_windows_ms must be in descending order: {:?}",
                self.age_windows_ms
            )));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlanStoreConfig::default();
        assert_eq!(config.plan_limit, 1000);
        assert_eq!(config.max_per_scan, 100);
        assert_eq!(config.prune_trigger(), 1010);
        assert_eq!(
            config.windows(),
            vec![
                Duration::from_secs(3600),
                Duration::from_secs(600),
                Duration::ZERO
            ]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PlanStoreConfig::from_toml_str("plan_limit = 5").unwrap();
        assert_eq!(config.plan_limit, 5);
        assert_eq!(config.prune_trigger(), 15);
        assert_eq!(config.max_per_scan, 100);
        assert_eq!(config.age_windows_ms, vec![3_600_000, 600_000, 0]);
    }

    #[test]
    fn test_rejects_zero_batch() {
        let err = PlanStoreConfig::from_toml_str("max_per_scan = 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_ascending_windows() {
        let config = PlanStoreConfig::default()
            .age_windows(&[Duration::ZERO, Duration::from_secs(60)]);
        assert!(config.validate().is_err());

        let empty = PlanStoreConfig::default().age_windows(&[]);
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_types() {
        let err = PlanStoreConfig::from_toml_str("plan_limit = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
