//! Plan entity as persisted by the store
//!
//! The store only interprets a handful of fields:
//! - `id` is the primary key
//! - `create_time` drives age-based retention
//! - `state` decides whether a plan may be removed
//! - `is_system_plan` and `owner` scope queries and pruning priority
//!
//! Everything else rides along in `details` and is opaque here.

mod state;

pub use state::PlanState;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A unit of long-running cluster work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Globally unique, assigned by the planner
    pub id: u64,
    pub name: String,
    pub state: PlanState,
    pub create_time: DateTime<Utc>,
    /// Internal housekeeping plan rather than an operator request
    #[serde(default)]
    pub is_system_plan: bool,
    #[serde(default)]
    pub owner: Option<String>,
    /// Execution detail (task history, parameters); trimmed for display
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Plan {
    /// Create a pending user plan created now
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            state: PlanState::Pending,
            create_time: Utc::now(),
            is_system_plan: false,
            owner: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_state(mut self, state: PlanState) -> Self {
        self.state = state;
        self
    }

    pub fn with_create_time(mut self, create_time: DateTime<Utc>) -> Self {
        self.create_time = create_time;
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system_plan = true;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Whether the plan belongs to `owner` (any owner matches `None`)
    pub fn owned_by(&self, owner: Option<&str>) -> bool {
        match owner {
            Some(owner) => self.owner.as_deref() == Some(owner),
            None => true,
        }
    }

    /// Drop bulk execution detail before handing a plan to a listing
    pub fn strip(&mut self) {
        self.details = serde_json::Value::Null;
    }

    /// Serialize to the stored blob format
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from the stored blob format
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blob_round_trip() {
        let plan = Plan::new(7, "deploy-topology")
            .with_state(PlanState::Running)
            .with_owner("alice")
            .with_details(json!({"tasks": ["a", "b"]}));

        let decoded = Plan::decode(&plan.encode().unwrap()).unwrap();
        assert_eq!(decoded, plan);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Plan::decode(b"not json").is_err());
    }

    #[test]
    fn test_strip_drops_details() {
        let mut plan = Plan::new(1, "p").with_details(json!({"history": [1, 2, 3]}));
        plan.strip();
        assert_eq!(plan.details, serde_json::Value::Null);
        assert_eq!(plan.name, "p");
    }

    #[test]
    fn test_owner_filter() {
        let plan = Plan::new(1, "p").with_owner("alice");
        assert!(plan.owned_by(None));
        assert!(plan.owned_by(Some("alice")));
        assert!(!plan.owned_by(Some("bob")));
        assert!(!Plan::new(2, "q").owned_by(Some("alice")));
    }
}
