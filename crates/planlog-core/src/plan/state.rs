//! Plan lifecycle states

use serde::{Deserialize, Serialize};

/// Lifecycle state of a plan
///
/// Terminal states admit no further execution; only plans in a terminal
/// state may be removed by pruning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    #[default]
    Pending,
    Approved,
    Running,
    /// Interrupt was asked for but the plan has not stopped yet
    InterruptRequested,
    Succeeded,
    Error,
    Canceled,
    Interrupted,
}

impl PlanState {
    pub const ALL: [PlanState; 8] = [
        PlanState::Pending,
        PlanState::Approved,
        PlanState::Running,
        PlanState::InterruptRequested,
        PlanState::Succeeded,
        PlanState::Error,
        PlanState::Canceled,
        PlanState::Interrupted,
    ];

    /// Whether the plan has reached a final outcome
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PlanState::Succeeded | PlanState::Error | PlanState::Canceled | PlanState::Interrupted
        )
    }

    /// Whether escalation may cancel a plan in this state
    ///
    /// Running plans are never escalated; they finish or are interrupted
    /// through the execution layer.
    pub fn is_cancelable(self) -> bool {
        !self.is_terminal() && self != PlanState::Running
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanState::Pending => "pending",
            PlanState::Approved => "approved",
            PlanState::Running => "running",
            PlanState::InterruptRequested => "interrupt_requested",
            PlanState::Succeeded => "succeeded",
            PlanState::Error => "error",
            PlanState::Canceled => "canceled",
            PlanState::Interrupted => "interrupted",
        }
    }
}

impl std::fmt::Display for PlanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlanState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(PlanState::Pending),
            "approved" => Ok(PlanState::Approved),
            "running" => Ok(PlanState::Running),
            "interrupt_requested" | "interruptrequested" => Ok(PlanState::InterruptRequested),
            "succeeded" | "success" => Ok(PlanState::Succeeded),
            "error" => Ok(PlanState::Error),
            "canceled" | "cancelled" => Ok(PlanState::Canceled),
            "interrupted" => Ok(PlanState::Interrupted),
            other => Err(format!("unknown plan state: {}", other)),
        }
    }
}
