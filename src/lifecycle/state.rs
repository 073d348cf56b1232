//! Worker lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of the worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// Process started; one-time setup pending.
    Booting,
    /// Negotiating process mode and waiting for dependencies.
    CheckingDependencies,
    /// Accepting tasks.
    Ready,
    /// Draining in-flight work and releasing resources.
    ShuttingDown,
    /// Terminal.
    Stopped,
}

impl LifecyclePhase {
    /// Check if this phase allows transitioning to another phase.
    pub fn can_transition_to(&self, target: LifecyclePhase) -> bool {
        use LifecyclePhase::*;

        matches!(
            (self, target),
            (Booting, CheckingDependencies) | (Booting, ShuttingDown) |
            (CheckingDependencies, Ready) | (CheckingDependencies, ShuttingDown) |
            (Ready, ShuttingDown) |
            (ShuttingDown, Stopped)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Tasks may only be admitted in this phase.
    pub fn accepts_tasks(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Booting => "booting",
            Self::CheckingDependencies => "checking_dependencies",
            Self::Ready => "ready",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

/// A recorded phase change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: LifecyclePhase,
    pub to: LifecyclePhase,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}
