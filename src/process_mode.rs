//! Process-mode negotiation for parallel task execution.
//!
//! Subprocesses must start from a clean image (`spawn`) rather than a copy of
//! the parent's memory (`fork`): a forked child of a multi-threaded parent can
//! inherit locks and handles in an inconsistent state. Negotiation happens
//! once, before any connection object exists.

use serde::{Deserialize, Serialize};

use crate::error::ProcessModeError;

/// A concrete process-creation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMethod {
    Fork,
    Spawn,
    Forkserver,
}

impl std::fmt::Display for StartMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Fork => "fork",
            Self::Spawn => "spawn",
            Self::Forkserver => "forkserver",
        };
        write!(f, "{s}")
    }
}

/// Outcome of negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessMode {
    /// Whatever strategy was already in effect was left in place.
    Default,
    /// `spawn` was selected on the first attempt.
    Spawn,
    /// `spawn` was selected by overriding an existing strategy.
    SpawnForced,
}

impl std::fmt::Display for ProcessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Default => "default",
            Self::Spawn => "spawn",
            Self::SpawnForced => "spawn_forced",
        };
        write!(f, "{s}")
    }
}

/// Host-side control over how task subprocesses are created.
pub trait ProcessStrategy: Send + Sync {
    /// All strategies the platform supports.
    fn supported(&self) -> Vec<StartMethod>;

    /// Select a strategy. Without `force`, fails if one is already set.
    fn set_start_method(&mut self, method: StartMethod, force: bool)
    -> Result<(), ProcessModeError>;

    /// The strategy subprocesses will actually be created with.
    fn effective(&self) -> StartMethod;
}

/// Start-method state for the current platform.
#[derive(Debug, Clone)]
pub struct PlatformStrategy {
    supported: Vec<StartMethod>,
    platform_default: StartMethod,
    current: Option<StartMethod>,
}

impl PlatformStrategy {
    /// Strategies available on this build target; nothing selected yet.
    pub fn detect() -> Self {
        if cfg!(unix) {
            Self::new(
                vec![StartMethod::Fork, StartMethod::Spawn, StartMethod::Forkserver],
                StartMethod::Fork,
            )
        } else {
            Self::new(vec![StartMethod::Spawn], StartMethod::Spawn)
        }
    }

    pub fn new(supported: Vec<StartMethod>, platform_default: StartMethod) -> Self {
        Self {
            supported,
            platform_default,
            current: None,
        }
    }

    /// Pretend an earlier component already chose a strategy.
    pub fn with_current(mut self, method: StartMethod) -> Self {
        self.current = Some(method);
        self
    }
}

impl ProcessStrategy for PlatformStrategy {
    fn supported(&self) -> Vec<StartMethod> {
        self.supported.clone()
    }

    fn set_start_method(
        &mut self,
        method: StartMethod,
        force: bool,
    ) -> Result<(), ProcessModeError> {
        if !self.supported.contains(&method) {
            return Err(ProcessModeError::Unsupported {
                method: method.to_string(),
            });
        }
        if let Some(current) = self.current
            && !force
        {
            return Err(ProcessModeError::AlreadySet {
                current: current.to_string(),
            });
        }
        self.current = Some(method);
        Ok(())
    }

    fn effective(&self) -> StartMethod {
        self.current.unwrap_or(self.platform_default)
    }
}

/// Select `spawn` for task subprocesses, degrading without failing.
///
/// Tries a plain selection, then a forced one. If both fail the existing
/// strategy stays in effect and [`ProcessMode::Default`] is returned; the
/// worker keeps booting even though that strategy may be `fork`.
pub fn select_process_mode(strategy: &mut dyn ProcessStrategy) -> ProcessMode {
    let supported: Vec<String> = strategy.supported().iter().map(|m| m.to_string()).collect();
    tracing::info!(methods = ?supported, "Process start methods available");

    let mode = match strategy.set_start_method(StartMethod::Spawn, false) {
        Ok(()) => ProcessMode::Spawn,
        Err(e) => {
            tracing::info!(error = %e, "Selecting spawn failed, retrying with force");
            match strategy.set_start_method(StartMethod::Spawn, true) {
                Ok(()) => ProcessMode::SpawnForced,
                Err(e) => {
                    tracing::warn!(error = %e, "Forced spawn failed, keeping existing start method");
                    ProcessMode::Default
                }
            }
        }
    };

    tracing::info!(
        mode = %mode,
        start_method = %strategy.effective(),
        "Process start method selected"
    );
    mode
}
