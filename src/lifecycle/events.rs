//! Events delivered by the host runtime and notifications sent back out.

use serde::Serialize;

use crate::instrumentation::TerminalState;
use crate::lifecycle::state::LifecyclePhase;
use crate::process_mode::ProcessMode;

/// Process-level notifications from the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    ProcessBoot,
    WorkerInit,
    WorkerReady,
    WorkerShutdown,
}

/// Per-task notifications from the host runtime.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    BeforeExecute {
        task_id: String,
        sender: Option<String>,
        args: Vec<serde_json::Value>,
        kwargs: serde_json::Map<String, serde_json::Value>,
    },
    AfterExecute {
        task_id: String,
        sender: Option<String>,
        args: Vec<serde_json::Value>,
        kwargs: serde_json::Map<String, serde_json::Value>,
        result: Option<serde_json::Value>,
        terminal_state: TerminalState,
    },
}

/// Broadcast to subscribers as the worker moves through its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleNotification {
    PhaseChanged {
        from: LifecyclePhase,
        to: LifecyclePhase,
    },
    /// All dependencies passed; task intake may begin.
    Ready {
        process_mode: ProcessMode,
        dependencies: Vec<String>,
    },
    BootFailed {
        reason: String,
    },
    Stopped,
}
