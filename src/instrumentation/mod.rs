//! Task execution instrumentation.
//!
//! The runtime calls [`TaskInstrumentation::on_before_execute`] and
//! [`TaskInstrumentation::on_after_execute`] around every task body. Both
//! are observers only: they never touch task inputs or outputs and never
//! return an error to the caller. Hooks may fire concurrently for distinct
//! task ids.

pub mod hooks;
pub mod record;

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::RwLock;

use crate::error::HookError;
use crate::lifecycle::events::TaskEvent;

pub use hooks::{LogHook, TaskHook};
pub use record::{TaskExecutionRecord, TerminalState};

/// Tracks in-flight task executions and fans events out to hooks.
pub struct TaskInstrumentation {
    /// Records keyed by task id, alive between "before" and "after".
    in_flight: RwLock<HashMap<String, TaskExecutionRecord>>,
    hooks: Vec<Arc<dyn TaskHook>>,
}

impl TaskInstrumentation {
    pub fn new() -> Self {
        Self {
            in_flight: RwLock::new(HashMap::new()),
            hooks: Vec::new(),
        }
    }

    /// Add an observer. Hooks run in registration order.
    pub fn with_hook(mut self, hook: Arc<dyn TaskHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Number of tasks between "before" and "after".
    pub async fn in_flight(&self) -> usize {
        self.in_flight.read().await.len()
    }

    /// Ids of tasks between "before" and "after".
    pub async fn in_flight_ids(&self) -> Vec<String> {
        self.in_flight.read().await.keys().cloned().collect()
    }

    /// Route a runtime task event to the matching hook.
    pub async fn handle(&self, event: TaskEvent) {
        match event {
            TaskEvent::BeforeExecute {
                task_id,
                sender,
                args,
                kwargs,
            } => {
                self.on_before_execute(&task_id, sender.as_deref(), &args, &kwargs)
                    .await
            }
            TaskEvent::AfterExecute {
                task_id,
                sender,
                args,
                kwargs,
                result,
                terminal_state,
            } => {
                self.on_after_execute(
                    &task_id,
                    sender.as_deref(),
                    &args,
                    &kwargs,
                    result.as_ref(),
                    terminal_state,
                )
                .await
            }
        }
    }

    /// A task is about to run.
    pub async fn on_before_execute(
        &self,
        task_id: &str,
        sender: Option<&str>,
        args: &[serde_json::Value],
        kwargs: &serde_json::Map<String, serde_json::Value>,
    ) {
        if task_id.is_empty() {
            tracing::warn!("Task prerun without a task id, ignoring");
            return;
        }

        let record = TaskExecutionRecord::new(task_id, sender, args, kwargs);
        {
            let mut in_flight = self.in_flight.write().await;
            if in_flight.contains_key(task_id) {
                tracing::warn!(task_id = %task_id, "Duplicate task prerun, ignoring");
                return;
            }
            in_flight.insert(task_id.to_string(), record.clone());
        }

        for hook in &self.hooks {
            observe(hook.name(), "prerun", task_id, hook.before_execute(&record)).await;
        }
    }

    /// A task finished running.
    ///
    /// Without a matching [`Self::on_before_execute`] nothing is observed.
    pub async fn on_after_execute(
        &self,
        task_id: &str,
        sender: Option<&str>,
        args: &[serde_json::Value],
        kwargs: &serde_json::Map<String, serde_json::Value>,
        result: Option<&serde_json::Value>,
        terminal_state: TerminalState,
    ) {
        let Some(mut record) = self.in_flight.write().await.remove(task_id) else {
            tracing::warn!(task_id = %task_id, "Task postrun without matching prerun, ignoring");
            return;
        };

        if record.sender.is_none() {
            record.sender = sender.map(str::to_string);
        }
        if record.args.as_slice() != args || &record.kwargs != kwargs {
            tracing::debug!(task_id = %task_id, "Task arguments differ between prerun and postrun");
        }
        // Records leave the map open, so this is their only completion.
        record.finish(result.cloned(), terminal_state);

        let duration_ms = record.duration().map(|d| d.as_millis() as u64).unwrap_or(0);
        let state = record
            .terminal_state
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        if record.terminal_state.as_ref().is_some_and(TerminalState::is_success) {
            tracing::info!(task_id = %task_id, state = %state, duration_ms, "Task completed");
        } else {
            tracing::warn!(task_id = %task_id, state = %state, duration_ms, "Task did not succeed");
        }

        for hook in &self.hooks {
            observe(hook.name(), "postrun", task_id, hook.after_execute(&record)).await;
        }
    }
}

/// Run one hook call; errors and panics are logged and go no further.
async fn observe<F>(hook: &str, stage: &'static str, task_id: &str, call: F)
where
    F: Future<Output = Result<(), HookError>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(hook, stage, task_id = %task_id, error = %e, "Task hook failed");
        }
        Err(panic) => {
            tracing::error!(
                hook,
                stage,
                task_id = %task_id,
                panic = %panic_message(panic.as_ref()),
                "Task hook panicked"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

impl Default for TaskInstrumentation {
    fn default() -> Self {
        Self::new()
    }
}
