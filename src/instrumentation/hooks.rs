//! Pluggable task observers.

use async_trait::async_trait;

use crate::error::HookError;
use crate::instrumentation::record::TaskExecutionRecord;

/// Observes task executions.
///
/// Both methods default to no-ops. A hook sees the record but cannot change
/// it; returning an error or panicking only produces a log line.
#[async_trait]
pub trait TaskHook: Send + Sync {
    /// Name used when logging hook failures.
    fn name(&self) -> &str;

    /// Called after the record is created, before the task body runs.
    async fn before_execute(&self, record: &TaskExecutionRecord) -> Result<(), HookError> {
        let _ = record;
        Ok(())
    }

    /// Called with the completed record, just before it is discarded.
    async fn after_execute(&self, record: &TaskExecutionRecord) -> Result<(), HookError> {
        let _ = record;
        Ok(())
    }
}

/// Logs every task event at debug level.
pub struct LogHook;

#[async_trait]
impl TaskHook for LogHook {
    fn name(&self) -> &str {
        "log"
    }

    async fn before_execute(&self, record: &TaskExecutionRecord) -> Result<(), HookError> {
        tracing::debug!(
            task_id = %record.task_id,
            sender = record.sender.as_deref().unwrap_or("-"),
            args = record.args.len(),
            "Task starting"
        );
        Ok(())
    }

    async fn after_execute(&self, record: &TaskExecutionRecord) -> Result<(), HookError> {
        tracing::debug!(
            task_id = %record.task_id,
            state = ?record.terminal_state,
            "Task finished"
        );
        Ok(())
    }
}
