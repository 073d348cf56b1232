//! Per-execution task records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// How a task execution ended.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Success,
    Failure,
    Retry,
    Revoked,
    /// A state name the runtime reported that is not one of the above.
    Other(String),
}

impl TerminalState {
    /// Parse a runtime state name; case-insensitive, never fails.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => Self::Success,
            "FAILURE" => Self::Failure,
            "RETRY" => Self::Retry,
            "REVOKED" => Self::Revoked,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for TerminalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Retry => write!(f, "retry"),
            Self::Revoked => write!(f, "revoked"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// One task execution, from "before run" to "after run".
#[derive(Debug, Clone, Serialize)]
pub struct TaskExecutionRecord {
    pub task_id: String,
    pub sender: Option<String>,
    pub args: Vec<serde_json::Value>,
    pub kwargs: serde_json::Map<String, serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub terminal_state: Option<TerminalState>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskExecutionRecord {
    pub fn new(
        task_id: impl Into<String>,
        sender: Option<&str>,
        args: &[serde_json::Value],
        kwargs: &serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            sender: sender.map(str::to_string),
            args: args.to_vec(),
            kwargs: kwargs.clone(),
            result: None,
            terminal_state: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record the outcome. A record completes at most once.
    pub fn complete(
        &mut self,
        result: Option<serde_json::Value>,
        state: TerminalState,
    ) -> Result<(), RecordError> {
        if let Some(existing) = &self.terminal_state {
            return Err(RecordError::AlreadyCompleted {
                task_id: self.task_id.clone(),
                state: existing.clone(),
            });
        }
        self.finish(result, state);
        Ok(())
    }

    /// Stamp the outcome on a record known to be open.
    pub(crate) fn finish(&mut self, result: Option<serde_json::Value>, state: TerminalState) {
        self.result = result;
        self.terminal_state = Some(state);
        self.finished_at = Some(Utc::now());
    }

    pub fn is_complete(&self) -> bool {
        self.terminal_state.is_some()
    }

    /// Time between "before run" and "after run".
    pub fn duration(&self) -> Option<std::time::Duration> {
        self.finished_at.map(|end| {
            end.signed_duration_since(self.started_at)
                .to_std()
                .unwrap_or_default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_runtime_states() {
        assert_eq!(TerminalState::parse("SUCCESS"), TerminalState::Success);
        assert_eq!(TerminalState::parse("failure"), TerminalState::Failure);
        assert_eq!(TerminalState::parse("REVOKED"), TerminalState::Revoked);
        assert_eq!(
            TerminalState::parse("IGNORED"),
            TerminalState::Other("IGNORED".into())
        );
    }

    #[test]
    fn record_completes_once() {
        let mut rec = TaskExecutionRecord::new("t-1", Some("prune"), &[], &Default::default());
        assert!(!rec.is_complete());
        assert!(rec.duration().is_none());

        rec.complete(Some(serde_json::json!(3)), TerminalState::Success)
            .unwrap();
        assert!(rec.is_complete());
        assert!(rec.duration().is_some());

        assert_eq!(
            rec.complete(None, TerminalState::Failure).unwrap_err(),
            RecordError::AlreadyCompleted {
                task_id: "t-1".into(),
                state: TerminalState::Success,
            }
        );
        assert_eq!(rec.terminal_state, Some(TerminalState::Success));
    }
}
