//! Error types for the heavy worker.

use std::time::Duration;

use crate::instrumentation::TerminalState;
use crate::lifecycle::LifecyclePhase;

/// Top-level error type for the worker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Boot error: {0}")]
    Boot(#[from] BootError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// A single probe attempt against an upstream dependency failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    #[error("{name} unreachable: {reason}")]
    Unreachable { name: String, reason: String },

    #[error("{name} reachable but not ready: {reason}")]
    NotReady { name: String, reason: String },

    #[error("{name} probe timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },
}

/// Fatal errors raised while taking the worker from boot to ready.
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error("Dependency {name} not ready after {waited:?}: {last_error}")]
    DependencyUnavailable {
        name: String,
        waited: Duration,
        last_error: ProbeError,
    },

    #[error("Boot step {step} failed: {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Database engine setup failed: {0}")]
    Database(#[from] DatabaseError),
}

/// Process-creation strategy could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessModeError {
    #[error("Start method {method} is not supported on this platform")]
    Unsupported { method: String },

    #[error("Start method already set to {current}")]
    AlreadySet { current: String },
}

/// Database engine errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatabaseError {
    #[error("Worker identity already set to {0}")]
    IdentityAlreadySet(String),

    #[error("Connection pool already initialized")]
    PoolAlreadyInitialized,

    #[error("Connection pool must be initialized after the identity is set")]
    IdentityNotSet,

    #[error("Connection pool not initialized")]
    PoolNotInitialized,

    #[error("Connection pool exhausted: no connection available within {timeout:?}")]
    PoolExhausted { timeout: Duration },

    #[error("Connection pool is closed")]
    PoolClosed,

    #[error("Invalid pool size: {0}")]
    InvalidPoolSize(String),
}

/// Task registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Task module {name} already registered")]
    Duplicate { name: String },

    #[error("Task registry is sealed; cannot register {name}")]
    Sealed { name: String },
}

/// Errors raised inside a task instrumentation hook.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HookError {
    #[error("Hook {hook} failed: {reason}")]
    Failed { hook: String, reason: String },
}

/// Task execution record errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("Task {task_id} already completed as {state}")]
    AlreadyCompleted {
        task_id: String,
        state: TerminalState,
    },
}

/// Lifecycle state machine errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition {
        from: LifecyclePhase,
        to: LifecyclePhase,
    },
}

/// Result type alias for the worker.
pub type Result<T> = std::result::Result<T, Error>;
