//! Worker lifecycle — boot, readiness and shutdown.
//!
//! Core components:
//! - `state` — Phase state machine (Booting → CheckingDependencies → Ready → ShuttingDown → Stopped)
//! - `events` — Runtime events in, lifecycle notifications out
//! - `registry` — Task-handler modules registered at boot
//! - `secondary` — Single-tenant secondary init (waits for the primary worker)
//! - `orchestrator` — Drives the phases and owns process-wide setup

pub mod events;
pub mod orchestrator;
pub mod registry;
pub mod secondary;
pub mod state;

pub use events::{LifecycleEvent, LifecycleNotification, TaskEvent};
pub use orchestrator::{
    Dependencies, DrainFailure, SecondaryInit, TaskDrain, WorkerDeps, WorkerOrchestrator,
};
pub use registry::TaskRegistry;
pub use secondary::WaitForPrimary;
pub use state::{LifecyclePhase, PhaseTransition};
