//! Worker lifecycle orchestrator.
//!
//! Drives the worker from process boot to accepting tasks and on to a
//! drained stop. Boot and shutdown run on one task with `&mut self`; task
//! instrumentation is shared separately through [`TaskInstrumentation`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;

use crate::config::WorkerConfig;
use crate::db::DatabaseEngine;
use crate::error::{BootError, Error, LifecycleError};
use crate::instrumentation::TaskInstrumentation;
use crate::lifecycle::events::{LifecycleEvent, LifecycleNotification, TaskEvent};
use crate::lifecycle::registry::TaskRegistry;
use crate::lifecycle::state::{LifecyclePhase, PhaseTransition};
use crate::probes::{self, DependencyCheck, Probe, Ready};
use crate::process_mode::{self, ProcessMode, ProcessStrategy};

const MAX_TRANSITIONS: usize = 64;

/// The upstream dependencies, probed in field order.
pub struct Dependencies {
    pub broker: Arc<dyn Probe>,
    pub database: Arc<dyn Probe>,
    pub search: Arc<dyn Probe>,
}

/// Extra initialization for single-tenant deployments.
#[async_trait]
pub trait SecondaryInit: Send + Sync {
    async fn run(&self) -> Result<(), BootError>;
}

/// An in-flight task that did not finish cleanly during drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainFailure {
    pub task_id: String,
    pub reason: String,
}

/// The task-execution layer's side of shutdown.
#[async_trait]
pub trait TaskDrain: Send + Sync {
    /// Wait for in-flight tasks; report the ones that failed.
    async fn drain(&self) -> Vec<DrainFailure>;
}

/// Collaborators the orchestrator drives.
pub struct WorkerDeps {
    pub engine: Arc<dyn DatabaseEngine>,
    pub process_strategy: Box<dyn ProcessStrategy>,
    pub dependencies: Dependencies,
    pub secondary_init: Arc<dyn SecondaryInit>,
    pub drain: Option<Arc<dyn TaskDrain>>,
    pub instrumentation: Arc<TaskInstrumentation>,
}

/// Owns the worker's lifecycle state.
pub struct WorkerOrchestrator {
    config: WorkerConfig,
    deps: WorkerDeps,
    phase: LifecyclePhase,
    transitions: Vec<PhaseTransition>,
    registry: TaskRegistry,
    boot_setup_done: bool,
    process_mode: Option<ProcessMode>,
    ready: Option<Ready>,
    notify_tx: broadcast::Sender<LifecycleNotification>,
}

impl WorkerOrchestrator {
    pub fn new(config: WorkerConfig, deps: WorkerDeps) -> Self {
        let (notify_tx, _) = broadcast::channel(64);
        Self {
            config,
            deps,
            phase: LifecyclePhase::Booting,
            transitions: Vec::new(),
            registry: TaskRegistry::new(),
            boot_setup_done: false,
            process_mode: None,
            ready: None,
            notify_tx,
        }
    }

    /// Receive lifecycle notifications sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleNotification> {
        self.notify_tx.subscribe()
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }

    /// The negotiated process mode, once `CheckingDependencies` has run.
    pub fn process_mode(&self) -> Option<ProcessMode> {
        self.process_mode
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Shared instrumentation for the task runtime.
    pub fn instrumentation(&self) -> Arc<TaskInstrumentation> {
        Arc::clone(&self.deps.instrumentation)
    }

    /// Task intake is open.
    pub fn accepting_tasks(&self) -> bool {
        self.phase.accepts_tasks()
    }

    /// Route a runtime lifecycle event to its handler.
    pub async fn dispatch(&mut self, event: LifecycleEvent) -> Result<(), Error> {
        tracing::debug!(event = ?event, phase = %self.phase, "Lifecycle event received");
        match event {
            LifecycleEvent::ProcessBoot => self.on_process_boot(),
            LifecycleEvent::WorkerInit => self.on_worker_init().await.map(|_| ()),
            LifecycleEvent::WorkerReady => self.on_worker_ready().await,
            LifecycleEvent::WorkerShutdown => self.on_worker_shutdown().await,
        }
    }

    /// Route a per-task event to instrumentation. Never fails.
    pub async fn on_task_event(&self, event: TaskEvent) {
        self.deps.instrumentation.handle(event).await;
    }

    /// Run boot, dependency checks and the ready step in order.
    pub async fn boot(&mut self) -> Result<Ready, Error> {
        self.on_process_boot()?;
        let ready = self.on_worker_init().await?;
        self.on_worker_ready().await?;
        Ok(ready)
    }

    /// One-time process setup: identity tag, pool sizing, task registration.
    pub fn on_process_boot(&mut self) -> Result<(), Error> {
        if self.boot_setup_done {
            tracing::debug!("Process boot setup already done");
            return Ok(());
        }
        if self.phase != LifecyclePhase::Booting {
            return Err(BootError::StepFailed {
                step: "process_boot".to_string(),
                reason: format!("worker is {}", self.phase),
            }
            .into());
        }

        tracing::info!(
            identity = %self.config.identity,
            multi_tenant = self.config.multi_tenant,
            "Worker process booting"
        );

        self.deps
            .engine
            .set_identity(&self.config.identity)
            .map_err(BootError::from)?;
        self.deps
            .engine
            .init_pool(self.config.pool)
            .map_err(BootError::from)?;

        for module in &self.config.task_modules {
            self.registry.register(module.clone())?;
        }
        tracing::info!(modules = ?self.registry.modules(), "Task modules registered");

        self.boot_setup_done = true;
        Ok(())
    }

    /// Negotiate process mode, wait for every dependency, then run the
    /// single-tenant secondary init. Any failure is fatal to boot.
    pub async fn on_worker_init(&mut self) -> Result<Ready, Error> {
        tracing::info!("Worker init received");
        if !self.boot_setup_done {
            self.on_process_boot()?;
        }

        self.transition(
            LifecyclePhase::CheckingDependencies,
            Some("boot setup complete".to_string()),
        )?;

        match self.check_dependencies().await {
            Ok(ready) => {
                self.registry.seal();
                self.ready = Some(ready.clone());
                Ok(ready)
            }
            Err(e) => {
                tracing::error!(error = %e, "Worker boot failed");
                let _ = self.notify_tx.send(LifecycleNotification::BootFailed {
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    async fn check_dependencies(&mut self) -> Result<Ready, BootError> {
        if self.process_mode.is_none() {
            let mode = process_mode::select_process_mode(self.deps.process_strategy.as_mut());
            self.process_mode = Some(mode);
        }

        let wait = self.config.wait;
        let checks = [
            DependencyCheck::new("broker", Arc::clone(&self.deps.dependencies.broker), wait),
            DependencyCheck::new("database", Arc::clone(&self.deps.dependencies.database), wait),
            DependencyCheck::new("search", Arc::clone(&self.deps.dependencies.search), wait),
        ];
        let ready = probes::await_ready(&checks).await?;

        if self.config.multi_tenant {
            tracing::info!("Multi-tenant deployment, skipping secondary worker init");
        } else {
            tracing::info!("Running secondary worker init");
            self.deps.secondary_init.run().await?;
        }

        Ok(ready)
    }

    /// Open task intake. Only valid after every dependency check passed.
    pub async fn on_worker_ready(&mut self) -> Result<(), Error> {
        let Some(ready) = self.ready.clone() else {
            return Err(BootError::StepFailed {
                step: "worker_ready".to_string(),
                reason: "dependencies have not been verified".to_string(),
            }
            .into());
        };

        self.transition(LifecyclePhase::Ready, Some("dependencies ready".to_string()))?;
        self.write_ready_file().await;

        let process_mode = self.process_mode.unwrap_or(ProcessMode::Default);
        tracing::info!(
            process_mode = %process_mode,
            dependencies = ?ready.dependencies,
            elapsed_ms = ready.elapsed.as_millis() as u64,
            "Worker ready, accepting tasks"
        );
        let _ = self.notify_tx.send(LifecycleNotification::Ready {
            process_mode,
            dependencies: ready.dependencies,
        });
        Ok(())
    }

    /// Stop intake, drain in-flight work, release resources, stop.
    ///
    /// Drain failures are logged and never prevent reaching `Stopped`.
    pub async fn on_worker_shutdown(&mut self) -> Result<(), Error> {
        if matches!(
            self.phase,
            LifecyclePhase::ShuttingDown | LifecyclePhase::Stopped
        ) {
            tracing::debug!(phase = %self.phase, "Shutdown already in progress");
            return Ok(());
        }

        self.transition(
            LifecyclePhase::ShuttingDown,
            Some("shutdown requested".to_string()),
        )?;
        self.remove_ready_file().await;

        if let Some(drain) = &self.deps.drain {
            let failures = drain.drain().await;
            for failure in &failures {
                tracing::warn!(
                    task_id = %failure.task_id,
                    reason = %failure.reason,
                    "Task failed while draining"
                );
            }
        }

        let abandoned = self.deps.instrumentation.in_flight().await;
        if abandoned > 0 {
            tracing::warn!(count = abandoned, "Tasks still in flight at shutdown");
        }

        self.deps.engine.close();
        self.transition(LifecyclePhase::Stopped, Some("drain complete".to_string()))?;
        let _ = self.notify_tx.send(LifecycleNotification::Stopped);
        tracing::info!("Worker stopped");
        Ok(())
    }

    fn transition(
        &mut self,
        to: LifecyclePhase,
        reason: Option<String>,
    ) -> Result<(), LifecycleError> {
        let from = self.phase;
        if !from.can_transition_to(to) {
            tracing::warn!(from = %from, to = %to, "Rejected lifecycle transition");
            return Err(LifecycleError::InvalidTransition { from, to });
        }

        self.transitions.push(PhaseTransition {
            from,
            to,
            timestamp: Utc::now(),
            reason,
        });
        if self.transitions.len() > MAX_TRANSITIONS {
            let drain_count = self.transitions.len() - MAX_TRANSITIONS;
            self.transitions.drain(..drain_count);
        }

        self.phase = to;
        tracing::info!(from = %from, to = %to, "Lifecycle phase changed");
        let _ = self
            .notify_tx
            .send(LifecycleNotification::PhaseChanged { from, to });
        Ok(())
    }

    async fn write_ready_file(&self) {
        let Some(path) = &self.config.ready_file else {
            return;
        };
        match tokio::fs::write(path, Utc::now().to_rfc3339()).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Readiness marker written"),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write readiness marker")
            }
        }
    }

    async fn remove_ready_file(&self) {
        let Some(path) = &self.config.ready_file else {
            return;
        };
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Readiness marker removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove readiness marker")
            }
        }
    }
}
