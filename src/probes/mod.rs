//! Dependency readiness checks.
//!
//! Each upstream dependency is probed until it reports ready or its wait
//! budget runs out. Checks run strictly one after another: later
//! dependencies may rely on earlier ones already being reachable.

pub mod file;
pub mod http;
pub mod pool;
pub mod tcp;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::config::WaitPolicy;
use crate::error::{BootError, ProbeError};

pub use file::MarkerFileProbe;
pub use http::HttpProbe;
pub use pool::PoolProbe;
pub use tcp::TcpProbe;

/// An idempotent readiness check against one dependency.
///
/// Implementations must be safe to call repeatedly and must not do anything
/// beyond establishing or verifying connectivity.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Short dependency name used in logs and errors.
    fn name(&self) -> &str;

    /// Check the dependency once.
    async fn probe(&self) -> Result<(), ProbeError>;
}

/// A named probe plus the budget it may spend becoming ready.
#[derive(Clone)]
pub struct DependencyCheck {
    name: String,
    probe: Arc<dyn Probe>,
    wait: WaitPolicy,
}

impl DependencyCheck {
    pub fn new(name: impl Into<String>, probe: Arc<dyn Probe>, wait: WaitPolicy) -> Self {
        Self {
            name: name.into(),
            probe,
            wait,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wait(&self) -> WaitPolicy {
        self.wait
    }
}

impl std::fmt::Debug for DependencyCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyCheck")
            .field("name", &self.name)
            .field("probe", &self.probe.name())
            .field("wait", &self.wait)
            .finish()
    }
}

/// Every dependency reported ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ready {
    /// Dependency names in the order they became ready.
    pub dependencies: Vec<String>,
    /// Wall-clock time spent across all checks.
    pub elapsed: Duration,
}

/// Probe one dependency until it is ready or the wait budget is spent.
///
/// Returns how long the dependency took to become ready.
pub async fn wait_for(check: &DependencyCheck) -> Result<Duration, BootError> {
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match check.probe.probe().await {
            Ok(()) => {
                let waited = started.elapsed();
                tracing::info!(
                    dependency = %check.name,
                    attempts = attempt,
                    waited_ms = waited.as_millis() as u64,
                    "Dependency ready"
                );
                return Ok(waited);
            }
            Err(e) => {
                let waited = started.elapsed();
                if waited >= check.wait.limit {
                    tracing::warn!(
                        dependency = %check.name,
                        attempts = attempt,
                        error = %e,
                        "Dependency not ready, giving up"
                    );
                    return Err(BootError::DependencyUnavailable {
                        name: check.name.clone(),
                        waited,
                        last_error: e,
                    });
                }
                tracing::debug!(
                    dependency = %check.name,
                    attempt,
                    error = %e,
                    "Dependency not ready, retrying"
                );
                tokio::time::sleep(check.wait.interval).await;
            }
        }
    }
}

/// Wait for every dependency, in the given order, one at a time.
///
/// The first dependency that exhausts its budget aborts the sequence; no
/// later dependency is probed.
pub async fn await_ready(checks: &[DependencyCheck]) -> Result<Ready, BootError> {
    let started = Instant::now();
    let mut dependencies = Vec::with_capacity(checks.len());

    for check in checks {
        tracing::info!(dependency = %check.name, "Waiting for dependency");
        wait_for(check).await?;
        dependencies.push(check.name.clone());
    }

    Ok(Ready {
        dependencies,
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    /// Fails a fixed number of times, then succeeds. Logs every call.
    struct FlakyProbe {
        name: String,
        failures_before_ready: u32,
        calls: AtomicU32,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl FlakyProbe {
        fn new(name: &str, failures: u32, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                failures_before_ready: failures,
                calls: AtomicU32::new(0),
                log,
            })
        }
    }

    #[async_trait]
    impl Probe for FlakyProbe {
        fn name(&self) -> &str {
            &self.name
        }

        async fn probe(&self) -> Result<(), ProbeError> {
            self.log.lock().unwrap().push(self.name.clone());
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_ready {
                Err(ProbeError::NotReady {
                    name: self.name.clone(),
                    reason: format!("attempt {n}"),
                })
            } else {
                Ok(())
            }
        }
    }

    fn fast(limit_ms: u64) -> WaitPolicy {
        WaitPolicy {
            interval: Duration::from_millis(1),
            limit: Duration::from_millis(limit_ms),
        }
    }

    #[tokio::test]
    async fn retries_until_ready() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let probe = FlakyProbe::new("broker", 3, log.clone());
        let check = DependencyCheck::new("broker", probe.clone(), fast(5_000));

        wait_for(&check).await.unwrap();
        assert_eq!(probe.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn exhausted_budget_is_fatal() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let probe = FlakyProbe::new("search", u32::MAX, log);
        let check = DependencyCheck::new("search", probe, fast(10));

        let err = wait_for(&check).await.unwrap_err();
        match err {
            BootError::DependencyUnavailable { name, last_error, .. } => {
                assert_eq!(name, "search");
                assert!(matches!(last_error, ProbeError::NotReady { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn zero_limit_probes_exactly_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let probe = FlakyProbe::new("database", 1, log);
        let check = DependencyCheck::new("database", probe.clone(), fast(0));

        assert!(wait_for(&check).await.is_err());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn later_dependency_waits_for_earlier() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let checks = vec![
            DependencyCheck::new("broker", FlakyProbe::new("broker", 2, log.clone()), fast(5_000)),
            DependencyCheck::new("database", FlakyProbe::new("database", 1, log.clone()), fast(5_000)),
            DependencyCheck::new("search", FlakyProbe::new("search", 0, log.clone()), fast(5_000)),
        ];

        let ready = await_ready(&checks).await.unwrap();
        assert_eq!(ready.dependencies, vec!["broker", "database", "search"]);

        let calls = log.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec!["broker", "broker", "broker", "database", "database", "search"]
        );
    }

    #[tokio::test]
    async fn failure_stops_the_sequence() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let checks = vec![
            DependencyCheck::new("broker", FlakyProbe::new("broker", 0, log.clone()), fast(0)),
            DependencyCheck::new("database", FlakyProbe::new("database", u32::MAX, log.clone()), fast(0)),
            DependencyCheck::new("search", FlakyProbe::new("search", 0, log.clone()), fast(0)),
        ];

        let err = await_ready(&checks).await.unwrap_err();
        assert!(err.to_string().contains("database"));
        assert!(!log.lock().unwrap().contains(&"search".to_string()));
    }
}
