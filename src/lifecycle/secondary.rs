//! Secondary worker initialization.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{WaitPolicy, WorkerConfig};
use crate::error::BootError;
use crate::lifecycle::orchestrator::SecondaryInit;
use crate::probes::{self, DependencyCheck, MarkerFileProbe, Probe};

/// Holds boot until the primary worker reports ready.
pub struct WaitForPrimary {
    check: DependencyCheck,
}

impl WaitForPrimary {
    pub fn new(probe: Arc<dyn Probe>, wait: WaitPolicy) -> Self {
        Self {
            check: DependencyCheck::new("primary_worker", probe, wait),
        }
    }

    /// Wait for the configured primary marker file under the worker's wait budget.
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(
            Arc::new(MarkerFileProbe::new(
                "primary_worker",
                config.primary_ready_file.clone(),
            )),
            config.wait,
        )
    }
}

#[async_trait]
impl SecondaryInit for WaitForPrimary {
    async fn run(&self) -> Result<(), BootError> {
        tracing::info!("Running as a secondary worker, waiting for the primary");
        probes::wait_for(&self.check).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn missing_primary_fails_boot() {
        let dir = tempfile::tempdir().unwrap();
        let probe = Arc::new(MarkerFileProbe::new("primary", dir.path().join("absent")));
        let init = WaitForPrimary::new(
            probe,
            WaitPolicy {
                interval: Duration::from_millis(1),
                limit: Duration::from_millis(5),
            },
        );

        let err = init.run().await.unwrap_err();
        assert!(err.to_string().contains("primary_worker"));
    }

    #[tokio::test]
    async fn configured_marker_is_awaited() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("primary.ready");
        tokio::fs::write(&marker, b"").await.unwrap();

        let config = WorkerConfig {
            primary_ready_file: marker,
            ..Default::default()
        };
        WaitForPrimary::from_config(&config).run().await.unwrap();
    }
}
