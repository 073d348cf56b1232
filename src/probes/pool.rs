//! Database probe that goes through the connection pool.

use std::sync::Arc;

use async_trait::async_trait;

use crate::db::SqlEngine;
use crate::error::ProbeError;
use crate::probes::Probe;

/// Checks out a pooled connection, then runs the inner probe while holding it.
///
/// Proves both that the pool is usable under the worker's identity and that
/// the database behind it answers.
pub struct PoolProbe {
    engine: Arc<SqlEngine>,
    inner: Arc<dyn Probe>,
}

impl PoolProbe {
    pub fn new(engine: Arc<SqlEngine>, inner: Arc<dyn Probe>) -> Self {
        Self { engine, inner }
    }
}

#[async_trait]
impl Probe for PoolProbe {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn probe(&self) -> Result<(), ProbeError> {
        let conn = self
            .engine
            .acquire()
            .await
            .map_err(|e| ProbeError::NotReady {
                name: self.name().to_string(),
                reason: e.to_string(),
            })?;
        let result = self.inner.probe().await;
        drop(conn);
        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db::{ConnectionPoolConfig, DatabaseEngine};

    struct AlwaysReady;

    #[async_trait]
    impl Probe for AlwaysReady {
        fn name(&self) -> &str {
            "database"
        }

        async fn probe(&self) -> Result<(), ProbeError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn uninitialized_pool_is_not_ready() {
        let probe = PoolProbe::new(Arc::new(SqlEngine::new()), Arc::new(AlwaysReady));
        let err = probe.probe().await.unwrap_err();
        assert!(matches!(err, ProbeError::NotReady { .. }));
    }

    #[tokio::test]
    async fn connection_is_returned_after_probe() {
        let engine = Arc::new(SqlEngine::new());
        engine.set_identity("heavy").unwrap();
        engine
            .init_pool(ConnectionPoolConfig {
                base_size: 1,
                max_overflow: 0,
                timeout: Duration::from_millis(50),
            })
            .unwrap();

        let probe = PoolProbe::new(engine.clone(), Arc::new(AlwaysReady));
        probe.probe().await.unwrap();
        probe.probe().await.unwrap();
        assert_eq!(engine.available(), 1);
    }
}
