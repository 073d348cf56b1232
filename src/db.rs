//! Database engine — identity tagging and a bounded connection pool.
//!
//! The worker never shares an engine across processes; the identity and the
//! pool are each set once during boot and read-only afterwards.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::DatabaseError;

/// Connection pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionPoolConfig {
    /// Connections kept open by the pool.
    pub base_size: usize,
    /// Extra connections allowed under load.
    pub max_overflow: usize,
    /// Longest a caller waits for a free connection.
    pub timeout: Duration,
}

impl ConnectionPoolConfig {
    /// Upper bound on concurrently checked-out connections, or `None` if the
    /// sizing overflows.
    pub fn capacity(&self) -> Option<usize> {
        self.base_size.checked_add(self.max_overflow)
    }
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            base_size: 4,
            max_overflow: 12,
            timeout: Duration::from_secs(30),
        }
    }
}

/// The boot-time surface of the database engine.
pub trait DatabaseEngine: Send + Sync {
    /// Tag connections with the worker's role. Called once, before `init_pool`.
    fn set_identity(&self, label: &str) -> Result<(), DatabaseError>;

    /// Size the connection pool. Called once, after `set_identity`.
    fn init_pool(&self, config: ConnectionPoolConfig) -> Result<(), DatabaseError>;

    /// Release pooled connections. Safe to call more than once.
    fn close(&self);
}

struct Pool {
    config: ConnectionPoolConfig,
    permits: Arc<Semaphore>,
}

/// A checked-out connection slot; returned to the pool on drop.
#[derive(Debug)]
pub struct PooledConnection {
    identity: String,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Identity label the connection was opened under.
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

/// Process-local SQL engine.
#[derive(Default)]
pub struct SqlEngine {
    identity: OnceLock<String>,
    pool: OnceLock<Pool>,
}

impl SqlEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity label, once set.
    pub fn identity(&self) -> Option<&str> {
        self.identity.get().map(String::as_str)
    }

    /// The pool sizing, once initialized.
    pub fn pool_config(&self) -> Option<ConnectionPoolConfig> {
        self.pool.get().map(|p| p.config)
    }

    /// Number of connections that can be checked out right now.
    pub fn available(&self) -> usize {
        self.pool
            .get()
            .map(|p| p.permits.available_permits())
            .unwrap_or(0)
    }

    /// Check out a connection, waiting at most the configured pool timeout.
    pub async fn acquire(&self) -> Result<PooledConnection, DatabaseError> {
        let pool = self.pool.get().ok_or(DatabaseError::PoolNotInitialized)?;
        let identity = self.identity().unwrap_or_default().to_string();

        match tokio::time::timeout(pool.config.timeout, pool.permits.clone().acquire_owned()).await
        {
            Ok(Ok(permit)) => Ok(PooledConnection {
                identity,
                _permit: permit,
            }),
            Ok(Err(_)) => Err(DatabaseError::PoolClosed),
            Err(_) => Err(DatabaseError::PoolExhausted {
                timeout: pool.config.timeout,
            }),
        }
    }
}

impl DatabaseEngine for SqlEngine {
    fn set_identity(&self, label: &str) -> Result<(), DatabaseError> {
        if let Err(rejected) = self.identity.set(label.to_string()) {
            tracing::warn!(identity = %rejected, "Database identity already set");
            return Err(DatabaseError::IdentityAlreadySet(
                self.identity().unwrap_or_default().to_string(),
            ));
        }
        tracing::debug!(identity = %label, "Database identity set");
        Ok(())
    }

    fn init_pool(&self, config: ConnectionPoolConfig) -> Result<(), DatabaseError> {
        if self.identity.get().is_none() {
            return Err(DatabaseError::IdentityNotSet);
        }
        if config.base_size == 0 {
            return Err(DatabaseError::InvalidPoolSize(
                "base_size must be at least 1".to_string(),
            ));
        }

        let capacity = match config.capacity() {
            Some(n) if n <= Semaphore::MAX_PERMITS => n,
            _ => {
                return Err(DatabaseError::InvalidPoolSize(format!(
                    "base_size {} + max_overflow {} exceeds {}",
                    config.base_size,
                    config.max_overflow,
                    Semaphore::MAX_PERMITS
                )));
            }
        };

        let pool = Pool {
            config,
            permits: Arc::new(Semaphore::new(capacity)),
        };
        self.pool
            .set(pool)
            .map_err(|_| DatabaseError::PoolAlreadyInitialized)?;

        tracing::info!(
            pool_size = config.base_size,
            max_overflow = config.max_overflow,
            "Database pool initialized"
        );
        Ok(())
    }

    fn close(&self) {
        if let Some(pool) = self.pool.get()
            && !pool.permits.is_closed()
        {
            pool.permits.close();
            tracing::info!("Database pool closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_pool(timeout: Duration) -> ConnectionPoolConfig {
        ConnectionPoolConfig {
            base_size: 1,
            max_overflow: 1,
            timeout,
        }
    }

    #[test]
    fn identity_is_set_once() {
        let engine = SqlEngine::new();
        engine.set_identity("heavy").unwrap();
        let err = engine.set_identity("light").unwrap_err();
        assert_eq!(err, DatabaseError::IdentityAlreadySet("heavy".into()));
        assert_eq!(engine.identity(), Some("heavy"));
    }

    #[test]
    fn pool_requires_identity_first() {
        let engine = SqlEngine::new();
        let err = engine.init_pool(ConnectionPoolConfig::default()).unwrap_err();
        assert_eq!(err, DatabaseError::IdentityNotSet);
    }

    #[test]
    fn pool_is_initialized_once() {
        let engine = SqlEngine::new();
        engine.set_identity("heavy").unwrap();
        engine.init_pool(ConnectionPoolConfig::default()).unwrap();
        assert_eq!(engine.available(), 16);
        assert_eq!(
            engine.init_pool(ConnectionPoolConfig::default()).unwrap_err(),
            DatabaseError::PoolAlreadyInitialized
        );
    }

    #[test]
    fn zero_base_size_rejected() {
        let engine = SqlEngine::new();
        engine.set_identity("heavy").unwrap();
        let cfg = ConnectionPoolConfig {
            base_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            engine.init_pool(cfg),
            Err(DatabaseError::InvalidPoolSize(_))
        ));
    }

    #[test]
    fn overflowing_pool_size_rejected() {
        let engine = SqlEngine::new();
        engine.set_identity("heavy").unwrap();
        let cfg = ConnectionPoolConfig {
            max_overflow: usize::MAX,
            ..Default::default()
        };
        assert_eq!(cfg.capacity(), None);
        assert!(matches!(
            engine.init_pool(cfg),
            Err(DatabaseError::InvalidPoolSize(_))
        ));
        assert!(engine.pool_config().is_none());
    }

    #[test]
    fn pool_size_above_permit_limit_rejected() {
        let engine = SqlEngine::new();
        engine.set_identity("heavy").unwrap();
        let cfg = ConnectionPoolConfig {
            base_size: Semaphore::MAX_PERMITS,
            max_overflow: 1,
            ..Default::default()
        };
        assert!(matches!(
            engine.init_pool(cfg),
            Err(DatabaseError::InvalidPoolSize(_))
        ));
    }

    #[tokio::test]
    async fn exhausted_pool_waits_then_fails() {
        let engine = SqlEngine::new();
        engine.set_identity("heavy").unwrap();
        engine.init_pool(small_pool(Duration::from_millis(20))).unwrap();

        let a = engine.acquire().await.unwrap();
        let _b = engine.acquire().await.unwrap();
        assert_eq!(a.identity(), "heavy");
        assert_eq!(engine.available(), 0);

        let err = engine.acquire().await.unwrap_err();
        assert!(matches!(err, DatabaseError::PoolExhausted { .. }));

        drop(a);
        assert!(engine.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn closed_pool_rejects_acquire() {
        let engine = SqlEngine::new();
        engine.set_identity("heavy").unwrap();
        engine.init_pool(small_pool(Duration::from_secs(1))).unwrap();
        engine.close();
        engine.close();
        assert_eq!(engine.acquire().await.unwrap_err(), DatabaseError::PoolClosed);
    }

    #[tokio::test]
    async fn acquire_before_init_fails() {
        let engine = SqlEngine::new();
        assert_eq!(
            engine.acquire().await.unwrap_err(),
            DatabaseError::PoolNotInitialized
        );
    }
}
