//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::db::ConnectionPoolConfig;
use crate::error::ConfigError;

/// Identity the heavy worker tags its database connections with.
pub const HEAVY_WORKER_IDENTITY: &str = "celery_worker_heavy";

/// Task-handler modules the heavy worker registers at boot.
pub const DEFAULT_TASK_MODULES: &[&str] = &[
    "pruning",
    "doc_permission_syncing",
    "external_group_syncing",
];

/// Marker file the primary worker writes once it is ready.
pub const DEFAULT_PRIMARY_READY_FILE: &str = "/tmp/primary_worker.ready";

/// How long to keep probing a dependency before boot is declared failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Delay between consecutive probe attempts.
    pub interval: Duration,
    /// Total time budget for one dependency.
    pub limit: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            limit: Duration::from_secs(60),
        }
    }
}

/// A `host:port` pair for a TCP-reachable dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Label tagging this worker's database pool.
    pub identity: String,
    /// Database pool sizing.
    pub pool: ConnectionPoolConfig,
    /// Shared multi-tenant deployment (skips secondary init).
    pub multi_tenant: bool,
    /// Message broker address.
    pub broker: Endpoint,
    /// Relational database address.
    pub database: Endpoint,
    /// Search index health endpoint.
    pub search_health_url: String,
    /// Retry budget applied to every dependency probe.
    pub wait: WaitPolicy,
    /// Marker file touched on ready and removed on shutdown.
    pub ready_file: Option<PathBuf>,
    /// Primary worker's marker file; single-tenant secondary init waits for it.
    pub primary_ready_file: PathBuf,
    /// Task-handler modules registered at boot.
    pub task_modules: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            identity: HEAVY_WORKER_IDENTITY.to_string(),
            pool: ConnectionPoolConfig::default(),
            multi_tenant: false,
            broker: Endpoint::new("localhost", 6379),
            database: Endpoint::new("localhost", 5432),
            search_health_url: "http://localhost:19071/state/v1/health".to_string(),
            wait: WaitPolicy::default(),
            ready_file: None,
            primary_ready_file: PathBuf::from(DEFAULT_PRIMARY_READY_FILE),
            task_modules: DEFAULT_TASK_MODULES.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl WorkerConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let identity = lookup("HEAVY_WORKER_IDENTITY").unwrap_or(defaults.identity);

        let pool = ConnectionPoolConfig {
            base_size: parse_or(&lookup, "HEAVY_WORKER_POOL_SIZE", defaults.pool.base_size)?,
            max_overflow: parse_or(
                &lookup,
                "HEAVY_WORKER_POOL_MAX_OVERFLOW",
                defaults.pool.max_overflow,
            )?,
            timeout: Duration::from_secs(parse_or(
                &lookup,
                "HEAVY_WORKER_POOL_TIMEOUT_SECS",
                defaults.pool.timeout.as_secs(),
            )?),
        };

        let multi_tenant = match lookup("MULTI_TENANT") {
            Some(raw) => parse_bool("MULTI_TENANT", &raw)?,
            None => defaults.multi_tenant,
        };

        let broker = Endpoint {
            host: lookup("BROKER_HOST").unwrap_or(defaults.broker.host),
            port: parse_or(&lookup, "BROKER_PORT", defaults.broker.port)?,
        };
        let database = Endpoint {
            host: lookup("DATABASE_HOST").unwrap_or(defaults.database.host),
            port: parse_or(&lookup, "DATABASE_PORT", defaults.database.port)?,
        };

        let search_health_url =
            lookup("SEARCH_HEALTH_URL").unwrap_or(defaults.search_health_url);

        let wait = WaitPolicy {
            interval: Duration::from_secs(parse_or(
                &lookup,
                "HEAVY_WORKER_WAIT_INTERVAL_SECS",
                defaults.wait.interval.as_secs(),
            )?),
            limit: Duration::from_secs(parse_or(
                &lookup,
                "HEAVY_WORKER_WAIT_LIMIT_SECS",
                defaults.wait.limit.as_secs(),
            )?),
        };

        let ready_file = lookup("HEAVY_WORKER_READY_FILE")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let primary_ready_file = lookup("PRIMARY_WORKER_READY_FILE")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.primary_ready_file);

        Ok(Self {
            identity,
            pool,
            multi_tenant,
            broker,
            database,
            search_health_url,
            wait,
            ready_file,
            primary_ready_file,
            task_modules: defaults.task_modules,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_heavy_worker() {
        let cfg = WorkerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(cfg.identity, HEAVY_WORKER_IDENTITY);
        assert_eq!(cfg.pool.base_size, 4);
        assert_eq!(cfg.pool.max_overflow, 12);
        assert!(!cfg.multi_tenant);
        assert_eq!(cfg.task_modules.len(), 3);
        assert!(cfg.ready_file.is_none());
        assert_eq!(
            cfg.primary_ready_file,
            PathBuf::from(DEFAULT_PRIMARY_READY_FILE)
        );
    }

    #[test]
    fn blank_primary_marker_keeps_default() {
        let cfg =
            WorkerConfig::from_lookup(lookup_from(&[("PRIMARY_WORKER_READY_FILE", "  ")])).unwrap();
        assert_eq!(
            cfg.primary_ready_file,
            PathBuf::from(DEFAULT_PRIMARY_READY_FILE)
        );
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = WorkerConfig::from_lookup(lookup_from(&[
            ("MULTI_TENANT", "true"),
            ("HEAVY_WORKER_POOL_SIZE", "8"),
            ("BROKER_HOST", "redis"),
            ("BROKER_PORT", "6380"),
            ("HEAVY_WORKER_WAIT_LIMIT_SECS", "120"),
            ("HEAVY_WORKER_READY_FILE", "/tmp/ready"),
        ]))
        .unwrap();
        assert!(cfg.multi_tenant);
        assert_eq!(cfg.pool.base_size, 8);
        assert_eq!(cfg.broker, Endpoint::new("redis", 6380));
        assert_eq!(cfg.wait.limit, Duration::from_secs(120));
        assert_eq!(cfg.ready_file, Some(PathBuf::from("/tmp/ready")));
    }

    #[test]
    fn invalid_number_is_rejected() {
        let err = WorkerConfig::from_lookup(lookup_from(&[("DATABASE_PORT", "five")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "DATABASE_PORT"));
    }

    #[test]
    fn invalid_bool_is_rejected() {
        let err = WorkerConfig::from_lookup(lookup_from(&[("MULTI_TENANT", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn endpoint_display() {
        assert_eq!(Endpoint::new("db", 5432).to_string(), "db:5432");
    }
}
