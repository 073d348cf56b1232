//! HTTP health-endpoint probe.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProbeError;
use crate::probes::Probe;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Ready once the health URL answers 2xx and, if configured, a JSON field
/// in the body carries the expected value.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    name: String,
    url: String,
    client: reqwest::Client,
    timeout: Duration,
    expect: Option<(String, serde_json::Value)>,
}

impl HttpProbe {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(probe = %name, error = %e, "HTTP client setup failed, using defaults");
                reqwest::Client::default()
            });
        Self {
            name,
            url: url.into(),
            client,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            expect: None,
        }
    }

    /// Bound each health request; applied per request, independent of the client.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Require the JSON value at `pointer` (RFC 6901) to equal `value`.
    pub fn expect_json(mut self, pointer: impl Into<String>, value: serde_json::Value) -> Self {
        self.expect = Some((pointer.into(), value));
        self
    }

    /// Search index health: `{"status": {"code": "up"}}`.
    pub fn search_index(url: impl Into<String>) -> Self {
        Self::new("search", url).expect_json("/status/code", serde_json::json!("up"))
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<(), ProbeError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout {
                        name: self.name.clone(),
                        timeout: self.timeout,
                    }
                } else {
                    ProbeError::Unreachable {
                        name: self.name.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::NotReady {
                name: self.name.clone(),
                reason: format!("HTTP {status}"),
            });
        }

        let Some((pointer, expected)) = &self.expect else {
            return Ok(());
        };

        let body: serde_json::Value =
            response.json().await.map_err(|e| ProbeError::NotReady {
                name: self.name.clone(),
                reason: format!("invalid health body: {e}"),
            })?;

        match body.pointer(pointer) {
            Some(actual) if actual == expected => Ok(()),
            actual => Err(ProbeError::NotReady {
                name: self.name.clone(),
                reason: format!("{pointer} is {actual:?}, expected {expected}"),
            }),
        }
    }
}
