//! TCP reachability probe.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::config::Endpoint;
use crate::error::ProbeError;
use crate::probes::Probe;

/// Ready once a TCP connection to the endpoint can be opened.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    name: String,
    endpoint: Endpoint,
    connect_timeout: Duration,
}

impl TcpProbe {
    pub fn new(name: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            name: name.into(),
            endpoint,
            connect_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<(), ProbeError> {
        let addr = (self.endpoint.host.as_str(), self.endpoint.port);
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(ProbeError::Unreachable {
                name: self.name.clone(),
                reason: format!("{}: {e}", self.endpoint),
            }),
            Err(_) => Err(ProbeError::Timeout {
                name: self.name.clone(),
                timeout: self.connect_timeout,
            }),
        }
    }
}
