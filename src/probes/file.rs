//! Marker-file probe.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ProbeError;
use crate::probes::Probe;

/// Ready once a marker file exists, e.g. the readiness file another worker
/// writes when it comes up.
#[derive(Debug, Clone)]
pub struct MarkerFileProbe {
    name: String,
    path: PathBuf,
}

impl MarkerFileProbe {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl Probe for MarkerFileProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<(), ProbeError> {
        match tokio::fs::try_exists(&self.path).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ProbeError::NotReady {
                name: self.name.clone(),
                reason: format!("{} does not exist", self.path.display()),
            }),
            Err(e) => Err(ProbeError::Unreachable {
                name: self.name.clone(),
                reason: e.to_string(),
            }),
        }
    }
}
