//! Task-handler module registry.

use std::collections::BTreeSet;

use crate::error::RegistryError;

/// Names of task-handler modules this worker serves.
///
/// Filled during boot, then sealed; the set is static for the rest of the
/// process lifetime.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    modules: BTreeSet<String>,
    sealed: bool,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Rejects duplicates and registration after sealing.
    pub fn register(&mut self, name: impl Into<String>) -> Result<(), RegistryError> {
        let name = name.into();
        if self.sealed {
            tracing::warn!(module = %name, "Rejected task module registration: registry sealed");
            return Err(RegistryError::Sealed { name });
        }
        if self.modules.contains(&name) {
            return Err(RegistryError::Duplicate { name });
        }
        tracing::debug!(module = %name, "Registered task module");
        self.modules.insert(name);
        Ok(())
    }

    /// Freeze the registry. Idempotent.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains(name)
    }

    /// Module names in sorted order.
    pub fn modules(&self) -> Vec<String> {
        self.modules.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
