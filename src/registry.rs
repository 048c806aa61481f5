//! In-memory process registry.
//!
//! Resolves a process id (plus an optional namespace) to its
//! [`ProcessContract`]. Registries are built once at startup and shared
//! read-only across graphs, typically behind an [`Arc`].

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::process::{ProcessContract, ProcessRunner, ProcessSpec};

/// Namespace used when none is given.
pub const DEFAULT_NAMESPACE: &str = "backend";

/// Maps `(namespace, process id)` to process contracts.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    namespaces: FxHashMap<String, FxHashMap<String, Arc<ProcessContract>>>,
}

impl ProcessRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a contract in the default namespace. Re-registering an id
    /// replaces the earlier entry.
    pub fn add(&mut self, contract: ProcessContract) {
        self.add_to_namespace(DEFAULT_NAMESPACE, contract);
    }

    /// Registers a contract in the given namespace.
    pub fn add_to_namespace(&mut self, namespace: &str, contract: ProcessContract) {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(contract.id().to_string(), Arc::new(contract));
    }

    /// Registers a declaration-only process from its wire specification.
    pub fn add_spec(&mut self, spec: &Value) -> Result<(), serde_json::Error> {
        let spec: ProcessSpec = serde_json::from_value(spec.clone())?;
        self.add(ProcessContract::new(spec));
        Ok(())
    }

    /// Registers a process specification together with its executable body.
    pub fn add_process(
        &mut self,
        spec: &Value,
        runner: Arc<dyn ProcessRunner>,
    ) -> Result<(), serde_json::Error> {
        let spec: ProcessSpec = serde_json::from_value(spec.clone())?;
        self.add(ProcessContract::with_runner(spec, runner));
        Ok(())
    }

    /// Looks up a process. `None` as namespace means the default namespace.
    #[must_use]
    pub fn get(&self, id: &str, namespace: Option<&str>) -> Option<Arc<ProcessContract>> {
        self.namespaces
            .get(namespace.unwrap_or(DEFAULT_NAMESPACE))
            .and_then(|processes| processes.get(id))
            .cloned()
    }

    #[must_use]
    pub fn has(&self, id: &str, namespace: Option<&str>) -> bool {
        self.get(id, namespace).is_some()
    }

    /// Number of processes registered across all namespaces.
    #[must_use]
    pub fn count(&self) -> usize {
        self.namespaces.values().map(FxHashMap::len).sum()
    }

    /// Registered namespace names, sorted.
    #[must_use]
    pub fn namespaces(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.namespaces.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Contracts of one namespace, sorted by process id.
    #[must_use]
    pub fn processes(&self, namespace: Option<&str>) -> Vec<Arc<ProcessContract>> {
        let mut contracts: Vec<Arc<ProcessContract>> = self
            .namespaces
            .get(namespace.unwrap_or(DEFAULT_NAMESPACE))
            .map(|processes| processes.values().cloned().collect())
            .unwrap_or_default();
        contracts.sort_by(|a, b| a.id().cmp(b.id()));
        contracts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn absolute_spec() -> Value {
        json!({
            "id": "absolute",
            "parameters": [{"name": "x", "schema": {"type": ["number", "null"]}}],
            "returns": {"schema": {"type": ["number", "null"]}}
        })
    }

    #[test]
    fn default_namespace_lookup() {
        let mut registry = ProcessRegistry::new();
        registry.add_spec(&absolute_spec()).unwrap();
        assert!(registry.has("absolute", None));
        assert!(registry.has("absolute", Some(DEFAULT_NAMESPACE)));
        assert!(!registry.has("absolute", Some("math")));
        assert!(!registry.has("add", None));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn namespaced_lookup() {
        let mut registry = ProcessRegistry::new();
        let spec: ProcessSpec = serde_json::from_value(absolute_spec()).unwrap();
        registry.add_to_namespace("math", ProcessContract::new(spec));
        assert!(registry.has("absolute", Some("math")));
        assert!(!registry.has("absolute", None));
        assert_eq!(registry.namespaces(), vec!["math"]);
        assert_eq!(registry.processes(Some("math")).len(), 1);
    }
}
