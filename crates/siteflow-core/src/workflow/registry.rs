//! Workflow registry: immutable mapping from type name to definition.
//!
//! Built once at wiring time and passed into the engine explicitly, so
//! tests can inject doubles and no global mutable state exists.

use std::collections::HashMap;
use std::sync::Arc;

use super::definition::WorkflowDefinition;

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No definition is registered under the requested type name.
    #[error("unknown workflow type: {0}")]
    DefinitionNotFound(String),

    /// A definition is already registered under this type name.
    #[error("workflow type already registered: {0}")]
    AlreadyRegistered(String),
}

/// Immutable name -> definition map.
pub struct WorkflowRegistry {
    definitions: HashMap<String, Arc<WorkflowDefinition>>,
}

impl WorkflowRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
        }
    }

    /// Register a definition under its own name.
    pub fn register(&mut self, definition: WorkflowDefinition) -> Result<(), RegistryError> {
        let name = definition.name().to_string();
        if self.definitions.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        tracing::info!(workflow_type = name.as_str(), "registered workflow type");
        self.definitions.insert(name, Arc::new(definition));
        Ok(())
    }

    /// Get a definition by type name.
    pub fn get(&self, workflow_type: &str) -> Result<Arc<WorkflowDefinition>, RegistryError> {
        self.definitions
            .get(workflow_type)
            .cloned()
            .ok_or_else(|| RegistryError::DefinitionNotFound(workflow_type.to_string()))
    }

    /// Whether a type name is registered.
    pub fn contains(&self, workflow_type: &str) -> bool {
        self.definitions.contains_key(workflow_type)
    }

    /// All registered type names.
    pub fn workflow_types(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(|s| s.as_str())
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("workflow_types", &self.definitions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::definition::Edge;
    use crate::workflow::node::{DynNode, Node, NodeError};
    use siteflow_types::workflow::{END_NODE, NodeUpdate, WorkflowCheckpoint};
    use std::sync::Arc as StdArc;

    struct NoopStep;

    impl Node for NoopStep {
        fn name(&self) -> &str {
            "noop"
        }

        async fn execute(
            &self,
            _checkpoint: &WorkflowCheckpoint,
        ) -> Result<NodeUpdate, NodeError> {
            Ok(NodeUpdate::default())
        }
    }

    fn trivial_definition(name: &str) -> WorkflowDefinition {
        let node: DynNode = StdArc::new(NoopStep);
        WorkflowDefinition::new(
            name,
            vec![node],
            vec![Edge::direct("noop", END_NODE)],
            "noop",
        )
        .unwrap()
    }

    #[test]
    fn register_and_get() {
        let mut registry = WorkflowRegistry::new();
        registry.register(trivial_definition("intake")).unwrap();

        assert!(registry.contains("intake"));
        assert!(!registry.contains("unknown"));
        assert_eq!(registry.get("intake").unwrap().name(), "intake");
    }

    #[test]
    fn unknown_type_fails() {
        let registry = WorkflowRegistry::new();
        let err = registry.get("unknown").unwrap_err();
        assert!(matches!(err, RegistryError::DefinitionNotFound(_)));
    }

    #[test]
    fn double_registration_rejected() {
        let mut registry = WorkflowRegistry::new();
        registry.register(trivial_definition("intake")).unwrap();
        let err = registry.register(trivial_definition("intake")).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(_)));
    }
}
