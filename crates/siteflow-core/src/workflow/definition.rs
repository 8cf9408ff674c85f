//! Workflow definitions: ordered nodes, edges, and an entry point.
//!
//! A definition is immutable once constructed. Structural constraints are
//! validated at construction time (duplicate node names, edges referencing
//! undefined nodes, missing entry point), so the engine never discovers a
//! malformed graph at runtime.

use std::collections::HashSet;
use std::sync::Arc;

use siteflow_types::workflow::{END_NODE, WorkflowCheckpoint};

use super::node::DynNode;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors raised when constructing a workflow definition.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    /// Definition has no nodes.
    #[error("workflow '{0}' has no nodes")]
    Empty(String),

    /// Two nodes share a name.
    #[error("workflow '{workflow}' has duplicate node '{node}'")]
    DuplicateNode { workflow: String, node: String },

    /// The entry point names no defined node.
    #[error("workflow '{workflow}' entry point '{entry_point}' is not a defined node")]
    UnknownEntryPoint {
        workflow: String,
        entry_point: String,
    },

    /// An edge's `from` names no defined node.
    #[error("workflow '{workflow}' edge from unknown node '{node}'")]
    EdgeFromUnknownNode { workflow: String, node: String },

    /// A static edge's `to` names no defined node (and is not the sink).
    #[error("workflow '{workflow}' edge to unknown node '{node}'")]
    EdgeToUnknownNode { workflow: String, node: String },

    /// Two edges leave the same node.
    #[error("workflow '{workflow}' has multiple edges from node '{node}'")]
    DuplicateEdge { workflow: String, node: String },
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

/// Where an edge leads: a literal node name, or a function of the current
/// state. Modeled as an enum so routing is exhaustively matched.
#[derive(Clone)]
pub enum EdgeTarget {
    /// Always route to the named node.
    Static(String),
    /// Route to the node the function selects from the current checkpoint.
    Computed(Arc<dyn Fn(&WorkflowCheckpoint) -> String + Send + Sync>),
}

impl std::fmt::Debug for EdgeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeTarget::Static(to) => f.debug_tuple("Static").field(to).finish(),
            EdgeTarget::Computed(_) => f.debug_tuple("Computed").field(&"<fn>").finish(),
        }
    }
}

/// A directed link from one node to the next.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Source node name.
    pub from: String,
    /// Destination: literal or computed.
    pub to: EdgeTarget,
}

impl Edge {
    /// Static edge between two named nodes (or to the terminal sink).
    pub fn direct(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: EdgeTarget::Static(to.into()),
        }
    }

    /// Edge whose destination is computed from the current state.
    pub fn computed<F>(from: impl Into<String>, select: F) -> Self
    where
        F: Fn(&WorkflowCheckpoint) -> String + Send + Sync + 'static,
    {
        Self {
            from: from.into(),
            to: EdgeTarget::Computed(Arc::new(select)),
        }
    }
}

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

/// An immutable workflow definition: ordered nodes, edges, entry point.
pub struct WorkflowDefinition {
    name: String,
    nodes: Vec<DynNode>,
    edges: Vec<Edge>,
    entry_point: String,
}

impl WorkflowDefinition {
    /// Construct and validate a definition.
    pub fn new(
        name: impl Into<String>,
        nodes: Vec<DynNode>,
        edges: Vec<Edge>,
        entry_point: impl Into<String>,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        let entry_point = entry_point.into();

        if nodes.is_empty() {
            return Err(DefinitionError::Empty(name));
        }

        let mut names = HashSet::new();
        for node in &nodes {
            if !names.insert(node.name().to_string()) {
                return Err(DefinitionError::DuplicateNode {
                    workflow: name,
                    node: node.name().to_string(),
                });
            }
        }

        if !names.contains(&entry_point) {
            return Err(DefinitionError::UnknownEntryPoint {
                workflow: name,
                entry_point,
            });
        }

        let mut edge_sources = HashSet::new();
        for edge in &edges {
            if !names.contains(&edge.from) {
                return Err(DefinitionError::EdgeFromUnknownNode {
                    workflow: name,
                    node: edge.from.clone(),
                });
            }
            if !edge_sources.insert(edge.from.clone()) {
                return Err(DefinitionError::DuplicateEdge {
                    workflow: name,
                    node: edge.from.clone(),
                });
            }
            if let EdgeTarget::Static(to) = &edge.to {
                if to != END_NODE && !names.contains(to) {
                    return Err(DefinitionError::EdgeToUnknownNode {
                        workflow: name,
                        node: to.clone(),
                    });
                }
            }
        }

        Ok(Self {
            name,
            nodes,
            edges,
            entry_point,
        })
    }

    /// The workflow type name this definition is registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node the loop starts on.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Look up a node by name.
    pub fn node(&self, name: &str) -> Option<&DynNode> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    /// Node names in definition order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.name())
    }

    /// Resolve the node that follows `current` for the given state.
    ///
    /// No outgoing edge means the workflow falls through to the terminal
    /// sink. A computed edge is invoked with the current checkpoint; if it
    /// selects a name outside the definition, the engine's node lookup
    /// surfaces that as a fatal error on the next iteration.
    pub fn next_node(&self, current: &str, checkpoint: &WorkflowCheckpoint) -> String {
        match self.edges.iter().find(|e| e.from == current) {
            None => END_NODE.to_string(),
            Some(edge) => match &edge.to {
                EdgeTarget::Static(to) => to.clone(),
                EdgeTarget::Computed(select) => select(checkpoint),
            },
        }
    }
}

impl std::fmt::Debug for WorkflowDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowDefinition")
            .field("name", &self.name)
            .field("nodes", &self.node_names().collect::<Vec<_>>())
            .field("entry_point", &self.entry_point)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::node::{Node, NodeError};
    use serde_json::{Map, json};
    use siteflow_types::workflow::NodeUpdate;
    use uuid::Uuid;

    struct NamedStep(&'static str);

    impl Node for NamedStep {
        fn name(&self) -> &str {
            self.0
        }

        async fn execute(
            &self,
            _checkpoint: &WorkflowCheckpoint,
        ) -> Result<NodeUpdate, NodeError> {
            Ok(NodeUpdate::default())
        }
    }

    fn step(name: &'static str) -> DynNode {
        Arc::new(NamedStep(name))
    }

    fn checkpoint_with(data: Map<String, serde_json::Value>) -> WorkflowCheckpoint {
        WorkflowCheckpoint::new(Uuid::now_v7(), "t".to_string(), "test".to_string(), data)
    }

    #[test]
    fn valid_definition_constructs() {
        let def = WorkflowDefinition::new(
            "intake",
            vec![step("a"), step("b")],
            vec![Edge::direct("a", "b"), Edge::direct("b", END_NODE)],
            "a",
        )
        .unwrap();

        assert_eq!(def.entry_point(), "a");
        assert!(def.node("a").is_some());
        assert!(def.node("missing").is_none());
        assert_eq!(def.node_names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn duplicate_node_rejected() {
        let err = WorkflowDefinition::new(
            "intake",
            vec![step("a"), step("a")],
            vec![],
            "a",
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateNode { .. }));
    }

    #[test]
    fn unknown_entry_point_rejected() {
        let err =
            WorkflowDefinition::new("intake", vec![step("a")], vec![], "missing").unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownEntryPoint { .. }));
    }

    #[test]
    fn edge_from_unknown_node_rejected() {
        let err = WorkflowDefinition::new(
            "intake",
            vec![step("a")],
            vec![Edge::direct("ghost", "a")],
            "a",
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::EdgeFromUnknownNode { .. }));
    }

    #[test]
    fn static_edge_to_unknown_node_rejected() {
        let err = WorkflowDefinition::new(
            "intake",
            vec![step("a")],
            vec![Edge::direct("a", "ghost")],
            "a",
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::EdgeToUnknownNode { .. }));
    }

    #[test]
    fn static_edge_to_sink_allowed() {
        let def = WorkflowDefinition::new(
            "intake",
            vec![step("a")],
            vec![Edge::direct("a", END_NODE)],
            "a",
        )
        .unwrap();
        let cp = checkpoint_with(Map::new());
        assert_eq!(def.next_node("a", &cp), END_NODE);
    }

    #[test]
    fn duplicate_edge_source_rejected() {
        let err = WorkflowDefinition::new(
            "intake",
            vec![step("a"), step("b")],
            vec![Edge::direct("a", "b"), Edge::direct("a", END_NODE)],
            "a",
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateEdge { .. }));
    }

    #[test]
    fn missing_edge_falls_through_to_sink() {
        let def =
            WorkflowDefinition::new("intake", vec![step("a")], vec![], "a").unwrap();
        let cp = checkpoint_with(Map::new());
        assert_eq!(def.next_node("a", &cp), END_NODE);
    }

    #[test]
    fn computed_edge_routes_on_state() {
        let def = WorkflowDefinition::new(
            "triage",
            vec![step("check"), step("fast"), step("slow")],
            vec![
                Edge::computed("check", |cp| {
                    if cp.data.get("urgent") == Some(&json!(true)) {
                        "fast".to_string()
                    } else {
                        "slow".to_string()
                    }
                }),
                Edge::direct("fast", END_NODE),
                Edge::direct("slow", END_NODE),
            ],
            "check",
        )
        .unwrap();

        let mut urgent = Map::new();
        urgent.insert("urgent".to_string(), json!(true));
        assert_eq!(def.next_node("check", &checkpoint_with(urgent)), "fast");
        assert_eq!(def.next_node("check", &checkpoint_with(Map::new())), "slow");
    }
}
