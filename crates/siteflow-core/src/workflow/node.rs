//! The `Node` trait: one named, sequential processing step.
//!
//! Each node bundles identity (`name`) and behavior (`execute`). Nodes
//! receive the current checkpoint read-only and return a partial state
//! update; the engine owns merging, history, and persistence. Collaborator
//! clients and the interrupt gate are injected into node constructors, so
//! nothing is captured implicitly.
//!
//! `Node` uses RPITIT and is not object-safe; `NodeDyn` provides the boxed
//! companion (same blanket-impl pattern as the collaborator wrappers) so
//! definitions can hold heterogeneous node collections.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use siteflow_types::workflow::{NodeUpdate, WorkflowCheckpoint};

use super::interrupt::InterruptError;

/// Errors a node may raise during execution.
///
/// Any error here is fatal to the current run: the engine records it and
/// sets the instance to `failed`. Collaborator failures are expected to be
/// folded into the node's output data instead, so they never surface here.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The interrupt gate could not raise a review request.
    #[error("interrupt error: {0}")]
    Interrupt(#[from] InterruptError),

    /// The checkpoint data bag is missing something the node cannot
    /// proceed without.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// One named, sequential processing step in a workflow definition.
pub trait Node: Send + Sync {
    /// The node's unique name within its definition.
    fn name(&self) -> &str;

    /// Execute against the current checkpoint, returning a partial update.
    fn execute(
        &self,
        checkpoint: &WorkflowCheckpoint,
    ) -> impl Future<Output = Result<NodeUpdate, NodeError>> + Send;
}

/// Object-safe version of [`Node`] with a boxed future.
pub trait NodeDyn: Send + Sync {
    fn name(&self) -> &str;

    fn execute_boxed<'a>(
        &'a self,
        checkpoint: &'a WorkflowCheckpoint,
    ) -> Pin<Box<dyn Future<Output = Result<NodeUpdate, NodeError>> + Send + 'a>>;
}

/// Blanket implementation: any `Node` automatically implements `NodeDyn`.
impl<T: Node> NodeDyn for T {
    fn name(&self) -> &str {
        Node::name(self)
    }

    fn execute_boxed<'a>(
        &'a self,
        checkpoint: &'a WorkflowCheckpoint,
    ) -> Pin<Box<dyn Future<Output = Result<NodeUpdate, NodeError>> + Send + 'a>> {
        Box::pin(self.execute(checkpoint))
    }
}

/// Shared handle to a type-erased node.
pub type DynNode = Arc<dyn NodeDyn>;
