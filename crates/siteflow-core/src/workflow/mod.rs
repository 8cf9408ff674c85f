//! Workflow engine core: node/edge model, registry, interrupt gate, and
//! the checkpointed execution loop.
//!
//! - `node` -- the `Node` trait and its dynamic-dispatch wrapper
//! - `definition` -- nodes + edges + entry point, validated at construction
//! - `registry` -- immutable name -> definition map injected into the engine
//! - `interrupt` -- the gate that raises review requests and pauses instances
//! - `engine` -- start/resume/cancel/status/recover and the execution loop

pub mod definition;
pub mod engine;
pub mod interrupt;
pub mod node;
pub mod registry;

pub use definition::{DefinitionError, Edge, EdgeTarget, WorkflowDefinition};
pub use engine::{EngineError, WorkflowEngine, WorkflowStatusReport};
pub use interrupt::{InterruptError, InterruptGate, InterruptOptions, Interrupter};
pub use node::{DynNode, Node, NodeError};
pub use registry::{RegistryError, WorkflowRegistry};
