//! The built-in workflow definitions.
//!
//! Three canonical processes ship with the engine:
//! - `document_processing` -- classify, extract, validate, and gate
//!   documents on human review when confidence or category demands it
//! - `land_acquisition` -- score parcels, run diligence, negotiate terms,
//!   and gate lease execution on mandatory legal sign-off
//! - `project_lifecycle` -- track a project from prospecting to the final
//!   notice-to-proceed decision
//!
//! Collaborator clients and the interrupt gate are injected here and
//! handed to each node's constructor, so definitions capture nothing
//! implicitly.

pub mod document_processing;
pub mod land_acquisition;
pub mod project_lifecycle;

use std::sync::Arc;

use crate::collaborator::{BoxAdvisoryService, BoxDocumentIntelligence};
use crate::workflow::definition::DefinitionError;
use crate::workflow::interrupt::Interrupter;
use crate::workflow::registry::WorkflowRegistry;

/// Collaborator clients shared by the built-in definitions.
#[derive(Clone)]
pub struct Collaborators {
    pub documents: Arc<BoxDocumentIntelligence>,
    pub advisor: Arc<BoxAdvisoryService>,
}

/// Build a registry holding the three built-in definitions.
pub fn build_registry(
    collaborators: &Collaborators,
    gate: Arc<dyn Interrupter>,
) -> Result<WorkflowRegistry, DefinitionError> {
    let mut registry = WorkflowRegistry::new();
    registry
        .register(document_processing::definition(
            Arc::clone(&collaborators.documents),
            Arc::clone(&gate),
        )?)
        .expect("fresh registry");
    registry
        .register(land_acquisition::definition(
            Arc::clone(&collaborators.advisor),
            Arc::clone(&gate),
        )?)
        .expect("fresh registry");
    registry
        .register(project_lifecycle::definition(Arc::clone(&gate))?)
        .expect("fresh registry");
    Ok(registry)
}
