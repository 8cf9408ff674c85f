//! Collaborator service backends.
//!
//! `http` talks to remote document-intelligence and advisory services;
//! `heuristic` is a deterministic rule-based backend used as the offline
//! default and in integration tests.

pub mod heuristic;
pub mod http;

pub use heuristic::{HeuristicAdvisoryService, HeuristicDocumentIntelligence};
pub use http::{HttpAdvisoryService, HttpCollaboratorConfig, HttpDocumentIntelligence};
