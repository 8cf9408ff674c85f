//! Workflow orchestration engine for Siteflow.
//!
//! This crate defines the "ports" (repository traits) that the
//! infrastructure layer implements, the collaborator traits for external
//! document-intelligence and advisory services, and the engine itself:
//! registry, node/edge model, checkpointed execution loop, and the
//! interrupt gate for human-in-the-loop pauses. It depends only on
//! `siteflow-types` -- never on `siteflow-infra` or any database/IO crate.

pub mod collaborator;
pub mod definitions;
pub mod event;
pub mod repository;
pub mod workflow;
