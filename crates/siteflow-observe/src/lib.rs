//! Observability setup for Siteflow.

pub mod tracing_setup;
