//! Repository trait definitions and in-memory backends.
//!
//! The checkpoint and review repositories are the engine's storage ports.
//! siteflow-infra implements them with SQLite; `memory` provides
//! DashMap-backed implementations for tests and embedded use.

pub mod checkpoint;
pub mod memory;
pub mod review;

pub use checkpoint::{CheckpointPatch, CheckpointRepository};
pub use memory::{MemoryCheckpointRepository, MemoryReviewRepository};
pub use review::ReviewRepository;
