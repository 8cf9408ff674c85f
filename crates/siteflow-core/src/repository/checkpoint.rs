//! Checkpoint repository trait definition.
//!
//! The checkpoint store exclusively owns the canonical workflow state.
//! The engine holds only an in-memory working copy per loop iteration and
//! reloads before each node execution, so externally applied pauses and
//! cancellations are always observed.
//!
//! Uses native async fn in traits (Rust 2024 edition, no async_trait macro).

use std::time::Duration;

use serde_json::{Map, Value};
use uuid::Uuid;

use siteflow_types::error::RepositoryError;
use siteflow_types::workflow::{WorkflowCheckpoint, WorkflowStatus};

/// Partial checkpoint update applied by [`CheckpointRepository::update`].
///
/// Fields left `None` are untouched. `data` is shallow-merged into the
/// stored bag: provided keys overwrite, all other keys persist.
#[derive(Debug, Clone, Default)]
pub struct CheckpointPatch {
    /// New status, if transitioning.
    pub status: Option<WorkflowStatus>,
    /// New current node, if advancing.
    pub current_node: Option<String>,
    /// Keys to shallow-merge into the data bag.
    pub data: Option<Map<String, Value>>,
    /// Error message to record.
    pub error: Option<String>,
}

impl CheckpointPatch {
    /// Patch that only transitions the status.
    pub fn status(status: WorkflowStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch that only advances the current node.
    pub fn current_node(node: impl Into<String>) -> Self {
        Self {
            current_node: Some(node.into()),
            ..Self::default()
        }
    }

    /// Patch that records a failure.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(WorkflowStatus::Failed),
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Storage port for workflow checkpoints.
///
/// No transactional guarantee is assumed beyond last-writer-wins on
/// `save`/`update`; single-flight execution is enforced by the lease
/// operations, which implementations must apply atomically.
///
/// The execution lease is managed exclusively through
/// `try_acquire_lease`/`release_lease`: `save` and `update` must leave the
/// stored lease untouched, so a loop writing its working copy never
/// clobbers ownership it no longer holds.
pub trait CheckpointRepository: Send + Sync {
    /// Persist the full checkpoint (create or overwrite).
    fn save(
        &self,
        checkpoint: &WorkflowCheckpoint,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Load a checkpoint by workflow ID.
    fn load(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowCheckpoint>, RepositoryError>> + Send;

    /// Apply a partial update. Touches `updated_at`. Fails with
    /// [`RepositoryError::NotFound`] for an unknown ID.
    fn update(
        &self,
        workflow_id: &Uuid,
        patch: &CheckpointPatch,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Atomically acquire (or renew) the execution lease.
    ///
    /// Succeeds when the stored lease is absent, expired, or already held
    /// by `owner`; the expiry is then set to now + `ttl`. Returns `false`
    /// when another owner holds a live lease.
    fn try_acquire_lease(
        &self,
        workflow_id: &Uuid,
        owner: Uuid,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Release the lease if held by `owner`. A no-op otherwise.
    fn release_lease(
        &self,
        workflow_id: &Uuid,
        owner: Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List checkpoints in a given status (recovery sweeps, dashboards).
    fn list_by_status(
        &self,
        status: WorkflowStatus,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowCheckpoint>, RepositoryError>> + Send;
}
