//! The interrupt gate: raising review requests and pausing instances.
//!
//! A node that needs a human decision calls the gate, which creates one
//! pending review request and flips the owning workflow to `paused` in the
//! checkpoint store. Idempotence is a caller-side contract: a gate node
//! must check the data bag for an existing human response before raising,
//! otherwise crash-recovery re-entries would create duplicate requests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use siteflow_types::error::RepositoryError;
use siteflow_types::event::WorkflowEvent;
use siteflow_types::review::{ReviewRequest, ReviewUrgency};
use siteflow_types::workflow::{WorkflowCheckpoint, WorkflowStatus};

use crate::event::EventBus;
use crate::repository::checkpoint::{CheckpointPatch, CheckpointRepository};
use crate::repository::review::ReviewRepository;

/// Errors from interrupt gate operations.
#[derive(Debug, thiserror::Error)]
pub enum InterruptError {
    /// The review request or pause write failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// What kind of review a node is requesting.
#[derive(Debug, Clone)]
pub struct InterruptOptions {
    /// Request type surfaced to the review queue (e.g. "legal_review").
    pub request_type: String,
    /// How urgently the queue should surface this request.
    pub urgency: ReviewUrgency,
    /// Snapshot of the workflow data relevant to the decision.
    pub context: Value,
}

/// Object-safe gate handle held by nodes.
///
/// `InterruptGate` is generic over its repositories; this trait erases
/// those parameters so node constructors can take a plain `Arc`.
pub trait Interrupter: Send + Sync {
    /// Create a pending review request and pause the owning workflow.
    fn raise<'a>(
        &'a self,
        checkpoint: &'a WorkflowCheckpoint,
        reason: &'a str,
        options: InterruptOptions,
    ) -> Pin<Box<dyn Future<Output = Result<(), InterruptError>> + Send + 'a>>;
}

/// The interrupt gate implementation.
pub struct InterruptGate<C, V> {
    checkpoints: Arc<C>,
    reviews: Arc<V>,
    events: EventBus,
}

impl<C: CheckpointRepository, V: ReviewRepository> InterruptGate<C, V> {
    pub fn new(checkpoints: Arc<C>, reviews: Arc<V>, events: EventBus) -> Self {
        Self {
            checkpoints,
            reviews,
            events,
        }
    }

    async fn raise_inner(
        &self,
        checkpoint: &WorkflowCheckpoint,
        reason: &str,
        options: InterruptOptions,
    ) -> Result<(), InterruptError> {
        let request = ReviewRequest::new(
            checkpoint.tenant_id.clone(),
            checkpoint.workflow_id,
            options.request_type.clone(),
            options.urgency,
            reason.to_string(),
            options.context,
        );

        self.reviews.create(&request).await?;
        self.checkpoints
            .update(
                &checkpoint.workflow_id,
                &CheckpointPatch::status(WorkflowStatus::Paused),
            )
            .await?;

        tracing::info!(
            workflow_id = %checkpoint.workflow_id,
            node = checkpoint.current_node.as_str(),
            request_type = options.request_type.as_str(),
            urgency = ?options.urgency,
            "raised review request, workflow paused"
        );

        self.events.publish(WorkflowEvent::InstancePaused {
            workflow_id: checkpoint.workflow_id,
            node: checkpoint.current_node.clone(),
            request_type: options.request_type,
        });

        Ok(())
    }
}

impl<C: CheckpointRepository, V: ReviewRepository> Interrupter for InterruptGate<C, V> {
    fn raise<'a>(
        &'a self,
        checkpoint: &'a WorkflowCheckpoint,
        reason: &'a str,
        options: InterruptOptions,
    ) -> Pin<Box<dyn Future<Output = Result<(), InterruptError>> + Send + 'a>> {
        Box::pin(self.raise_inner(checkpoint, reason, options))
    }
}
