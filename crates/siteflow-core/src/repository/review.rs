//! Review request repository trait definition.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use siteflow_types::error::RepositoryError;
use siteflow_types::review::{ReviewRequest, ReviewStatus};

/// Storage port for review requests raised by the interrupt gate.
pub trait ReviewRepository: Send + Sync {
    /// Persist a new review request.
    fn create(
        &self,
        request: &ReviewRequest,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a review request by ID.
    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ReviewRequest>, RepositoryError>> + Send;

    /// List requests in a given status, oldest first.
    fn list_by_status(
        &self,
        status: ReviewStatus,
    ) -> impl std::future::Future<Output = Result<Vec<ReviewRequest>, RepositoryError>> + Send;

    /// List all requests raised for a workflow instance.
    fn list_for_workflow(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ReviewRequest>, RepositoryError>> + Send;

    /// Record a resolution, stamping `resolved_at`. Fails with
    /// [`RepositoryError::NotFound`] for an unknown ID.
    fn resolve(
        &self,
        id: &Uuid,
        status: ReviewStatus,
        resolved_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
