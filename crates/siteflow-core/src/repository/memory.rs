//! In-memory repository backends.
//!
//! DashMap-backed implementations of the checkpoint and review ports.
//! Used by engine tests and by embedded deployments that do not need
//! durability across process restarts. Lease operations use DashMap's
//! per-entry locking, so acquire/renew is atomic.

use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::{Map, Value};
use uuid::Uuid;

use siteflow_types::error::RepositoryError;
use siteflow_types::review::{ReviewRequest, ReviewStatus};
use siteflow_types::workflow::{ExecutionLease, WorkflowCheckpoint, WorkflowStatus};

use super::checkpoint::{CheckpointPatch, CheckpointRepository};
use super::review::ReviewRepository;

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

/// In-memory checkpoint store.
#[derive(Default)]
pub struct MemoryCheckpointRepository {
    records: DashMap<Uuid, WorkflowCheckpoint>,
}

impl MemoryCheckpointRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored checkpoints.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CheckpointRepository for MemoryCheckpointRepository {
    async fn save(&self, checkpoint: &WorkflowCheckpoint) -> Result<(), RepositoryError> {
        let mut stored = checkpoint.clone();
        stored.updated_at = Utc::now();
        // The lease column is owned by the lease operations; a full save
        // must not clobber it.
        if let Some(existing) = self.records.get(&checkpoint.workflow_id) {
            stored.lease = existing.lease;
        }
        drop(self.records.insert(checkpoint.workflow_id, stored));
        Ok(())
    }

    async fn load(&self, workflow_id: &Uuid) -> Result<Option<WorkflowCheckpoint>, RepositoryError> {
        Ok(self.records.get(workflow_id).map(|r| r.clone()))
    }

    async fn update(
        &self,
        workflow_id: &Uuid,
        patch: &CheckpointPatch,
    ) -> Result<(), RepositoryError> {
        let mut entry = self
            .records
            .get_mut(workflow_id)
            .ok_or(RepositoryError::NotFound)?;

        if let Some(status) = patch.status {
            entry.status = status;
        }
        if let Some(node) = &patch.current_node {
            entry.current_node = node.clone();
        }
        if let Some(data) = &patch.data {
            merge_shallow(&mut entry.data, data);
        }
        if let Some(error) = &patch.error {
            entry.error = Some(error.clone());
        }
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn try_acquire_lease(
        &self,
        workflow_id: &Uuid,
        owner: Uuid,
        ttl: Duration,
    ) -> Result<bool, RepositoryError> {
        let mut entry = self
            .records
            .get_mut(workflow_id)
            .ok_or(RepositoryError::NotFound)?;

        let now = Utc::now();
        let available = match &entry.lease {
            None => true,
            Some(lease) => lease.owner == owner || !lease.is_live(now),
        };
        if !available {
            return Ok(false);
        }

        entry.lease = Some(ExecutionLease {
            owner,
            expires_at: now
                + chrono::Duration::from_std(ttl)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?,
        });
        Ok(true)
    }

    async fn release_lease(&self, workflow_id: &Uuid, owner: Uuid) -> Result<(), RepositoryError> {
        if let Some(mut entry) = self.records.get_mut(workflow_id) {
            if entry.lease.is_some_and(|lease| lease.owner == owner) {
                entry.lease = None;
            }
        }
        Ok(())
    }

    async fn list_by_status(
        &self,
        status: WorkflowStatus,
    ) -> Result<Vec<WorkflowCheckpoint>, RepositoryError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.clone())
            .collect())
    }
}

fn merge_shallow(target: &mut Map<String, Value>, update: &Map<String, Value>) {
    for (key, value) in update {
        target.insert(key.clone(), value.clone());
    }
}

// ---------------------------------------------------------------------------
// Reviews
// ---------------------------------------------------------------------------

/// In-memory review request store.
#[derive(Default)]
pub struct MemoryReviewRepository {
    records: DashMap<Uuid, ReviewRequest>,
}

impl MemoryReviewRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReviewRepository for MemoryReviewRepository {
    async fn create(&self, request: &ReviewRequest) -> Result<(), RepositoryError> {
        drop(self.records.insert(request.id, request.clone()));
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<ReviewRequest>, RepositoryError> {
        Ok(self.records.get(id).map(|r| r.clone()))
    }

    async fn list_by_status(
        &self,
        status: ReviewStatus,
    ) -> Result<Vec<ReviewRequest>, RepositoryError> {
        let mut requests: Vec<ReviewRequest> = self
            .records
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.clone())
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    async fn list_for_workflow(
        &self,
        workflow_id: &Uuid,
    ) -> Result<Vec<ReviewRequest>, RepositoryError> {
        let mut requests: Vec<ReviewRequest> = self
            .records
            .iter()
            .filter(|r| r.workflow_id == *workflow_id)
            .map(|r| r.clone())
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    async fn resolve(
        &self,
        id: &Uuid,
        status: ReviewStatus,
        resolved_at: chrono::DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut entry = self.records.get_mut(id).ok_or(RepositoryError::NotFound)?;
        entry.status = status;
        entry.resolved_at = Some(resolved_at);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_checkpoint() -> WorkflowCheckpoint {
        let mut input = Map::new();
        input.insert("category".to_string(), json!("survey"));
        WorkflowCheckpoint::new(
            Uuid::now_v7(),
            "tenant-a".to_string(),
            "document_processing".to_string(),
            input,
        )
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let repo = MemoryCheckpointRepository::new();
        let cp = sample_checkpoint();

        repo.save(&cp).await.unwrap();
        let loaded = repo.load(&cp.workflow_id).await.unwrap().unwrap();
        assert_eq!(loaded.workflow_id, cp.workflow_id);
        assert_eq!(loaded.data["category"], json!("survey"));

        assert!(repo.load(&Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_merges_data_shallowly() {
        let repo = MemoryCheckpointRepository::new();
        let cp = sample_checkpoint();
        repo.save(&cp).await.unwrap();

        let mut data = Map::new();
        data.insert("confidence".to_string(), json!(0.8));
        let patch = CheckpointPatch {
            status: Some(WorkflowStatus::Running),
            data: Some(data),
            ..Default::default()
        };
        repo.update(&cp.workflow_id, &patch).await.unwrap();

        let loaded = repo.load(&cp.workflow_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, WorkflowStatus::Running);
        assert_eq!(loaded.data["category"], json!("survey"));
        assert_eq!(loaded.data["confidence"], json!(0.8));
        assert!(loaded.updated_at >= cp.updated_at);
    }

    #[tokio::test]
    async fn update_unknown_id_fails() {
        let repo = MemoryCheckpointRepository::new();
        let err = repo
            .update(&Uuid::now_v7(), &CheckpointPatch::status(WorkflowStatus::Running))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn lease_is_single_flight() {
        let repo = MemoryCheckpointRepository::new();
        let cp = sample_checkpoint();
        repo.save(&cp).await.unwrap();

        let ttl = Duration::from_secs(30);
        let first = Uuid::now_v7();
        let second = Uuid::now_v7();

        assert!(repo.try_acquire_lease(&cp.workflow_id, first, ttl).await.unwrap());
        // Another owner is refused while the lease is live.
        assert!(!repo.try_acquire_lease(&cp.workflow_id, second, ttl).await.unwrap());
        // The holder may renew.
        assert!(repo.try_acquire_lease(&cp.workflow_id, first, ttl).await.unwrap());

        repo.release_lease(&cp.workflow_id, first).await.unwrap();
        assert!(repo.try_acquire_lease(&cp.workflow_id, second, ttl).await.unwrap());
    }

    #[tokio::test]
    async fn expired_lease_can_be_taken_over() {
        let repo = MemoryCheckpointRepository::new();
        let cp = sample_checkpoint();
        repo.save(&cp).await.unwrap();

        let first = Uuid::now_v7();
        assert!(
            repo.try_acquire_lease(&cp.workflow_id, first, Duration::from_millis(0))
                .await
                .unwrap()
        );

        let second = Uuid::now_v7();
        assert!(
            repo.try_acquire_lease(&cp.workflow_id, second, Duration::from_secs(30))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn save_preserves_stored_lease() {
        let repo = MemoryCheckpointRepository::new();
        let cp = sample_checkpoint();
        repo.save(&cp).await.unwrap();

        let owner = Uuid::now_v7();
        repo.try_acquire_lease(&cp.workflow_id, owner, Duration::from_secs(30))
            .await
            .unwrap();

        // A stale working copy without the lease must not clear it.
        repo.save(&cp).await.unwrap();
        let loaded = repo.load(&cp.workflow_id).await.unwrap().unwrap();
        assert_eq!(loaded.lease.unwrap().owner, owner);
    }

    #[tokio::test]
    async fn list_by_status_filters() {
        let repo = MemoryCheckpointRepository::new();
        let mut running = sample_checkpoint();
        running.status = WorkflowStatus::Running;
        let paused = sample_checkpoint();
        repo.save(&running).await.unwrap();
        repo.save(&paused).await.unwrap();

        let found = repo.list_by_status(WorkflowStatus::Running).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].workflow_id, running.workflow_id);
    }

    #[tokio::test]
    async fn review_lifecycle() {
        let repo = MemoryReviewRepository::new();
        let request = ReviewRequest::new(
            "tenant-a".to_string(),
            Uuid::now_v7(),
            "legal_review".to_string(),
            siteflow_types::review::ReviewUrgency::High,
            "sign-off".to_string(),
            json!({}),
        );
        repo.create(&request).await.unwrap();

        let pending = repo.list_by_status(ReviewStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);

        repo.resolve(&request.id, ReviewStatus::Approved, Utc::now())
            .await
            .unwrap();
        let resolved = repo.get(&request.id).await.unwrap().unwrap();
        assert_eq!(resolved.status, ReviewStatus::Approved);
        assert!(resolved.resolved_at.is_some());
        assert!(repo.list_by_status(ReviewStatus::Pending).await.unwrap().is_empty());
    }
}
