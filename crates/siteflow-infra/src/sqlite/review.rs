//! SQLite review request repository implementation.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use siteflow_core::repository::review::ReviewRepository;
use siteflow_types::error::RepositoryError;
use siteflow_types::review::{ReviewRequest, ReviewStatus, ReviewUrgency};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ReviewRepository`.
pub struct SqliteReviewRepository {
    pool: DatabasePool,
}

impl SqliteReviewRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct ReviewRow {
    id: String,
    tenant_id: String,
    workflow_id: String,
    request_type: String,
    urgency: String,
    status: String,
    description: String,
    context: String,
    created_at: String,
    resolved_at: Option<String>,
}

impl ReviewRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            workflow_id: row.try_get("workflow_id")?,
            request_type: row.try_get("request_type")?,
            urgency: row.try_get("urgency")?,
            status: row.try_get("status")?,
            description: row.try_get("description")?,
            context: row.try_get("context")?,
            created_at: row.try_get("created_at")?,
            resolved_at: row.try_get("resolved_at")?,
        })
    }

    fn into_request(self) -> Result<ReviewRequest, RepositoryError> {
        let urgency: ReviewUrgency =
            serde_json::from_value(Value::String(self.urgency.clone()))
                .map_err(|_| RepositoryError::Query(format!("invalid urgency: {}", self.urgency)))?;
        let status: ReviewStatus = serde_json::from_value(Value::String(self.status.clone()))
            .map_err(|_| RepositoryError::Query(format!("invalid review status: {}", self.status)))?;
        let context: Value = serde_json::from_str(&self.context)
            .map_err(|e| RepositoryError::Query(format!("invalid context JSON: {e}")))?;

        Ok(ReviewRequest {
            id: parse_uuid(&self.id)?,
            tenant_id: self.tenant_id,
            workflow_id: parse_uuid(&self.workflow_id)?,
            request_type: self.request_type,
            urgency,
            status,
            description: self.description,
            context,
            created_at: parse_datetime(&self.created_at)?,
            resolved_at: self.resolved_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn enum_str<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// ReviewRepository impl
// ---------------------------------------------------------------------------

impl ReviewRepository for SqliteReviewRepository {
    async fn create(&self, request: &ReviewRequest) -> Result<(), RepositoryError> {
        let context_json = serde_json::to_string(&request.context)
            .map_err(|e| RepositoryError::Query(format!("serialize context: {e}")))?;

        sqlx::query(
            r#"INSERT INTO review_requests
               (id, tenant_id, workflow_id, request_type, urgency, status,
                description, context, created_at, resolved_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(request.id.to_string())
        .bind(&request.tenant_id)
        .bind(request.workflow_id.to_string())
        .bind(&request.request_type)
        .bind(enum_str(&request.urgency))
        .bind(enum_str(&request.status))
        .bind(&request.description)
        .bind(&context_json)
        .bind(request.created_at.to_rfc3339())
        .bind(request.resolved_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<ReviewRequest>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM review_requests WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = ReviewRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_request()?))
            }
            None => Ok(None),
        }
    }

    async fn list_by_status(
        &self,
        status: ReviewStatus,
    ) -> Result<Vec<ReviewRequest>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM review_requests WHERE status = ? ORDER BY created_at ASC",
        )
        .bind(enum_str(&status))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                ReviewRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_request()
            })
            .collect()
    }

    async fn list_for_workflow(
        &self,
        workflow_id: &Uuid,
    ) -> Result<Vec<ReviewRequest>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM review_requests WHERE workflow_id = ? ORDER BY created_at ASC",
        )
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                ReviewRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_request()
            })
            .collect()
    }

    async fn resolve(
        &self,
        id: &Uuid,
        status: ReviewStatus,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE review_requests SET status = ?, resolved_at = ? WHERE id = ?",
        )
        .bind(enum_str(&status))
        .bind(resolved_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
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

    async fn test_repo() -> (SqliteReviewRepository, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("reviews.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = DatabasePool::new(&url).await.unwrap();
        (SqliteReviewRepository::new(pool), dir)
    }

    fn sample_request(workflow_id: Uuid) -> ReviewRequest {
        ReviewRequest::new(
            "tenant-a".to_string(),
            workflow_id,
            "legal_review".to_string(),
            ReviewUrgency::High,
            "Lease package requires legal sign-off".to_string(),
            json!({ "parcel_count": 2 }),
        )
    }

    #[tokio::test]
    async fn create_and_get_roundtrip() {
        let (repo, _dir) = test_repo().await;
        let request = sample_request(Uuid::now_v7());
        repo.create(&request).await.unwrap();

        let loaded = repo.get(&request.id).await.unwrap().unwrap();
        assert_eq!(loaded.request_type, "legal_review");
        assert_eq!(loaded.urgency, ReviewUrgency::High);
        assert_eq!(loaded.status, ReviewStatus::Pending);
        assert_eq!(loaded.context["parcel_count"], json!(2));
        assert!(loaded.resolved_at.is_none());
    }

    #[tokio::test]
    async fn list_by_status_and_workflow() {
        let (repo, _dir) = test_repo().await;
        let workflow_id = Uuid::now_v7();
        let first = sample_request(workflow_id);
        let second = sample_request(workflow_id);
        let other = sample_request(Uuid::now_v7());
        repo.create(&first).await.unwrap();
        repo.create(&second).await.unwrap();
        repo.create(&other).await.unwrap();

        let pending = repo.list_by_status(ReviewStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 3);

        let for_workflow = repo.list_for_workflow(&workflow_id).await.unwrap();
        assert_eq!(for_workflow.len(), 2);
    }

    #[tokio::test]
    async fn resolve_updates_status_and_timestamp() {
        let (repo, _dir) = test_repo().await;
        let request = sample_request(Uuid::now_v7());
        repo.create(&request).await.unwrap();

        repo.resolve(&request.id, ReviewStatus::Approved, Utc::now())
            .await
            .unwrap();

        let loaded = repo.get(&request.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ReviewStatus::Approved);
        assert!(loaded.resolved_at.is_some());
        assert!(repo.list_by_status(ReviewStatus::Pending).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolve_unknown_id_fails() {
        let (repo, _dir) = test_repo().await;
        let err = repo
            .resolve(&Uuid::now_v7(), ReviewStatus::Rejected, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
