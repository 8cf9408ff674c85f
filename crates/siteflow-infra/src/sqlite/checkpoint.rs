//! SQLite checkpoint repository implementation.
//!
//! Implements `CheckpointRepository` from `siteflow-core` using sqlx with
//! split read/write pools. The data bag and history are stored as JSON
//! blobs; the execution lease lives in its own columns and is written only
//! by the lease operations, so `save`/`update` can never clobber loop
//! ownership. Lease acquisition is a single guarded UPDATE, which SQLite's
//! serialized writer makes atomic.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::Row;
use uuid::Uuid;

use siteflow_core::repository::checkpoint::{CheckpointPatch, CheckpointRepository};
use siteflow_types::error::RepositoryError;
use siteflow_types::workflow::{
    ExecutionLease, HistoryEntry, WorkflowCheckpoint, WorkflowStatus,
};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `CheckpointRepository`.
pub struct SqliteCheckpointRepository {
    pool: DatabasePool,
}

impl SqliteCheckpointRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct CheckpointRow {
    workflow_id: String,
    tenant_id: String,
    workflow_type: String,
    status: String,
    current_node: String,
    data: String,
    history: String,
    error: Option<String>,
    lease_owner: Option<String>,
    lease_expires_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl CheckpointRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            workflow_id: row.try_get("workflow_id")?,
            tenant_id: row.try_get("tenant_id")?,
            workflow_type: row.try_get("workflow_type")?,
            status: row.try_get("status")?,
            current_node: row.try_get("current_node")?,
            data: row.try_get("data")?,
            history: row.try_get("history")?,
            error: row.try_get("error")?,
            lease_owner: row.try_get("lease_owner")?,
            lease_expires_at: row.try_get("lease_expires_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_checkpoint(self) -> Result<WorkflowCheckpoint, RepositoryError> {
        let workflow_id = parse_uuid(&self.workflow_id)?;
        let status = parse_status(&self.status)?;

        let data: Map<String, Value> = serde_json::from_str(&self.data)
            .map_err(|e| RepositoryError::Query(format!("invalid data JSON: {e}")))?;
        let history: Vec<HistoryEntry> = serde_json::from_str(&self.history)
            .map_err(|e| RepositoryError::Query(format!("invalid history JSON: {e}")))?;

        let lease = match (self.lease_owner.as_deref(), self.lease_expires_at.as_deref()) {
            (Some(owner), Some(expires_at)) => Some(ExecutionLease {
                owner: parse_uuid(owner)?,
                expires_at: parse_datetime(expires_at)?,
            }),
            _ => None,
        };

        Ok(WorkflowCheckpoint {
            workflow_id,
            tenant_id: self.tenant_id,
            workflow_type: self.workflow_type,
            status,
            current_node: self.current_node,
            data,
            history,
            error: self.error,
            lease,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_status(s: &str) -> Result<WorkflowStatus, RepositoryError> {
    serde_json::from_value(Value::String(s.to_string()))
        .map_err(|_| RepositoryError::Query(format!("invalid workflow status: {s}")))
}

fn status_str(status: WorkflowStatus) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| "pending".to_string())
}

// ---------------------------------------------------------------------------
// CheckpointRepository impl
// ---------------------------------------------------------------------------

impl CheckpointRepository for SqliteCheckpointRepository {
    async fn save(&self, checkpoint: &WorkflowCheckpoint) -> Result<(), RepositoryError> {
        let data_json = serde_json::to_string(&checkpoint.data)
            .map_err(|e| RepositoryError::Query(format!("serialize data: {e}")))?;
        let history_json = serde_json::to_string(&checkpoint.history)
            .map_err(|e| RepositoryError::Query(format!("serialize history: {e}")))?;
        let now = format_datetime(&Utc::now());

        // Lease columns are deliberately absent from the upsert arm: the
        // stored lease belongs to the lease operations alone.
        sqlx::query(
            r#"INSERT INTO workflow_checkpoints
               (workflow_id, tenant_id, workflow_type, status, current_node,
                data, history, error, lease_owner, lease_expires_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?)
               ON CONFLICT(workflow_id) DO UPDATE SET
                 status = excluded.status,
                 current_node = excluded.current_node,
                 data = excluded.data,
                 history = excluded.history,
                 error = excluded.error,
                 updated_at = excluded.updated_at"#,
        )
        .bind(checkpoint.workflow_id.to_string())
        .bind(&checkpoint.tenant_id)
        .bind(&checkpoint.workflow_type)
        .bind(status_str(checkpoint.status))
        .bind(&checkpoint.current_node)
        .bind(&data_json)
        .bind(&history_json)
        .bind(&checkpoint.error)
        .bind(format_datetime(&checkpoint.created_at))
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn load(
        &self,
        workflow_id: &Uuid,
    ) -> Result<Option<WorkflowCheckpoint>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM workflow_checkpoints WHERE workflow_id = ?")
            .bind(workflow_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = CheckpointRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_checkpoint()?))
            }
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        workflow_id: &Uuid,
        patch: &CheckpointPatch,
    ) -> Result<(), RepositoryError> {
        // Shallow merge happens in Rust: read the stored bag, overlay the
        // patch keys, write the merged blob back.
        let row = sqlx::query("SELECT data FROM workflow_checkpoints WHERE workflow_id = ?")
            .bind(workflow_id.to_string())
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Err(RepositoryError::NotFound);
        };

        let stored: String = row
            .try_get("data")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let mut data: Map<String, Value> = serde_json::from_str(&stored)
            .map_err(|e| RepositoryError::Query(format!("invalid data JSON: {e}")))?;
        if let Some(patch_data) = &patch.data {
            for (key, value) in patch_data {
                data.insert(key.clone(), value.clone());
            }
        }
        let data_json = serde_json::to_string(&data)
            .map_err(|e| RepositoryError::Query(format!("serialize data: {e}")))?;

        sqlx::query(
            r#"UPDATE workflow_checkpoints
               SET status = COALESCE(?, status),
                   current_node = COALESCE(?, current_node),
                   data = ?,
                   error = COALESCE(?, error),
                   updated_at = ?
               WHERE workflow_id = ?"#,
        )
        .bind(patch.status.map(status_str))
        .bind(&patch.current_node)
        .bind(&data_json)
        .bind(&patch.error)
        .bind(format_datetime(&Utc::now()))
        .bind(workflow_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn try_acquire_lease(
        &self,
        workflow_id: &Uuid,
        owner: Uuid,
        ttl: Duration,
    ) -> Result<bool, RepositoryError> {
        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(ttl)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            r#"UPDATE workflow_checkpoints
               SET lease_owner = ?, lease_expires_at = ?
               WHERE workflow_id = ?
                 AND (lease_owner IS NULL
                      OR lease_owner = ?
                      OR lease_expires_at < ?)"#,
        )
        .bind(owner.to_string())
        .bind(format_datetime(&expires_at))
        .bind(workflow_id.to_string())
        .bind(owner.to_string())
        .bind(format_datetime(&now))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Distinguish a contested lease from a missing checkpoint.
        let exists =
            sqlx::query("SELECT 1 FROM workflow_checkpoints WHERE workflow_id = ?")
                .bind(workflow_id.to_string())
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }
        Ok(false)
    }

    async fn release_lease(&self, workflow_id: &Uuid, owner: Uuid) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"UPDATE workflow_checkpoints
               SET lease_owner = NULL, lease_expires_at = NULL
               WHERE workflow_id = ? AND lease_owner = ?"#,
        )
        .bind(workflow_id.to_string())
        .bind(owner.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_by_status(
        &self,
        status: WorkflowStatus,
    ) -> Result<Vec<WorkflowCheckpoint>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM workflow_checkpoints WHERE status = ? ORDER BY created_at ASC",
        )
        .bind(status_str(status))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut checkpoints = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = CheckpointRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            checkpoints.push(r.into_checkpoint()?);
        }
        Ok(checkpoints)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
