//! Workflow domain types for Siteflow.
//!
//! Defines the persisted checkpoint record that is the canonical state of a
//! workflow instance, plus the supporting types that flow through the
//! engine: status enums, history entries, execution leases, human responses,
//! and the partial update a node returns from one execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Sentinel node name a fresh checkpoint starts on. The engine substitutes
/// the definition's entry point on first load.
pub const START_NODE: &str = "start";

/// Sentinel terminal node name. Reaching it completes the workflow.
pub const END_NODE: &str = "end";

/// Key under which a human response is merged into the checkpoint data bag.
pub const HITL_RESPONSE_KEY: &str = "hitl_response";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Overall status of a workflow instance.
///
/// `Completed`, `Failed`, and `Cancelled` are terminal. `Paused` means the
/// instance is waiting on an external human decision and may only advance
/// through an explicit resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    /// Whether this status permits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// The persisted snapshot of a workflow instance's progress.
///
/// The checkpoint store owns the canonical copy; the engine holds only an
/// in-memory working copy per loop iteration and reloads before each node
/// execution to observe externally applied pauses or cancellations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowCheckpoint {
    /// UUIDv7 instance ID, immutable once created.
    pub workflow_id: Uuid,
    /// Owning tenant.
    pub tenant_id: String,
    /// Name of the registered workflow definition this instance executes.
    pub workflow_type: String,
    /// Current instance status.
    pub status: WorkflowStatus,
    /// Name of the node the loop will execute next, or a sentinel.
    pub current_node: String,
    /// Open key-value state bag. Updates are shallow-merged: new keys
    /// overwrite, unspecified keys persist.
    pub data: Map<String, Value>,
    /// Append-only record of every node execution, in order.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Error message if the instance failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Execution lease held by the loop currently driving this instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease: Option<ExecutionLease>,
    /// When the instance was created.
    pub created_at: DateTime<Utc>,
    /// When the checkpoint was last written.
    pub updated_at: DateTime<Utc>,
}

impl WorkflowCheckpoint {
    /// Build the initial checkpoint for a freshly started instance.
    pub fn new(
        workflow_id: Uuid,
        tenant_id: String,
        workflow_type: String,
        input: Map<String, Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            workflow_id,
            tenant_id,
            workflow_type,
            status: WorkflowStatus::Pending,
            current_node: START_NODE.to_string(),
            data: input,
            history: Vec::new(),
            error: None,
            lease: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Shallow-merge a partial data update into the state bag.
    ///
    /// New keys overwrite existing ones; keys absent from `update` persist.
    pub fn merge_data(&mut self, update: &Map<String, Value>) {
        for (key, value) in update {
            self.data.insert(key.clone(), value.clone());
        }
    }

    /// The human response merged in by a resume, if any.
    pub fn hitl_response(&self) -> Option<HumanResponse> {
        self.data
            .get(HITL_RESPONSE_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// One entry in a checkpoint's append-only execution history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Name of the node that executed.
    pub node: String,
    /// When the node's output was recorded.
    pub timestamp: DateTime<Utc>,
    /// The data delta the node produced.
    pub data: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Execution lease
// ---------------------------------------------------------------------------

/// Persisted single-flight lease on a workflow instance.
///
/// Exactly one execution loop may hold a live lease at a time; a loop that
/// cannot acquire it exits without executing anything. Renewed on every
/// iteration, so a crashed owner's lease simply expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLease {
    /// Worker identity of the loop holding the lease.
    pub owner: Uuid,
    /// When the lease lapses if not renewed.
    pub expires_at: DateTime<Utc>,
}

impl ExecutionLease {
    /// Whether the lease is still live at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

// ---------------------------------------------------------------------------
// Human response
// ---------------------------------------------------------------------------

/// The decision an external reviewer supplies when resuming a paused
/// workflow. Merged into the data bag under [`HITL_RESPONSE_KEY`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanResponse {
    /// Whether the reviewer approved the pending action.
    pub approved: bool,
    /// Free-form reviewer notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Identity of the resolver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

// ---------------------------------------------------------------------------
// Node update
// ---------------------------------------------------------------------------

/// The partial state update a node returns from one execution.
///
/// `data` is shallow-merged into the checkpoint's bag and recorded as the
/// history delta. A node that has requested suspension through the
/// interrupt gate also sets `status` to `Paused` so the merged checkpoint
/// stops the loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeUpdate {
    /// Keys to shallow-merge into the checkpoint data bag.
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Status override, if the node transitions the instance itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkflowStatus>,
}

impl NodeUpdate {
    /// An update carrying only data keys.
    pub fn with_data(data: Map<String, Value>) -> Self {
        Self { data, status: None }
    }

    /// An update that pauses the instance, carrying any data produced so far.
    pub fn paused(data: Map<String, Value>) -> Self {
        Self {
            data,
            status: Some(WorkflowStatus::Paused),
        }
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
        input.insert("confidence".to_string(), json!(0.95));
        WorkflowCheckpoint::new(
            Uuid::now_v7(),
            "tenant-a".to_string(),
            "document_processing".to_string(),
            input,
        )
    }

    #[test]
    fn new_checkpoint_starts_pending_on_start_sentinel() {
        let cp = sample_checkpoint();
        assert_eq!(cp.status, WorkflowStatus::Pending);
        assert_eq!(cp.current_node, START_NODE);
        assert!(cp.history.is_empty());
        assert!(cp.error.is_none());
        assert!(cp.lease.is_none());
    }

    #[test]
    fn merge_data_overwrites_new_keys_and_keeps_others() {
        let mut cp = sample_checkpoint();
        let mut update = Map::new();
        update.insert("confidence".to_string(), json!(0.5));
        update.insert("requires_hitl".to_string(), json!(true));

        cp.merge_data(&update);

        assert_eq!(cp.data["category"], json!("survey"));
        assert_eq!(cp.data["confidence"], json!(0.5));
        assert_eq!(cp.data["requires_hitl"], json!(true));
    }

    #[test]
    fn hitl_response_roundtrips_through_data_bag() {
        let mut cp = sample_checkpoint();
        assert!(cp.hitl_response().is_none());

        let response = HumanResponse {
            approved: true,
            notes: Some("looks good".to_string()),
            resolved_by: Some("reviewer@acme".to_string()),
        };
        cp.data.insert(
            HITL_RESPONSE_KEY.to_string(),
            serde_json::to_value(&response).unwrap(),
        );

        let parsed = cp.hitl_response().unwrap();
        assert!(parsed.approved);
        assert_eq!(parsed.notes.as_deref(), Some("looks good"));
    }

    #[test]
    fn status_terminality() {
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
        assert!(WorkflowStatus::Cancelled.is_terminal());
        assert!(!WorkflowStatus::Paused.is_terminal());
        assert!(!WorkflowStatus::Running.is_terminal());
        assert!(!WorkflowStatus::Pending.is_terminal());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&WorkflowStatus::Paused).unwrap();
        assert_eq!(json, "\"paused\"");
        let parsed: WorkflowStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, WorkflowStatus::Completed);
    }

    #[test]
    fn lease_liveness() {
        let lease = ExecutionLease {
            owner: Uuid::now_v7(),
            expires_at: Utc::now() + chrono::Duration::seconds(30),
        };
        assert!(lease.is_live(Utc::now()));
        assert!(!lease.is_live(Utc::now() + chrono::Duration::seconds(60)));
    }

    #[test]
    fn checkpoint_json_roundtrip() {
        let mut cp = sample_checkpoint();
        cp.history.push(HistoryEntry {
            node: "classify".to_string(),
            timestamp: Utc::now(),
            data: Map::new(),
        });
        cp.lease = Some(ExecutionLease {
            owner: Uuid::now_v7(),
            expires_at: Utc::now(),
        });

        let json_str = serde_json::to_string(&cp).unwrap();
        let parsed: WorkflowCheckpoint = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.workflow_id, cp.workflow_id);
        assert_eq!(parsed.history.len(), 1);
        assert_eq!(parsed.history[0].node, "classify");
        assert!(parsed.lease.is_some());
    }

    #[test]
    fn node_update_paused_sets_status() {
        let update = NodeUpdate::paused(Map::new());
        assert_eq!(update.status, Some(WorkflowStatus::Paused));

        let update = NodeUpdate::with_data(Map::new());
        assert!(update.status.is_none());
    }
}
