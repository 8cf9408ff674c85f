//! Workflow lifecycle events published on the engine's event bus.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events emitted as workflow instances move through their lifecycle.
///
/// Dashboards and operators subscribe to these; the engine itself never
/// depends on anyone listening.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A new instance was created and its loop launched.
    InstanceStarted {
        workflow_id: Uuid,
        workflow_type: String,
        tenant_id: String,
    },
    /// One node executed and its output was checkpointed.
    NodeCompleted {
        workflow_id: Uuid,
        node: String,
    },
    /// The instance paused awaiting a human decision.
    InstancePaused {
        workflow_id: Uuid,
        node: String,
        request_type: String,
    },
    /// A human decision arrived and the loop was relaunched.
    InstanceResumed {
        workflow_id: Uuid,
        node: String,
    },
    /// The instance reached the terminal sink.
    InstanceCompleted {
        workflow_id: Uuid,
    },
    /// The loop hit a fatal error and recorded it.
    InstanceFailed {
        workflow_id: Uuid,
        error: String,
    },
    /// The instance was cancelled by an operator.
    InstanceCancelled {
        workflow_id: Uuid,
    },
}
