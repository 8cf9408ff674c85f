//! Project lifecycle: prospecting -> site_control -> development ->
//! construction_ready.
//!
//! The final node is an unconditional go/no-go gate before terminal
//! success: a rejected notice-to-proceed still completes the workflow, but
//! records the rejection in the data bag so the pipeline reflects the
//! decision rather than a failure.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use siteflow_types::review::ReviewUrgency;
use siteflow_types::workflow::{END_NODE, NodeUpdate, WorkflowCheckpoint};

use crate::workflow::definition::{DefinitionError, Edge, WorkflowDefinition};
use crate::workflow::interrupt::{InterruptOptions, Interrupter};
use crate::workflow::node::{DynNode, Node, NodeError};

/// Registered type name of this workflow.
pub const WORKFLOW_TYPE: &str = "project_lifecycle";

/// Build the project-lifecycle definition.
pub fn definition(gate: Arc<dyn Interrupter>) -> Result<WorkflowDefinition, DefinitionError> {
    let nodes: Vec<DynNode> = vec![
        Arc::new(Prospecting),
        Arc::new(SecureSiteControl),
        Arc::new(AdvanceDevelopment),
        Arc::new(NoticeToProceedGate { gate }),
    ];
    let edges = vec![
        Edge::direct("prospecting", "site_control"),
        Edge::direct("site_control", "development"),
        Edge::direct("development", "construction_ready"),
        Edge::direct("construction_ready", END_NODE),
    ];
    WorkflowDefinition::new(WORKFLOW_TYPE, nodes, edges, "prospecting")
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Shortlist candidate sites from the intake payload.
struct Prospecting;

impl Node for Prospecting {
    fn name(&self) -> &str {
        "prospecting"
    }

    async fn execute(&self, checkpoint: &WorkflowCheckpoint) -> Result<NodeUpdate, NodeError> {
        let candidates = checkpoint
            .data
            .get("candidate_sites")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);

        let mut data = Map::new();
        data.insert("phase".to_string(), json!("prospecting"));
        data.insert(
            "prospecting".to_string(),
            json!({
                "candidates": candidates,
                "shortlisted": candidates.min(3),
            }),
        );
        Ok(NodeUpdate::with_data(data))
    }
}

/// Record the site-control instruments securing the project.
struct SecureSiteControl;

impl Node for SecureSiteControl {
    fn name(&self) -> &str {
        "site_control"
    }

    async fn execute(&self, _checkpoint: &WorkflowCheckpoint) -> Result<NodeUpdate, NodeError> {
        let mut data = Map::new();
        data.insert("phase".to_string(), json!("site_control"));
        data.insert(
            "site_control".to_string(),
            json!({
                "instruments": ["option_agreement"],
                "secured": true,
            }),
        );
        Ok(NodeUpdate::with_data(data))
    }
}

/// Track development milestones toward construction readiness.
struct AdvanceDevelopment;

impl Node for AdvanceDevelopment {
    fn name(&self) -> &str {
        "development"
    }

    async fn execute(&self, _checkpoint: &WorkflowCheckpoint) -> Result<NodeUpdate, NodeError> {
        let mut data = Map::new();
        data.insert("phase".to_string(), json!("development"));
        data.insert(
            "development".to_string(),
            json!({
                "milestones": ["interconnection_filed", "permits_submitted"],
            }),
        );
        Ok(NodeUpdate::with_data(data))
    }
}

/// Unconditional final go/no-go gate before terminal success.
struct NoticeToProceedGate {
    gate: Arc<dyn Interrupter>,
}

impl Node for NoticeToProceedGate {
    fn name(&self) -> &str {
        "construction_ready"
    }

    async fn execute(&self, checkpoint: &WorkflowCheckpoint) -> Result<NodeUpdate, NodeError> {
        match checkpoint.hitl_response() {
            None => {
                self.gate
                    .raise(
                        checkpoint,
                        "Final notice-to-proceed decision required",
                        InterruptOptions {
                            request_type: "notice_to_proceed".to_string(),
                            urgency: ReviewUrgency::Critical,
                            context: json!({
                                "phase": checkpoint.data.get("phase"),
                                "development": checkpoint.data.get("development"),
                            }),
                        },
                    )
                    .await?;
                Ok(NodeUpdate::paused(Map::new()))
            }
            Some(response) => {
                let mut data = Map::new();
                data.insert("ntp_approved".to_string(), json!(response.approved));
                data.insert("approved".to_string(), json!(response.approved));
                if response.approved {
                    data.insert("phase".to_string(), json!("construction_ready"));
                } else {
                    // A rejected NTP is a data outcome: the workflow still
                    // reaches the sink and completes.
                    data.insert(
                        "rejection_reason".to_string(),
                        json!(response.notes.unwrap_or_default()),
                    );
                }
                Ok(NodeUpdate::with_data(data))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use siteflow_types::workflow::{HITL_RESPONSE_KEY, HumanResponse};
    use uuid::Uuid;

    #[tokio::test]
    async fn prospecting_shortlists_at_most_three() {
        let mut data = Map::new();
        data.insert(
            "candidate_sites".to_string(),
            json!(["alpha", "beta", "gamma", "delta", "epsilon"]),
        );
        let checkpoint = WorkflowCheckpoint::new(
            Uuid::now_v7(),
            "tenant-a".to_string(),
            WORKFLOW_TYPE.to_string(),
            data,
        );

        let update = Prospecting.execute(&checkpoint).await.unwrap();
        assert_eq!(update.data["prospecting"]["candidates"], json!(5));
        assert_eq!(update.data["prospecting"]["shortlisted"], json!(3));
    }

    #[tokio::test]
    async fn ntp_rejection_records_reason_without_pausing() {
        struct PanicGate;
        impl Interrupter for PanicGate {
            fn raise<'a>(
                &'a self,
                _checkpoint: &'a WorkflowCheckpoint,
                _reason: &'a str,
                _options: InterruptOptions,
            ) -> std::pin::Pin<
                Box<
                    dyn std::future::Future<
                            Output = Result<(), crate::workflow::interrupt::InterruptError>,
                        > + Send
                        + 'a,
                >,
            > {
                panic!("gate must not re-raise once a response is present");
            }
        }

        let mut data = Map::new();
        data.insert(
            HITL_RESPONSE_KEY.to_string(),
            serde_json::to_value(HumanResponse {
                approved: false,
                notes: Some("budget overrun".to_string()),
                resolved_by: None,
            })
            .unwrap(),
        );
        let checkpoint = WorkflowCheckpoint::new(
            Uuid::now_v7(),
            "tenant-a".to_string(),
            WORKFLOW_TYPE.to_string(),
            data,
        );

        let node = NoticeToProceedGate {
            gate: Arc::new(PanicGate),
        };
        let update = node.execute(&checkpoint).await.unwrap();
        assert!(update.status.is_none());
        assert_eq!(update.data["ntp_approved"], json!(false));
        assert_eq!(update.data["rejection_reason"], json!("budget overrun"));
    }
}
