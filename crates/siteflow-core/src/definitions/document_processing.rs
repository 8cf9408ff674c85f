//! Document processing: classify -> extract -> validate -> hitl_gate ->
//! complete.
//!
//! Validation decides whether a document needs human review: anything with
//! classifier confidence below 0.9, or in a legal category (lease, PPA,
//! easement, option), goes through the review gate. The gate node is a
//! conditional sink: it pauses the workflow only when review is required
//! and no human response has arrived yet; otherwise it records the
//! decision and falls through.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use siteflow_types::review::ReviewUrgency;
use siteflow_types::workflow::{END_NODE, NodeUpdate, WorkflowCheckpoint};

use crate::collaborator::BoxDocumentIntelligence;
use crate::workflow::definition::{DefinitionError, Edge, WorkflowDefinition};
use crate::workflow::interrupt::{InterruptOptions, Interrupter};
use crate::workflow::node::{DynNode, Node, NodeError};

/// Registered type name of this workflow.
pub const WORKFLOW_TYPE: &str = "document_processing";

/// Categories that always require human review regardless of confidence.
const LEGAL_CATEGORIES: [&str; 4] = ["lease", "ppa", "easement", "option"];

/// Confidence threshold below which review is required.
const CONFIDENCE_THRESHOLD: f64 = 0.9;

/// Build the document-processing definition.
pub fn definition(
    documents: Arc<BoxDocumentIntelligence>,
    gate: Arc<dyn Interrupter>,
) -> Result<WorkflowDefinition, DefinitionError> {
    let nodes: Vec<DynNode> = vec![
        Arc::new(ClassifyDocument {
            documents: Arc::clone(&documents),
        }),
        Arc::new(ExtractFields { documents }),
        Arc::new(ValidateClassification),
        Arc::new(ReviewGate { gate }),
        Arc::new(FinalizeDocument),
    ];
    let edges = vec![
        Edge::direct("classify", "extract"),
        Edge::direct("extract", "validate"),
        Edge::direct("validate", "hitl_gate"),
        Edge::direct("hitl_gate", "complete"),
        Edge::direct("complete", END_NODE),
    ];
    WorkflowDefinition::new(WORKFLOW_TYPE, nodes, edges, "classify")
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Classify the document text, if any was supplied.
///
/// Inputs that already carry `category`/`confidence` (pre-classified
/// upstream) pass through untouched. Collaborator failures degrade into a
/// `classification_error` field.
struct ClassifyDocument {
    documents: Arc<BoxDocumentIntelligence>,
}

impl Node for ClassifyDocument {
    fn name(&self) -> &str {
        "classify"
    }

    async fn execute(&self, checkpoint: &WorkflowCheckpoint) -> Result<NodeUpdate, NodeError> {
        let mut data = Map::new();
        if let Some(text) = checkpoint.data.get("document_text").and_then(Value::as_str) {
            match self.documents.classify(text).await {
                Ok(classification) => {
                    data.insert("category".to_string(), json!(classification.category));
                    data.insert("confidence".to_string(), json!(classification.confidence));
                }
                Err(err) => {
                    tracing::warn!(
                        workflow_id = %checkpoint.workflow_id,
                        error = %err,
                        "document classification failed"
                    );
                    data.insert("classification_error".to_string(), json!(err.to_string()));
                }
            }
        }
        Ok(NodeUpdate::with_data(data))
    }
}

/// Extract structured fields from the document.
struct ExtractFields {
    documents: Arc<BoxDocumentIntelligence>,
}

impl Node for ExtractFields {
    fn name(&self) -> &str {
        "extract"
    }

    async fn execute(&self, checkpoint: &WorkflowCheckpoint) -> Result<NodeUpdate, NodeError> {
        let mut data = Map::new();
        let text = checkpoint.data.get("document_text").and_then(Value::as_str);
        let category = checkpoint.data.get("category").and_then(Value::as_str);

        if let (Some(text), Some(category)) = (text, category) {
            match self.documents.extract(text, category).await {
                Ok(fields) => {
                    data.insert("extracted_fields".to_string(), Value::Object(fields));
                }
                Err(err) => {
                    tracing::warn!(
                        workflow_id = %checkpoint.workflow_id,
                        error = %err,
                        "field extraction failed"
                    );
                    data.insert("extraction_error".to_string(), json!(err.to_string()));
                }
            }
        }
        Ok(NodeUpdate::with_data(data))
    }
}

/// Decide whether the document needs human review.
struct ValidateClassification;

impl Node for ValidateClassification {
    fn name(&self) -> &str {
        "validate"
    }

    async fn execute(&self, checkpoint: &WorkflowCheckpoint) -> Result<NodeUpdate, NodeError> {
        let confidence = checkpoint
            .data
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let category = checkpoint
            .data
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        let legal = LEGAL_CATEGORIES.contains(&category);
        let requires_hitl = confidence < CONFIDENCE_THRESHOLD || legal;
        // High-confidence documents still queue at medium urgency; only
        // genuinely uncertain classifications escalate.
        let urgency = if confidence >= 0.7 { "medium" } else { "high" };

        let mut data = Map::new();
        data.insert("requires_hitl".to_string(), json!(requires_hitl));
        data.insert("review_urgency".to_string(), json!(urgency));
        data.insert(
            "validation".to_string(),
            json!({
                "confidence": confidence,
                "legal_category": legal,
            }),
        );
        Ok(NodeUpdate::with_data(data))
    }
}

/// Conditional human-review sink.
struct ReviewGate {
    gate: Arc<dyn Interrupter>,
}

impl Node for ReviewGate {
    fn name(&self) -> &str {
        "hitl_gate"
    }

    async fn execute(&self, checkpoint: &WorkflowCheckpoint) -> Result<NodeUpdate, NodeError> {
        let requires_hitl = checkpoint
            .data
            .get("requires_hitl")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        match checkpoint.hitl_response() {
            // A decision has not arrived and one is required: raise once
            // and suspend. Re-entries after resume see the response and
            // take the other arm, so the request is never duplicated.
            None if requires_hitl => {
                let urgency = match checkpoint
                    .data
                    .get("review_urgency")
                    .and_then(Value::as_str)
                {
                    Some("high") => ReviewUrgency::High,
                    _ => ReviewUrgency::Medium,
                };
                self.gate
                    .raise(
                        checkpoint,
                        "Document classification requires human review",
                        InterruptOptions {
                            request_type: "document_review".to_string(),
                            urgency,
                            context: json!({
                                "category": checkpoint.data.get("category"),
                                "confidence": checkpoint.data.get("confidence"),
                            }),
                        },
                    )
                    .await?;
                Ok(NodeUpdate::paused(Map::new()))
            }
            response => {
                let approved = response.map(|r| r.approved).unwrap_or(true);
                let mut data = Map::new();
                data.insert("approved".to_string(), json!(approved));
                Ok(NodeUpdate::with_data(data))
            }
        }
    }
}

/// Record the final processing outcome.
struct FinalizeDocument;

impl Node for FinalizeDocument {
    fn name(&self) -> &str {
        "complete"
    }

    async fn execute(&self, checkpoint: &WorkflowCheckpoint) -> Result<NodeUpdate, NodeError> {
        let approved = checkpoint
            .data
            .get("approved")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let mut data = Map::new();
        data.insert(
            "document_status".to_string(),
            json!(if approved { "processed" } else { "review_rejected" }),
        );
        Ok(NodeUpdate::with_data(data))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
