//! Land acquisition: site_analysis -> due_diligence -> lease_negotiation ->
//! legal_review -> execute_lease.
//!
//! Site analysis fans out one advisory call per parcel and averages the
//! per-parcel suitability scores into an overall recommendation. Legal
//! review is a mandatory gate: it always pauses for sign-off the first time
//! through. Lease execution branches on the legal decision: approval marks
//! the parcels leased; rejection records the outcome without touching them.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use siteflow_types::review::ReviewUrgency;
use siteflow_types::workflow::{END_NODE, NodeUpdate, WorkflowCheckpoint};

use crate::collaborator::BoxAdvisoryService;
use crate::workflow::definition::{DefinitionError, Edge, WorkflowDefinition};
use crate::workflow::interrupt::{InterruptOptions, Interrupter};
use crate::workflow::node::{DynNode, Node, NodeError};

/// Registered type name of this workflow.
pub const WORKFLOW_TYPE: &str = "land_acquisition";

/// Build the land-acquisition definition.
pub fn definition(
    advisor: Arc<BoxAdvisoryService>,
    gate: Arc<dyn Interrupter>,
) -> Result<WorkflowDefinition, DefinitionError> {
    let nodes: Vec<DynNode> = vec![
        Arc::new(AnalyzeSite {
            advisor: Arc::clone(&advisor),
        }),
        Arc::new(RunDueDiligence),
        Arc::new(NegotiateLease { advisor }),
        Arc::new(LegalReview { gate }),
        Arc::new(ExecuteLease),
    ];
    let edges = vec![
        Edge::direct("site_analysis", "due_diligence"),
        Edge::direct("due_diligence", "lease_negotiation"),
        Edge::direct("lease_negotiation", "legal_review"),
        Edge::direct("legal_review", "execute_lease"),
        Edge::direct("execute_lease", END_NODE),
    ];
    WorkflowDefinition::new(WORKFLOW_TYPE, nodes, edges, "site_analysis")
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Score every associated parcel and derive an overall recommendation.
struct AnalyzeSite {
    advisor: Arc<BoxAdvisoryService>,
}

impl Node for AnalyzeSite {
    fn name(&self) -> &str {
        "site_analysis"
    }

    async fn execute(&self, checkpoint: &WorkflowCheckpoint) -> Result<NodeUpdate, NodeError> {
        let parcels = checkpoint
            .data
            .get("parcels")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut parcel_scores = Vec::with_capacity(parcels.len());
        let mut suitabilities = Vec::new();

        for parcel in &parcels {
            let parcel_id = parcel
                .get("parcel_id")
                .and_then(Value::as_str)
                .unwrap_or("unknown");

            match self.advisor.score_parcel(parcel).await {
                Ok(score) => {
                    suitabilities.push(score.suitability);
                    parcel_scores.push(json!({
                        "parcel_id": parcel_id,
                        "suitability": score.suitability,
                        "factors": score.factors,
                    }));
                }
                // One failed scoring call degrades that parcel, not the batch.
                Err(err) => {
                    tracing::warn!(
                        workflow_id = %checkpoint.workflow_id,
                        parcel_id,
                        error = %err,
                        "parcel scoring failed"
                    );
                    parcel_scores.push(json!({
                        "parcel_id": parcel_id,
                        "error": err.to_string(),
                    }));
                }
            }
        }

        let overall_score = if suitabilities.is_empty() {
            0.0
        } else {
            suitabilities.iter().sum::<f64>() / suitabilities.len() as f64
        };
        let recommendation = if overall_score >= 70.0 {
            "proceed"
        } else if overall_score >= 50.0 {
            "proceed_with_caution"
        } else {
            "not_recommended"
        };

        let mut data = Map::new();
        data.insert("parcel_scores".to_string(), json!(parcel_scores));
        data.insert("overall_score".to_string(), json!(overall_score));
        data.insert("recommendation".to_string(), json!(recommendation));
        Ok(NodeUpdate::with_data(data))
    }
}

/// Collect title and encumbrance findings from the parcel records.
struct RunDueDiligence;

impl Node for RunDueDiligence {
    fn name(&self) -> &str {
        "due_diligence"
    }

    async fn execute(&self, checkpoint: &WorkflowCheckpoint) -> Result<NodeUpdate, NodeError> {
        let parcels = checkpoint
            .data
            .get("parcels")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut findings = Vec::new();
        for parcel in &parcels {
            let parcel_id = parcel
                .get("parcel_id")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            if parcel.get("title_clear") == Some(&json!(false)) {
                findings.push(json!({
                    "parcel_id": parcel_id,
                    "issue": "title_defect",
                }));
            }
            if let Some(encumbrances) = parcel.get("encumbrances").and_then(Value::as_array) {
                for encumbrance in encumbrances {
                    findings.push(json!({
                        "parcel_id": parcel_id,
                        "issue": "encumbrance",
                        "detail": encumbrance,
                    }));
                }
            }
        }

        let mut data = Map::new();
        data.insert(
            "due_diligence".to_string(),
            json!({
                "findings": findings,
                "clean": findings.is_empty(),
            }),
        );
        Ok(NodeUpdate::with_data(data))
    }
}

/// Ask the advisory service for lease terms to open negotiation with.
struct NegotiateLease {
    advisor: Arc<BoxAdvisoryService>,
}

impl Node for NegotiateLease {
    fn name(&self) -> &str {
        "lease_negotiation"
    }

    async fn execute(&self, checkpoint: &WorkflowCheckpoint) -> Result<NodeUpdate, NodeError> {
        let context = json!({
            "parcels": checkpoint.data.get("parcels"),
            "overall_score": checkpoint.data.get("overall_score"),
            "due_diligence": checkpoint.data.get("due_diligence"),
        });

        let mut data = Map::new();
        match self.advisor.suggest_terms(&context).await {
            Ok(terms) => {
                data.insert(
                    "proposed_terms".to_string(),
                    serde_json::to_value(&terms).unwrap_or(Value::Null),
                );
            }
            Err(err) => {
                tracing::warn!(
                    workflow_id = %checkpoint.workflow_id,
                    error = %err,
                    "terms suggestion failed"
                );
                data.insert("terms_error".to_string(), json!(err.to_string()));
            }
        }
        Ok(NodeUpdate::with_data(data))
    }
}

/// Mandatory legal sign-off. Always pauses until counsel responds.
struct LegalReview {
    gate: Arc<dyn Interrupter>,
}

impl Node for LegalReview {
    fn name(&self) -> &str {
        "legal_review"
    }

    async fn execute(&self, checkpoint: &WorkflowCheckpoint) -> Result<NodeUpdate, NodeError> {
        match checkpoint.hitl_response() {
            None => {
                self.gate
                    .raise(
                        checkpoint,
                        "Lease package requires legal sign-off before execution",
                        InterruptOptions {
                            request_type: "legal_review".to_string(),
                            urgency: ReviewUrgency::High,
                            context: json!({
                                "proposed_terms": checkpoint.data.get("proposed_terms"),
                                "due_diligence": checkpoint.data.get("due_diligence"),
                            }),
                        },
                    )
                    .await?;
                Ok(NodeUpdate::paused(Map::new()))
            }
            Some(response) => {
                let mut data = Map::new();
                data.insert("legal_approved".to_string(), json!(response.approved));
                if let Some(notes) = response.notes {
                    data.insert("legal_notes".to_string(), json!(notes));
                }
                Ok(NodeUpdate::with_data(data))
            }
        }
    }
}

/// Execute or abandon the lease based on the legal decision.
struct ExecuteLease;

impl Node for ExecuteLease {
    fn name(&self) -> &str {
        "execute_lease"
    }

    async fn execute(&self, checkpoint: &WorkflowCheckpoint) -> Result<NodeUpdate, NodeError> {
        let approved = checkpoint
            .data
            .get("legal_approved")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut data = Map::new();
        if approved {
            let parcels = checkpoint
                .data
                .get("parcels")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let leased: Vec<Value> = parcels
                .into_iter()
                .map(|mut parcel| {
                    if let Some(obj) = parcel.as_object_mut() {
                        obj.insert("status".to_string(), json!("leased"));
                    }
                    parcel
                })
                .collect();
            data.insert("parcels".to_string(), json!(leased));
            data.insert("acquisition_phase".to_string(), json!("executed"));
        } else {
            // Rejection leaves parcel records untouched.
            data.insert("acquisition_phase".to_string(), json!("rejected"));
        }
        Ok(NodeUpdate::with_data(data))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::AdvisoryService;
    use siteflow_types::collaborator::{LeaseTerms, ParcelScore};
    use siteflow_types::error::CollaboratorError;
    use uuid::Uuid;

    /// Scores each parcel from its own `suitability_hint` field.
    struct HintAdvisor;

    impl AdvisoryService for HintAdvisor {
        async fn score_parcel(&self, parcel: &Value) -> Result<ParcelScore, CollaboratorError> {
            let suitability = parcel
                .get("suitability_hint")
                .and_then(Value::as_f64)
                .ok_or_else(|| CollaboratorError::InvalidResponse("no hint".to_string()))?;
            Ok(ParcelScore {
                suitability,
                factors: vec![],
            })
        }

        async fn suggest_terms(&self, _context: &Value) -> Result<LeaseTerms, CollaboratorError> {
            Ok(LeaseTerms {
                annual_rent_per_acre: 800.0,
                term_years: 25,
                escalation_pct: 2.0,
                conditions: vec![],
            })
        }
    }

    fn checkpoint_with_parcels(hints: &[f64]) -> WorkflowCheckpoint {
        let parcels: Vec<Value> = hints
            .iter()
            .enumerate()
            .map(|(i, hint)| json!({ "parcel_id": format!("P-{i}"), "suitability_hint": hint }))
            .collect();
        let mut data = Map::new();
        data.insert("parcels".to_string(), json!(parcels));
        WorkflowCheckpoint::new(
            Uuid::now_v7(),
            "tenant-a".to_string(),
            WORKFLOW_TYPE.to_string(),
            data,
        )
    }

    #[tokio::test]
    async fn analysis_averages_scores_into_proceed() {
        let node = AnalyzeSite {
            advisor: Arc::new(BoxAdvisoryService::new(HintAdvisor)),
        };
        let update = node
            .execute(&checkpoint_with_parcels(&[80.0, 60.0]))
            .await
            .unwrap();

        assert_eq!(update.data["overall_score"], json!(70.0));
        assert_eq!(update.data["recommendation"], json!("proceed"));
        assert_eq!(update.data["parcel_scores"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn analysis_low_scores_are_not_recommended() {
        let node = AnalyzeSite {
            advisor: Arc::new(BoxAdvisoryService::new(HintAdvisor)),
        };
        let update = node
            .execute(&checkpoint_with_parcels(&[60.0, 30.0]))
            .await
            .unwrap();

        assert_eq!(update.data["overall_score"], json!(45.0));
        assert_eq!(update.data["recommendation"], json!("not_recommended"));
    }

    #[tokio::test]
    async fn analysis_middle_band_proceeds_with_caution() {
        let node = AnalyzeSite {
            advisor: Arc::new(BoxAdvisoryService::new(HintAdvisor)),
        };
        let update = node
            .execute(&checkpoint_with_parcels(&[55.0, 60.0]))
            .await
            .unwrap();
        assert_eq!(update.data["recommendation"], json!("proceed_with_caution"));
    }

    #[tokio::test]
    async fn analysis_degrades_failed_parcel_without_aborting_batch() {
        let node = AnalyzeSite {
            advisor: Arc::new(BoxAdvisoryService::new(HintAdvisor)),
        };
        // Second parcel has no hint, so the advisor errors on it.
        let mut checkpoint = checkpoint_with_parcels(&[80.0]);
        let parcels = checkpoint.data.get_mut("parcels").unwrap();
        parcels
            .as_array_mut()
            .unwrap()
            .push(json!({ "parcel_id": "P-bad" }));

        let update = node.execute(&checkpoint).await.unwrap();
        let scores = update.data["parcel_scores"].as_array().unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores[1].get("error").is_some());
        // The average covers only the parcels that scored.
        assert_eq!(update.data["overall_score"], json!(80.0));
    }

    #[tokio::test]
    async fn due_diligence_collects_title_and_encumbrance_findings() {
        let mut data = Map::new();
        data.insert(
            "parcels".to_string(),
            json!([
                { "parcel_id": "P-0", "title_clear": false },
                { "parcel_id": "P-1", "encumbrances": ["utility easement"] },
                { "parcel_id": "P-2" },
            ]),
        );
        let checkpoint = WorkflowCheckpoint::new(
            Uuid::now_v7(),
            "tenant-a".to_string(),
            WORKFLOW_TYPE.to_string(),
            data,
        );

        let update = RunDueDiligence.execute(&checkpoint).await.unwrap();
        let report = &update.data["due_diligence"];
        assert_eq!(report["clean"], json!(false));
        assert_eq!(report["findings"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn lease_execution_marks_parcels_on_approval_only() {
        let mut checkpoint = checkpoint_with_parcels(&[80.0]);
        checkpoint
            .data
            .insert("legal_approved".to_string(), json!(true));

        let update = ExecuteLease.execute(&checkpoint).await.unwrap();
        assert_eq!(update.data["acquisition_phase"], json!("executed"));
        assert_eq!(update.data["parcels"][0]["status"], json!("leased"));

        let mut rejected = checkpoint_with_parcels(&[80.0]);
        rejected
            .data
            .insert("legal_approved".to_string(), json!(false));

        let update = ExecuteLease.execute(&rejected).await.unwrap();
        assert_eq!(update.data["acquisition_phase"], json!("rejected"));
        assert!(update.data.get("parcels").is_none());
    }
}
