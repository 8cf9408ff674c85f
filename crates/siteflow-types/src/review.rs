//! Review request types for human-in-the-loop gates.
//!
//! A review request is created by the interrupt gate when a node requires
//! an external human decision. The record is owned by the review queue;
//! its resolution is the sole trigger for resuming the paused workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// How urgently a review request needs human attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewUrgency {
    Low,
    Medium,
    High,
    Critical,
}

/// Lifecycle status of a review request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

/// A pending human decision attached to a paused workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    /// UUIDv7 request ID.
    pub id: Uuid,
    /// Owning tenant (matches the workflow's tenant).
    pub tenant_id: String,
    /// Workflow instance this review blocks.
    pub workflow_id: Uuid,
    /// What kind of decision is requested (e.g. "document_review",
    /// "legal_review", "notice_to_proceed").
    pub request_type: String,
    /// How urgently the queue should surface this request.
    pub urgency: ReviewUrgency,
    /// Current lifecycle status.
    pub status: ReviewStatus,
    /// Human-readable explanation of what is being reviewed and why.
    pub description: String,
    /// Snapshot of the workflow data relevant to the decision.
    pub context: Value,
    /// When the gate raised this request.
    pub created_at: DateTime<Utc>,
    /// When the request was resolved (None while pending).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ReviewRequest {
    /// Build a fresh pending request.
    pub fn new(
        tenant_id: String,
        workflow_id: Uuid,
        request_type: String,
        urgency: ReviewUrgency,
        description: String,
        context: Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            tenant_id,
            workflow_id,
            request_type,
            urgency,
            status: ReviewStatus::Pending,
            description,
            context,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_request_is_pending() {
        let req = ReviewRequest::new(
            "tenant-a".to_string(),
            Uuid::now_v7(),
            "legal_review".to_string(),
            ReviewUrgency::High,
            "Lease agreement requires legal sign-off".to_string(),
            json!({ "parcel_count": 2 }),
        );
        assert_eq!(req.status, ReviewStatus::Pending);
        assert!(req.resolved_at.is_none());
    }

    #[test]
    fn urgency_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ReviewUrgency::Critical).unwrap(),
            "\"critical\""
        );
        let parsed: ReviewUrgency = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(parsed, ReviewUrgency::Medium);
    }

    #[test]
    fn request_json_roundtrip() {
        let req = ReviewRequest::new(
            "tenant-a".to_string(),
            Uuid::now_v7(),
            "document_review".to_string(),
            ReviewUrgency::Medium,
            "Low-confidence classification".to_string(),
            json!({ "category": "lease", "confidence": 0.6 }),
        );
        let json_str = serde_json::to_string(&req).unwrap();
        let parsed: ReviewRequest = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.id, req.id);
        assert_eq!(parsed.request_type, "document_review");
        assert_eq!(parsed.urgency, ReviewUrgency::Medium);
    }
}
