//! Review queue handlers: listing pending requests and resolving them.
//!
//! Recording the decision on the request and resuming the paused workflow
//! are one operation here, so a resolved review can never leave its
//! workflow stranded.

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use siteflow_core::repository::review::ReviewRepository;
use siteflow_types::review::ReviewStatus;
use siteflow_types::workflow::HumanResponse;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Query parameters for listing review requests.
#[derive(Debug, Deserialize)]
pub struct ListReviewsQuery {
    /// Status filter (default pending).
    #[serde(default = "default_status")]
    pub status: ReviewStatus,
}

fn default_status() -> ReviewStatus {
    ReviewStatus::Pending
}

/// Request body for resolving a review.
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub approved: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub resolved_by: Option<String>,
}

/// GET /api/v1/reviews - List review requests by status.
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(query): Query<ListReviewsQuery>,
) -> Result<Json<ApiResponse<Vec<Value>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let requests = state.reviews.list_by_status(query.status).await?;
    let requests_json: Vec<Value> = requests
        .iter()
        .map(|r| serde_json::to_value(r).unwrap_or(Value::Null))
        .collect();

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(requests_json, request_id, elapsed)
        .with_link("self", "/api/v1/reviews");
    Ok(Json(resp))
}

/// POST /api/v1/reviews/{id}/resolve - Record a decision and resume the
/// paused workflow.
pub async fn resolve_review(
    State(state): State<AppState>,
    Path(review_id): Path<Uuid>,
    Json(body): Json<ResolveRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let request = state
        .reviews
        .get(&review_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("review {review_id} not found")))?;

    if request.status != ReviewStatus::Pending {
        return Err(AppError::Conflict(format!(
            "review {review_id} already resolved"
        )));
    }

    let status = if body.approved {
        ReviewStatus::Approved
    } else {
        ReviewStatus::Rejected
    };
    state.reviews.resolve(&review_id, status, Utc::now()).await?;

    state
        .engine
        .resume(
            request.workflow_id,
            HumanResponse {
                approved: body.approved,
                notes: body.notes,
                resolved_by: body.resolved_by,
            },
        )
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(
        json!({ "resolved": true, "workflow_id": request.workflow_id }),
        request_id,
        elapsed,
    )
    .with_link(
        "workflow",
        &format!("/api/v1/workflows/{}", request.workflow_id),
    );
    Ok(Json(resp))
}
