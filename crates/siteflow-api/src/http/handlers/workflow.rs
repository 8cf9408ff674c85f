//! Workflow lifecycle handlers: start, status, resume, cancel.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use siteflow_types::workflow::HumanResponse;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Request body for starting a workflow.
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    /// Owning tenant. Defaults to "default" for single-tenant deployments.
    #[serde(default = "default_tenant")]
    pub tenant_id: String,
    /// Initial workflow data bag.
    #[serde(default)]
    pub input: Map<String, Value>,
}

fn default_tenant() -> String {
    "default".to_string()
}

/// POST /api/v1/workflows/{workflow_type}/start - Start a new instance.
pub async fn start_workflow(
    State(state): State<AppState>,
    Path(workflow_type): Path<String>,
    Json(body): Json<StartRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let workflow_id = state
        .engine
        .start(&workflow_type, &body.tenant_id, body.input)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(json!({ "workflow_id": workflow_id }), request_id, elapsed)
        .with_link("self", &format!("/api/v1/workflows/{workflow_id}"));
    Ok(Json(resp))
}

/// GET /api/v1/workflows/{id} - Get an instance's status report.
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let report = state
        .engine
        .status(workflow_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("workflow {workflow_id} not found")))?;

    let elapsed = start.elapsed().as_millis() as u64;
    let report_json =
        serde_json::to_value(&report).map_err(|e| AppError::Internal(e.to_string()))?;
    let resp = ApiResponse::success(report_json, request_id, elapsed)
        .with_link("self", &format!("/api/v1/workflows/{workflow_id}"));
    Ok(Json(resp))
}

/// POST /api/v1/workflows/{id}/resume - Resume a paused instance.
pub async fn resume_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
    Json(response): Json<HumanResponse>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    state.engine.resume(workflow_id, response).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(json!({ "resumed": true }), request_id, elapsed)
        .with_link("workflow", &format!("/api/v1/workflows/{workflow_id}"));
    Ok(Json(resp))
}

/// POST /api/v1/workflows/{id}/cancel - Cancel an instance.
pub async fn cancel_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    state.engine.cancel(workflow_id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(json!({ "cancelled": true }), request_id, elapsed)
        .with_link("workflow", &format!("/api/v1/workflows/{workflow_id}"));
    Ok(Json(resp))
}
