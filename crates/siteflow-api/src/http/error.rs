//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use siteflow_core::workflow::engine::EngineError;
use siteflow_types::error::RepositoryError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Engine-level errors (definition lookup, resume preconditions, ...).
    Engine(EngineError),
    /// Requested entity does not exist.
    NotFound(String),
    /// Request payload failed validation.
    Validation(String),
    /// Precondition on existing state failed (e.g. review already resolved).
    Conflict(String),
    /// Generic internal error.
    Internal(String),
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        AppError::Engine(e)
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => AppError::NotFound("entity not found".to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Engine(EngineError::DefinitionNotFound(name)) => (
                StatusCode::NOT_FOUND,
                "WORKFLOW_TYPE_NOT_FOUND",
                format!("Unknown workflow type '{name}'"),
            ),
            AppError::Engine(EngineError::NotFoundOrNotPaused(id)) => (
                StatusCode::CONFLICT,
                "NOT_FOUND_OR_NOT_PAUSED",
                format!("Workflow {id} not found or not paused"),
            ),
            AppError::Engine(EngineError::Terminal {
                workflow_id,
                status,
            }) => (
                StatusCode::CONFLICT,
                "ALREADY_TERMINAL",
                format!("Workflow {workflow_id} already terminal ({status:?})"),
            ),
            AppError::Engine(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "ENGINE_ERROR", e.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        };

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn definition_not_found_maps_to_404() {
        let err = AppError::Engine(EngineError::DefinitionNotFound("underwriting".to_string()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn resume_precondition_maps_to_409() {
        let err = AppError::Engine(EngineError::NotFoundOrNotPaused(Uuid::now_v7()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn repository_not_found_maps_to_404() {
        let err: AppError = RepositoryError::NotFound.into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
