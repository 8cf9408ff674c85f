//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`. Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Workflow lifecycle
        .route(
            "/workflows/{workflow_type}/start",
            post(handlers::workflow::start_workflow),
        )
        .route("/workflows/{id}", get(handlers::workflow::get_workflow))
        .route(
            "/workflows/{id}/resume",
            post(handlers::workflow::resume_workflow),
        )
        .route(
            "/workflows/{id}/cancel",
            post(handlers::workflow::cancel_workflow),
        )
        // Review queue
        .route("/reviews", get(handlers::review::list_reviews))
        .route(
            "/reviews/{id}/resolve",
            post(handlers::review::resolve_review),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
