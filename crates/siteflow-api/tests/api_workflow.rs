//! End-to-end API test: start a workflow over HTTP, watch it pause at the
//! review gate, resolve the review through the queue endpoint, and verify
//! the resumed run completes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use uuid::Uuid;

use siteflow_api::http::router::build_router;
use siteflow_api::state::AppState;
use siteflow_core::collaborator::{BoxAdvisoryService, BoxDocumentIntelligence};
use siteflow_core::definitions::{Collaborators, build_registry};
use siteflow_core::event::EventBus;
use siteflow_core::workflow::engine::WorkflowEngine;
use siteflow_core::workflow::interrupt::{InterruptGate, Interrupter};
use siteflow_infra::collaborator::{HeuristicAdvisoryService, HeuristicDocumentIntelligence};
use siteflow_infra::sqlite::{
    DatabasePool, SqliteCheckpointRepository, SqliteReviewRepository,
};

async fn test_state(dir: &tempfile::TempDir) -> AppState {
    let db_path = dir.path().join("siteflow.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = DatabasePool::new(&url).await.expect("pool");

    let checkpoints = Arc::new(SqliteCheckpointRepository::new(pool.clone()));
    let reviews = Arc::new(SqliteReviewRepository::new(pool));
    let events = EventBus::default();
    let gate: Arc<dyn Interrupter> = Arc::new(InterruptGate::new(
        Arc::clone(&checkpoints),
        Arc::clone(&reviews),
        events.clone(),
    ));
    let collaborators = Collaborators {
        documents: Arc::new(BoxDocumentIntelligence::new(HeuristicDocumentIntelligence)),
        advisor: Arc::new(BoxAdvisoryService::new(HeuristicAdvisoryService)),
    };
    let registry = Arc::new(build_registry(&collaborators, gate).expect("registry"));
    let engine = WorkflowEngine::new(registry, checkpoints, events)
        .with_lease_ttl(Duration::from_secs(5));

    AppState {
        engine: Arc::new(engine),
        reviews,
        data_dir: dir.path().to_path_buf(),
    }
}

async fn serve(state: AppState) -> SocketAddr {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    addr
}

#[tokio::test]
async fn document_review_pause_resolve_complete() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir).await;
    let addr = serve(state.clone()).await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}/api/v1");

    // A lease document always requires review, regardless of confidence.
    let response = client
        .post(format!("{base}/workflows/document_processing/start"))
        .json(&json!({
            "tenant_id": "tenant-a",
            "input": { "category": "lease", "confidence": 0.95 },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let workflow_id: Uuid = body["data"]["workflow_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    state.engine.await_workflow(workflow_id).await;

    let body: Value = client
        .get(format!("{base}/workflows/{workflow_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["status"], json!("paused"));
    assert_eq!(body["data"]["current_node"], json!("hitl_gate"));

    // The review queue holds exactly one pending request for it.
    let body: Value = client
        .get(format!("{base}/reviews"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let reviews = body["data"].as_array().unwrap();
    assert_eq!(reviews.len(), 1);
    let review_id = reviews[0]["id"].as_str().unwrap().to_string();

    // Resolving the review resumes the workflow.
    let response = client
        .post(format!("{base}/reviews/{review_id}/resolve"))
        .json(&json!({ "approved": true, "resolved_by": "reviewer@acme" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    state.engine.await_workflow(workflow_id).await;

    let body: Value = client
        .get(format!("{base}/workflows/{workflow_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["status"], json!("completed"));
    assert_eq!(body["data"]["data"]["approved"], json!(true));

    // Resolving again conflicts; resuming a completed workflow conflicts.
    let response = client
        .post(format!("{base}/reviews/{review_id}/resolve"))
        .json(&json!({ "approved": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    let response = client
        .post(format!("{base}/workflows/{workflow_id}/resume"))
        .json(&json!({ "approved": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn unknown_workflow_type_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir).await;
    let addr = serve(state).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/v1/workflows/underwriting/start"))
        .json(&json!({ "input": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
