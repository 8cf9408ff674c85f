//! CLI command definitions and handlers.
//!
//! Binary name: `sfw`. Commands operate directly on the local application
//! state (same database the server uses), so an operator can start,
//! inspect, and resolve workflows without the REST API running.

use chrono::Utc;
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use serde_json::{Map, Value};
use uuid::Uuid;

use siteflow_core::repository::review::ReviewRepository;
use siteflow_types::review::ReviewStatus;
use siteflow_types::workflow::HumanResponse;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "sfw", about = "Siteflow durable workflow engine", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Emit machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Export spans via OpenTelemetry (stdout exporter).
        #[arg(long)]
        otel: bool,
    },

    /// Start a workflow instance.
    Start {
        /// Registered workflow type (e.g. document_processing).
        workflow_type: String,

        /// Owning tenant.
        #[arg(long, default_value = "default")]
        tenant: String,

        /// Initial data bag as a JSON object.
        #[arg(long)]
        input: Option<String>,

        /// Block until the loop completes or pauses.
        #[arg(long)]
        wait: bool,
    },

    /// Show a workflow instance's status report.
    Status {
        workflow_id: Uuid,
    },

    /// List pending review requests.
    Reviews,

    /// Resolve a review request and resume its workflow.
    Resolve {
        review_id: Uuid,

        /// Approve (omit to reject).
        #[arg(long)]
        approve: bool,

        /// Reviewer notes.
        #[arg(long)]
        notes: Option<String>,

        /// Identity of the resolver.
        #[arg(long)]
        resolved_by: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

pub async fn start(
    state: &AppState,
    workflow_type: &str,
    tenant: &str,
    input: Option<&str>,
    wait: bool,
    json: bool,
) -> anyhow::Result<()> {
    let input: Map<String, Value> = match input {
        Some(raw) => serde_json::from_str(raw)?,
        None => Map::new(),
    };

    let workflow_id = state.engine.start(workflow_type, tenant, input).await?;
    if wait {
        state.engine.await_workflow(workflow_id).await;
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "workflow_id": workflow_id }))?
        );
    } else {
        println!("started {workflow_type} as {workflow_id}");
    }

    if wait {
        status(state, workflow_id, json).await?;
    }
    Ok(())
}

pub async fn status(state: &AppState, workflow_id: Uuid, json: bool) -> anyhow::Result<()> {
    let Some(report) = state.engine.status(workflow_id).await? else {
        anyhow::bail!("workflow {workflow_id} not found");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["field", "value"]);
    table.add_row(vec!["workflow_id".to_string(), report.workflow_id.to_string()]);
    table.add_row(vec!["type".to_string(), report.workflow_type.clone()]);
    table.add_row(vec!["tenant".to_string(), report.tenant_id.clone()]);
    table.add_row(vec!["status".to_string(), format!("{:?}", report.status)]);
    table.add_row(vec!["current_node".to_string(), report.current_node.clone()]);
    table.add_row(vec![
        "history".to_string(),
        report
            .history
            .iter()
            .map(|e| e.node.as_str())
            .collect::<Vec<_>>()
            .join(" -> "),
    ]);
    if let Some(error) = &report.error {
        table.add_row(vec!["error".to_string(), error.clone()]);
    }
    println!("{table}");
    Ok(())
}

pub async fn reviews(state: &AppState, json: bool) -> anyhow::Result<()> {
    let pending = state.reviews.list_by_status(ReviewStatus::Pending).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["id", "workflow", "type", "urgency", "description"]);
    for request in &pending {
        table.add_row(vec![
            request.id.to_string(),
            request.workflow_id.to_string(),
            request.request_type.clone(),
            format!("{:?}", request.urgency),
            request.description.clone(),
        ]);
    }
    println!("{table}");
    println!("{} pending review(s)", pending.len());
    Ok(())
}

pub async fn resolve(
    state: &AppState,
    review_id: Uuid,
    approve: bool,
    notes: Option<String>,
    resolved_by: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let Some(request) = state.reviews.get(&review_id).await? else {
        anyhow::bail!("review {review_id} not found");
    };
    if request.status != ReviewStatus::Pending {
        anyhow::bail!("review {review_id} already resolved");
    }

    let status = if approve {
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
                approved: approve,
                notes,
                resolved_by,
            },
        )
        .await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "resolved": true,
                "workflow_id": request.workflow_id,
            }))?
        );
    } else {
        println!(
            "resolved review {review_id}, workflow {} resumed",
            request.workflow_id
        );
    }
    Ok(())
}
