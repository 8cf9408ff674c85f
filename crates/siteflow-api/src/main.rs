//! Siteflow CLI and REST API entry point.
//!
//! Binary name: `sfw`
//!
//! Parses CLI arguments, initializes database and engine wiring, then
//! dispatches to the appropriate command handler or starts the REST API
//! server.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use siteflow_api::cli::{self, Cli, Commands};
use siteflow_api::http;
use siteflow_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The server gets the full observability stack; one-shot commands get
    // a plain fmt subscriber tuned by verbosity.
    if let Commands::Serve { otel, .. } = &cli.command {
        siteflow_observe::tracing_setup::init_tracing(*otel)
            .map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))?;
    } else {
        let filter = match cli.verbose {
            0 if cli.quiet => "error",
            0 => "warn",
            1 => "info,siteflow=debug",
            _ => "trace",
        };
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_target(false)
            .init();
    }

    let state = AppState::init().await?;

    match cli.command {
        Commands::Serve { port, otel: _ } => {
            let router = http::router::build_router(state);
            let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
            tracing::info!(port, "siteflow API listening");
            axum::serve(listener, router).await?;
            siteflow_observe::tracing_setup::shutdown_tracing();
        }

        Commands::Start {
            workflow_type,
            tenant,
            input,
            wait,
        } => {
            cli::start(
                &state,
                &workflow_type,
                &tenant,
                input.as_deref(),
                wait,
                cli.json,
            )
            .await?;
        }

        Commands::Status { workflow_id } => {
            cli::status(&state, workflow_id, cli.json).await?;
        }

        Commands::Reviews => {
            cli::reviews(&state, cli.json).await?;
        }

        Commands::Resolve {
            review_id,
            approve,
            notes,
            resolved_by,
        } => {
            cli::resolve(&state, review_id, approve, notes, resolved_by, cli.json).await?;
        }
    }

    Ok(())
}
