//! Application state: wiring of repositories, collaborators, and the engine.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use secrecy::SecretString;

use siteflow_core::collaborator::{BoxAdvisoryService, BoxDocumentIntelligence};
use siteflow_core::definitions::{Collaborators, build_registry};
use siteflow_core::event::EventBus;
use siteflow_core::workflow::engine::WorkflowEngine;
use siteflow_core::workflow::interrupt::{InterruptGate, Interrupter};
use siteflow_infra::collaborator::{
    HeuristicAdvisoryService, HeuristicDocumentIntelligence, HttpAdvisoryService,
    HttpCollaboratorConfig, HttpDocumentIntelligence,
};
use siteflow_infra::config::{CollaboratorMode, SiteflowConfig, load_config};
use siteflow_infra::sqlite::{
    DatabasePool, SqliteCheckpointRepository, SqliteReviewRepository,
};

/// Shared application state handed to HTTP handlers and CLI commands.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine<SqliteCheckpointRepository>>,
    pub reviews: Arc<SqliteReviewRepository>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize state: config, database, repositories, collaborators,
    /// registry, engine. Recovers abandoned workflows on boot.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("creating data dir {}", data_dir.display()))?;

        let config = load_config(&data_dir).await;
        let database_url = config.database_url.clone().unwrap_or_else(|| {
            format!("sqlite://{}/siteflow.db", data_dir.display())
        });

        let pool = DatabasePool::new(&database_url)
            .await
            .with_context(|| format!("opening database {database_url}"))?;
        let checkpoints = Arc::new(SqliteCheckpointRepository::new(pool.clone()));
        let reviews = Arc::new(SqliteReviewRepository::new(pool));

        let events = EventBus::default();
        let gate: Arc<dyn Interrupter> = Arc::new(InterruptGate::new(
            Arc::clone(&checkpoints),
            Arc::clone(&reviews),
            events.clone(),
        ));

        let collaborators = build_collaborators(&config)?;
        let registry = Arc::new(build_registry(&collaborators, gate)?);

        let engine = WorkflowEngine::new(registry, checkpoints, events)
            .with_lease_ttl(Duration::from_secs(config.lease_ttl_secs));

        let recovered = engine.recover().await?;
        if recovered > 0 {
            tracing::info!(recovered, "relaunched abandoned workflows");
        }

        Ok(Self {
            engine: Arc::new(engine),
            reviews,
            data_dir,
        })
    }
}

fn resolve_data_dir() -> PathBuf {
    std::env::var("SITEFLOW_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".siteflow")
        })
}

fn build_collaborators(config: &SiteflowConfig) -> anyhow::Result<Collaborators> {
    match config.collaborators.mode {
        CollaboratorMode::Heuristic => Ok(Collaborators {
            documents: Arc::new(BoxDocumentIntelligence::new(HeuristicDocumentIntelligence)),
            advisor: Arc::new(BoxAdvisoryService::new(HeuristicAdvisoryService)),
        }),
        CollaboratorMode::Http => {
            let document_url = config
                .collaborators
                .document_service_url
                .clone()
                .context("collaborators.document_service_url required in http mode")?;
            let advisory_url = config
                .collaborators
                .advisory_service_url
                .clone()
                .context("collaborators.advisory_service_url required in http mode")?;
            let api_key = config
                .collaborators
                .api_key
                .clone()
                .map(SecretString::from);

            let mut document_config = HttpCollaboratorConfig::new(document_url);
            let mut advisory_config = HttpCollaboratorConfig::new(advisory_url);
            if let Some(api_key) = api_key {
                document_config = document_config.with_api_key(api_key.clone());
                advisory_config = advisory_config.with_api_key(api_key);
            }

            Ok(Collaborators {
                documents: Arc::new(BoxDocumentIntelligence::new(HttpDocumentIntelligence::new(
                    document_config,
                ))),
                advisor: Arc::new(BoxAdvisoryService::new(HttpAdvisoryService::new(
                    advisory_config,
                ))),
            })
        }
    }
}
