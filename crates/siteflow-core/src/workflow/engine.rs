//! The workflow engine: start/resume/cancel/status/recover and the
//! checkpointed execution loop.
//!
//! Each instance executes a strictly sequential loop: load the checkpoint,
//! execute the current node, merge and persist its output, resolve the next
//! node via edges, repeat until the terminal sink. The loop reloads the
//! checkpoint before every node so externally applied pauses and
//! cancellations always halt advancement, and it holds a persisted
//! execution lease (renewed each iteration) so at most one loop drives an
//! instance at a time -- `start` and `resume` can never race into
//! concurrent loops over the same checkpoint.
//!
//! `start` and `resume` detach the loop and return immediately. Loop
//! failures are recorded on the checkpoint (`status = failed`) and are
//! observable via `status`; join handles are retained so tests and
//! operators may await loop completion.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use uuid::Uuid;

use siteflow_types::error::RepositoryError;
use siteflow_types::event::WorkflowEvent;
use siteflow_types::workflow::{
    END_NODE, HITL_RESPONSE_KEY, HistoryEntry, HumanResponse, START_NODE, WorkflowCheckpoint,
    WorkflowStatus,
};

use crate::event::EventBus;
use crate::repository::checkpoint::{CheckpointPatch, CheckpointRepository};

use super::node::NodeError;
use super::registry::WorkflowRegistry;

/// Default execution lease duration. Renewed every loop iteration, so a
/// crashed owner's lease lapses after at most this long.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(30);

/// How many times a fresh loop retries lease acquisition before giving up.
///
/// Covers the start/resume race where the previous loop has been told to
/// stop (pause observed, checkpoint written) but has not yet released its
/// lease. A loop that gives up leaves the instance to the recovery sweep.
const LEASE_ACQUIRE_ATTEMPTS: u32 = 20;

/// Delay between lease acquisition attempts.
const LEASE_ACQUIRE_RETRY_DELAY: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from engine operations.
///
/// `DefinitionNotFound` and `NotFoundOrNotPaused` surface synchronously
/// from `start`/`resume`; everything else is caught at the loop boundary
/// and recorded as `status = failed` on the checkpoint.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// `start` was called with an unregistered workflow type.
    #[error("unknown workflow type: {0}")]
    DefinitionNotFound(String),

    /// `resume` was called on a missing or non-paused workflow.
    #[error("workflow {0} not found or not paused")]
    NotFoundOrNotPaused(Uuid),

    /// `cancel` was called on a workflow already in a terminal status.
    #[error("workflow {workflow_id} already terminal ({status:?})")]
    Terminal {
        workflow_id: Uuid,
        status: WorkflowStatus,
    },

    /// The definition references a node absent from its node list, or a
    /// computed edge selected an undefined node. Fatal to the run.
    #[error("node '{node}' not found in workflow type '{workflow_type}'")]
    NodeNotFound {
        workflow_type: String,
        node: String,
    },

    /// A node's execute raised an error. Fatal to the run.
    #[error("node execution failed: {0}")]
    Node(#[from] NodeError),

    /// Checkpoint store read/write error.
    #[error("persistence error: {0}")]
    Repository(#[from] RepositoryError),

    /// A human response could not be serialized into the data bag.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Status report
// ---------------------------------------------------------------------------

/// Snapshot of one instance's progress, as returned by [`WorkflowEngine::status`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct WorkflowStatusReport {
    pub workflow_id: Uuid,
    pub workflow_type: String,
    pub tenant_id: String,
    pub status: WorkflowStatus,
    pub current_node: String,
    pub data: Map<String, Value>,
    pub history: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<WorkflowCheckpoint> for WorkflowStatusReport {
    fn from(cp: WorkflowCheckpoint) -> Self {
        Self {
            workflow_id: cp.workflow_id,
            workflow_type: cp.workflow_type,
            tenant_id: cp.tenant_id,
            status: cp.status,
            current_node: cp.current_node,
            data: cp.data,
            history: cp.history,
            error: cp.error,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The durable workflow engine.
///
/// Generic over `C: CheckpointRepository` for storage flexibility. The
/// registry and checkpoint store are injected at construction; workflow
/// instances share nothing else.
pub struct WorkflowEngine<C> {
    registry: Arc<WorkflowRegistry>,
    checkpoints: Arc<C>,
    events: EventBus,
    lease_ttl: Duration,
    /// Join handles for detached loops, keyed by workflow ID.
    tasks: Arc<DashMap<Uuid, JoinHandle<()>>>,
}

impl<C> Clone for WorkflowEngine<C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            checkpoints: Arc::clone(&self.checkpoints),
            events: self.events.clone(),
            lease_ttl: self.lease_ttl,
            tasks: Arc::clone(&self.tasks),
        }
    }
}

impl<C: CheckpointRepository + 'static> WorkflowEngine<C> {
    pub fn new(registry: Arc<WorkflowRegistry>, checkpoints: Arc<C>, events: EventBus) -> Self {
        Self {
            registry,
            checkpoints,
            events,
            lease_ttl: DEFAULT_LEASE_TTL,
            tasks: Arc::new(DashMap::new()),
        }
    }

    /// Override the execution lease duration (mainly for tests).
    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// Access the event bus for subscriptions.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // -----------------------------------------------------------------------
    // Public contract
    // -----------------------------------------------------------------------

    /// Start a new workflow instance.
    ///
    /// Fails synchronously with [`EngineError::DefinitionNotFound`] for an
    /// unregistered type. Persists the initial checkpoint, launches the
    /// execution loop as a detached task, and returns the fresh ID without
    /// waiting for any node to execute.
    pub async fn start(
        &self,
        workflow_type: &str,
        tenant_id: &str,
        input: Map<String, Value>,
    ) -> Result<Uuid, EngineError> {
        if !self.registry.contains(workflow_type) {
            return Err(EngineError::DefinitionNotFound(workflow_type.to_string()));
        }

        let workflow_id = Uuid::now_v7();
        let checkpoint = WorkflowCheckpoint::new(
            workflow_id,
            tenant_id.to_string(),
            workflow_type.to_string(),
            input,
        );
        self.checkpoints.save(&checkpoint).await?;

        tracing::info!(
            workflow_id = %workflow_id,
            workflow_type,
            tenant_id,
            "workflow started"
        );
        self.events.publish(WorkflowEvent::InstanceStarted {
            workflow_id,
            workflow_type: workflow_type.to_string(),
            tenant_id: tenant_id.to_string(),
        });

        self.spawn_loop(workflow_id);
        Ok(workflow_id)
    }

    /// Resume a paused workflow with a human response.
    ///
    /// Fails with [`EngineError::NotFoundOrNotPaused`] unless the current
    /// checkpoint is paused. Merges the response into the data bag, sets
    /// the instance running, and relaunches the loop from the current node
    /// (not the entry point).
    pub async fn resume(
        &self,
        workflow_id: Uuid,
        response: HumanResponse,
    ) -> Result<(), EngineError> {
        let checkpoint = self
            .checkpoints
            .load(&workflow_id)
            .await?
            .ok_or(EngineError::NotFoundOrNotPaused(workflow_id))?;

        if checkpoint.status != WorkflowStatus::Paused {
            return Err(EngineError::NotFoundOrNotPaused(workflow_id));
        }

        let mut data = Map::new();
        data.insert(
            HITL_RESPONSE_KEY.to_string(),
            serde_json::to_value(&response)?,
        );
        let patch = CheckpointPatch {
            status: Some(WorkflowStatus::Running),
            data: Some(data),
            ..Default::default()
        };
        self.checkpoints.update(&workflow_id, &patch).await?;

        tracing::info!(
            workflow_id = %workflow_id,
            node = checkpoint.current_node.as_str(),
            approved = response.approved,
            "workflow resumed"
        );
        self.events.publish(WorkflowEvent::InstanceResumed {
            workflow_id,
            node: checkpoint.current_node,
        });

        self.spawn_loop(workflow_id);
        Ok(())
    }

    /// Cancel a workflow instance.
    ///
    /// The loop observes the terminal status at the top of its next
    /// iteration and stops without executing further nodes.
    pub async fn cancel(&self, workflow_id: Uuid) -> Result<(), EngineError> {
        let checkpoint = self
            .checkpoints
            .load(&workflow_id)
            .await?
            .ok_or(EngineError::NotFoundOrNotPaused(workflow_id))?;

        if checkpoint.status.is_terminal() {
            return Err(EngineError::Terminal {
                workflow_id,
                status: checkpoint.status,
            });
        }

        self.checkpoints
            .update(&workflow_id, &CheckpointPatch::status(WorkflowStatus::Cancelled))
            .await?;

        tracing::info!(workflow_id = %workflow_id, "workflow cancelled");
        self.events
            .publish(WorkflowEvent::InstanceCancelled { workflow_id });
        Ok(())
    }

    /// Get a snapshot of an instance's progress.
    pub async fn status(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<WorkflowStatusReport>, EngineError> {
        Ok(self
            .checkpoints
            .load(&workflow_id)
            .await?
            .map(WorkflowStatusReport::from))
    }

    /// Relaunch loops for instances a previous process left behind.
    ///
    /// Sweeps checkpoints in `pending` or `running` status whose execution
    /// lease is absent or expired and spawns a loop for each. Returns the
    /// number of loops relaunched.
    pub async fn recover(&self) -> Result<usize, EngineError> {
        let now = Utc::now();
        let mut relaunched = 0;

        for status in [WorkflowStatus::Pending, WorkflowStatus::Running] {
            for checkpoint in self.checkpoints.list_by_status(status).await? {
                let abandoned = match &checkpoint.lease {
                    None => true,
                    Some(lease) => !lease.is_live(now),
                };
                if abandoned {
                    tracing::info!(
                        workflow_id = %checkpoint.workflow_id,
                        workflow_type = checkpoint.workflow_type.as_str(),
                        "recovering abandoned workflow"
                    );
                    self.spawn_loop(checkpoint.workflow_id);
                    relaunched += 1;
                }
            }
        }

        Ok(relaunched)
    }

    /// Wait for an instance's detached loop to finish (tests, drain-on-shutdown).
    pub async fn await_workflow(&self, workflow_id: Uuid) {
        if let Some((_, handle)) = self.tasks.remove(&workflow_id) {
            let _ = handle.await;
        }
    }

    // -----------------------------------------------------------------------
    // Execution loop
    // -----------------------------------------------------------------------

    /// Launch the loop as a supervised detached task.
    ///
    /// Errors inside the task are recorded on the checkpoint; the caller
    /// never blocks on node execution.
    fn spawn_loop(&self, workflow_id: Uuid) {
        let engine = self.clone();
        let handle = tokio::spawn(async move {
            if let Err(err) = engine.run_loop(workflow_id).await {
                tracing::error!(
                    workflow_id = %workflow_id,
                    error = %err,
                    "workflow loop failed"
                );
                let message = err.to_string();
                if let Err(persist_err) = engine
                    .checkpoints
                    .update(&workflow_id, &CheckpointPatch::failed(message.as_str()))
                    .await
                {
                    tracing::error!(
                        workflow_id = %workflow_id,
                        error = %persist_err,
                        "failed to record workflow failure"
                    );
                }
                engine.events.publish(WorkflowEvent::InstanceFailed {
                    workflow_id,
                    error: message,
                });
            }
        });
        self.tasks.insert(workflow_id, handle);
    }

    /// Acquire the execution lease, drive the instance, release the lease.
    ///
    /// Each invocation owns a distinct lease identity, so a second loop
    /// launched for the same instance -- even inside the same process --
    /// is refused while the first still runs.
    async fn run_loop(&self, workflow_id: Uuid) -> Result<(), EngineError> {
        let owner = Uuid::now_v7();

        let mut acquired = false;
        for _ in 0..LEASE_ACQUIRE_ATTEMPTS {
            if self
                .checkpoints
                .try_acquire_lease(&workflow_id, owner, self.lease_ttl)
                .await?
            {
                acquired = true;
                break;
            }
            tokio::time::sleep(LEASE_ACQUIRE_RETRY_DELAY).await;
        }
        if !acquired {
            tracing::debug!(
                workflow_id = %workflow_id,
                "another loop holds the execution lease, backing off"
            );
            return Ok(());
        }

        let result = self.drive(workflow_id, owner).await;

        if let Err(release_err) = self.checkpoints.release_lease(&workflow_id, owner).await {
            tracing::warn!(
                workflow_id = %workflow_id,
                error = %release_err,
                "failed to release execution lease"
            );
        }

        result
    }

    /// Advance an instance node-by-node until it completes, pauses, or fails.
    async fn drive(&self, workflow_id: Uuid, owner: Uuid) -> Result<(), EngineError> {
        let Some(mut checkpoint) = self.checkpoints.load(&workflow_id).await? else {
            return Ok(());
        };

        if checkpoint.status.is_terminal() || checkpoint.status == WorkflowStatus::Paused {
            return Ok(());
        }

        let definition = self
            .registry
            .get(&checkpoint.workflow_type)
            .map_err(|_| EngineError::DefinitionNotFound(checkpoint.workflow_type.clone()))?;

        if checkpoint.current_node == START_NODE {
            checkpoint.current_node = definition.entry_point().to_string();
        }
        checkpoint.status = WorkflowStatus::Running;
        checkpoint.updated_at = Utc::now();
        self.checkpoints.save(&checkpoint).await?;

        while checkpoint.current_node != END_NODE {
            // Reload before every node: an external pause or cancellation
            // between iterations must halt advancement, and a checkpoint
            // deleted out from under us is a silent stop, not a failure.
            let Some(fresh) = self.checkpoints.load(&workflow_id).await? else {
                return Ok(());
            };
            if matches!(
                fresh.status,
                WorkflowStatus::Paused | WorkflowStatus::Cancelled
            ) {
                tracing::debug!(
                    workflow_id = %workflow_id,
                    status = ?fresh.status,
                    "loop stopping on externally observed status"
                );
                return Ok(());
            }
            checkpoint = fresh;

            if !self
                .checkpoints
                .try_acquire_lease(&workflow_id, owner, self.lease_ttl)
                .await?
            {
                tracing::warn!(
                    workflow_id = %workflow_id,
                    "execution lease lost mid-run, stopping"
                );
                return Ok(());
            }

            let node = definition.node(&checkpoint.current_node).ok_or_else(|| {
                EngineError::NodeNotFound {
                    workflow_type: checkpoint.workflow_type.clone(),
                    node: checkpoint.current_node.clone(),
                }
            })?;

            tracing::debug!(
                workflow_id = %workflow_id,
                node = checkpoint.current_node.as_str(),
                "executing node"
            );
            let update = node.execute_boxed(&checkpoint).await?;

            checkpoint.merge_data(&update.data);
            if let Some(status) = update.status {
                checkpoint.status = status;
            }
            checkpoint.history.push(HistoryEntry {
                node: checkpoint.current_node.clone(),
                timestamp: Utc::now(),
                data: update.data,
            });
            checkpoint.updated_at = Utc::now();
            self.checkpoints.save(&checkpoint).await?;

            self.events.publish(WorkflowEvent::NodeCompleted {
                workflow_id,
                node: checkpoint.current_node.clone(),
            });

            if checkpoint.status == WorkflowStatus::Paused {
                tracing::info!(
                    workflow_id = %workflow_id,
                    node = checkpoint.current_node.as_str(),
                    "workflow paused awaiting human decision"
                );
                return Ok(());
            }

            let next = definition.next_node(&checkpoint.current_node, &checkpoint);
            checkpoint.current_node = next.clone();
            self.checkpoints
                .update(&workflow_id, &CheckpointPatch::current_node(next))
                .await?;
        }

        self.checkpoints
            .update(&workflow_id, &CheckpointPatch::status(WorkflowStatus::Completed))
            .await?;
        tracing::info!(workflow_id = %workflow_id, "workflow completed");
        self.events
            .publish(WorkflowEvent::InstanceCompleted { workflow_id });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
