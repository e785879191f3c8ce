use crate::executor::{EventCallback, ExecutionResult, RunOptions, WorkflowExecutor};
use crate::registry::ActionRegistry;
use relaycore::{
    validation_issues, EngineError, EventBus, EventSubscription, ExecutionId, ValidationIssue,
    Workflow,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Main runtime for executing workflows
#[derive(Clone)]
pub struct RelayRuntime {
    registry: Arc<ActionRegistry>,
    executor: Arc<WorkflowExecutor>,
    config: RuntimeConfig,
}

impl RelayRuntime {
    /// Create a runtime with an empty registry and default settings
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(ActionRegistry::new()), config)
    }

    /// Create a runtime with a pre-configured registry
    pub fn with_registry(registry: Arc<ActionRegistry>, config: RuntimeConfig) -> Self {
        let executor = WorkflowExecutor::new(config.max_parallel_nodes)
            .with_retry_backoff(Duration::from_millis(config.retry_backoff_ms))
            .with_output_promotion(config.promote_outputs);

        Self {
            registry,
            executor: Arc::new(executor),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Static checks, without running anything
    pub fn validate(&self, workflow: &Workflow) -> Vec<ValidationIssue> {
        validation_issues(workflow)
    }

    /// Run a workflow to completion, streaming events to `on_event`
    pub async fn run_workflow(
        &self,
        workflow: &Workflow,
        input: Map<String, Value>,
        on_event: Option<EventCallback>,
    ) -> Result<ExecutionResult, EngineError> {
        let options = RunOptions {
            on_event,
            ..RunOptions::default()
        };
        self.execute(workflow, input, options).await
    }

    /// Run a workflow with explicit observers and cancellation
    pub async fn execute(
        &self,
        workflow: &Workflow,
        input: Map<String, Value>,
        options: RunOptions,
    ) -> Result<ExecutionResult, EngineError> {
        self.executor
            .execute(workflow, &self.registry, input, options)
            .await
    }

    /// Start a run in the background.
    ///
    /// The handle exposes a replaying event stream, so subscribers that
    /// attach late still observe the run from EXECUTION_STARTED onwards
    /// (up to `replay_buffer_size` events).
    pub fn spawn(&self, workflow: Workflow, input: Map<String, Value>) -> RunHandle {
        let execution_id = ExecutionId::new_v4();
        let events = Arc::new(EventBus::new(
            self.config.event_buffer_size,
            self.config.replay_buffer_size,
        ));
        let cancellation = CancellationToken::new();

        let options = RunOptions::default()
            .with_execution_id(execution_id)
            .with_bus(Arc::clone(&events))
            .with_cancellation(cancellation.clone());

        let runtime = self.clone();
        let task =
            tokio::spawn(async move { runtime.execute(&workflow, input, options).await });

        tracing::debug!(%execution_id, "Spawned workflow run");

        RunHandle {
            execution_id,
            events,
            cancellation,
            task,
        }
    }
}

impl Default for RelayRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a run started with [`RelayRuntime::spawn`]
pub struct RunHandle {
    execution_id: ExecutionId,
    events: Arc<EventBus>,
    cancellation: CancellationToken,
    task: JoinHandle<Result<ExecutionResult, EngineError>>,
}

impl RunHandle {
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Stream of this run's events, starting with the retained backlog
    pub fn subscribe(&self) -> EventSubscription {
        self.events.subscribe()
    }

    /// Request cancellation; in-flight attempts are interrupted
    pub fn cancel(&self) {
        tracing::info!(execution_id = %self.execution_id, "Cancelling workflow run");
        self.cancellation.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to finish
    pub async fn join(self) -> Result<ExecutionResult, EngineError> {
        self.task
            .await
            .map_err(|e| EngineError::Execution(format!("Run task failed: {}", e)))?
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on concurrently running parallel-mode nodes
    pub max_parallel_nodes: usize,
    pub event_buffer_size: usize,
    /// Events retained for late subscribers of a spawned run
    pub replay_buffer_size: usize,
    pub retry_backoff_ms: u64,
    /// Merge node outputs into the top level of the context as well as
    /// under the node id
    pub promote_outputs: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 4,
            event_buffer_size: 1000,
            replay_buffer_size: 256,
            retry_backoff_ms: 150,
            promote_outputs: true,
        }
    }
}
