use crate::activation::{edge_activates, ActivationTracker};
use crate::registry::ActionRegistry;
use crate::retry::{RetryError, RetryPolicy};
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use relaycore::{
    validation_issues, Action, ActionContext, EngineError, EventBus, ExecutionEvent, ExecutionId,
    ExecutionMode, Graph, NodeError, NodeId, NodeSpec, RunContext, TaskResult, Workflow,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-event callback for live streaming.
pub type EventCallback = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

/// Observers and controls for a single run.
#[derive(Clone, Default)]
pub struct RunOptions {
    pub execution_id: Option<ExecutionId>,
    pub on_event: Option<EventCallback>,
    pub bus: Option<Arc<EventBus>>,
    pub cancellation: CancellationToken,
}

impl RunOptions {
    pub fn with_execution_id(mut self, execution_id: ExecutionId) -> Self {
        self.execution_id = Some(execution_id);
        self
    }

    pub fn with_callback(mut self, callback: EventCallback) -> Self {
        self.on_event = Some(callback);
        self
    }

    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// Executes workflows layer by layer with bounded parallelism
pub struct WorkflowExecutor {
    max_parallel: usize,
    retry_backoff: Duration,
    promote_outputs: bool,
}

impl WorkflowExecutor {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
            retry_backoff: Duration::from_millis(150),
            promote_outputs: true,
        }
    }

    /// Step of the linear backoff between attempts
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Whether node outputs are also merged into the top level of the context
    pub fn with_output_promotion(mut self, promote: bool) -> Self {
        self.promote_outputs = promote;
        self
    }

    /// Execute a workflow and return results
    pub async fn execute(
        &self,
        workflow: &Workflow,
        registry: &ActionRegistry,
        input: Map<String, Value>,
        options: RunOptions,
    ) -> Result<ExecutionResult, EngineError> {
        let execution_id = options.execution_id.unwrap_or_else(ExecutionId::new_v4);
        let recorder = EventRecorder::new(options.on_event, options.bus);
        let start_time = Instant::now();

        let graph = match prepare(workflow, registry) {
            Ok(graph) => graph,
            Err(e) => {
                tracing::warn!(%execution_id, workflow_id = %workflow.id, "Workflow rejected: {}", e);
                recorder.emit(completion_event(execution_id, Some(&e), 0));
                return Err(e);
            }
        };

        recorder.emit(ExecutionEvent::ExecutionStarted {
            execution_id,
            workflow_id: workflow.id.clone(),
            timestamp: Utc::now(),
        });

        tracing::info!(
            %execution_id,
            workflow_id = %workflow.id,
            nodes = graph.len(),
            "Starting workflow execution"
        );

        let run = RunState {
            execution_id,
            graph: &graph,
            registry,
            events: &recorder,
            input: Arc::new(input.clone()),
            context: RwLock::new(RunContext::new(input)),
            visited: Mutex::new(HashSet::new()),
            results: Mutex::new(BTreeMap::new()),
            cancellation: options.cancellation,
        };

        let outcome = self.execute_graph(&run).await;
        let duration_ms = start_time.elapsed().as_millis() as u64;

        match &outcome {
            Ok(()) => tracing::info!(%execution_id, duration_ms, "Workflow completed"),
            Err(e) => tracing::error!(%execution_id, duration_ms, "Workflow failed: {}", e),
        }

        recorder.emit(completion_event(execution_id, outcome.as_ref().err(), duration_ms));
        outcome?;

        let (shared_context, results) = run.into_parts();
        Ok(ExecutionResult {
            execution_id,
            events: recorder.into_events(),
            shared_context,
            results,
            duration_ms,
        })
    }

    /// Drive batches until the frontier is empty
    async fn execute_graph(&self, run: &RunState<'_>) -> Result<(), EngineError> {
        let mut tracker = ActivationTracker::new(run.graph);
        let mut batch: Vec<Arc<NodeSpec>> = run
            .graph
            .entry_nodes()
            .iter()
            .filter_map(|id| run.graph.node(id).cloned())
            .collect();
        let mut layer = 0usize;

        while !batch.is_empty() {
            if run.cancellation.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            tracing::debug!(
                execution_id = %run.execution_id,
                layer,
                size = batch.len(),
                "Running batch"
            );

            let (sequential, parallel): (Vec<_>, Vec<_>) = batch
                .into_iter()
                .partition(|node| node.execution_mode == ExecutionMode::Sequential);

            let mut executed = Vec::with_capacity(sequential.len() + parallel.len());
            for node in sequential {
                if let Some(result) = self.run_node(&node, run).await? {
                    executed.push((node, result));
                }
            }
            executed.extend(self.run_parallel(&parallel, run).await?);

            batch = advance(&executed, &mut tracker, run).await;
            layer += 1;
        }

        Ok(())
    }

    /// Run parallel-mode nodes, at most `max_parallel` in flight
    async fn run_parallel(
        &self,
        nodes: &[Arc<NodeSpec>],
        run: &RunState<'_>,
    ) -> Result<Vec<(Arc<NodeSpec>, TaskResult)>, EngineError> {
        let mut pending = nodes.iter().enumerate();
        let mut running = FuturesUnordered::new();
        let mut finished = Vec::with_capacity(nodes.len());
        let mut failure: Option<EngineError> = None;

        loop {
            // A failure stops new launches; in-flight siblings still finish.
            while failure.is_none() && running.len() < self.max_parallel {
                let Some((position, node)) = pending.next() else {
                    break;
                };
                running.push(async move { (position, node, self.run_node(node, run).await) });
            }

            let Some((position, node, outcome)) = running.next().await else {
                break;
            };

            match outcome {
                Ok(Some(result)) => finished.push((position, Arc::clone(node), result)),
                Ok(None) => {}
                Err(e) if failure.is_none() => failure = Some(e),
                Err(e) => tracing::debug!(node_id = %node.id, "Additional failure in batch: {}", e),
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }

        finished.sort_by_key(|(position, _, _)| *position);
        Ok(finished
            .into_iter()
            .map(|(_, node, result)| (node, result))
            .collect())
    }

    /// Execute one node under its retry and timeout policy
    async fn run_node(
        &self,
        node: &Arc<NodeSpec>,
        run: &RunState<'_>,
    ) -> Result<Option<TaskResult>, EngineError> {
        let execution_id = run.execution_id;

        if !run.mark_visited(&node.id) {
            tracing::debug!(%execution_id, node_id = %node.id, "Node already executed, skipping");
            return Ok(None);
        }

        let node_type = node.node_type();
        let action = run.registry.resolve(node_type)?;

        run.events.emit(ExecutionEvent::TaskStarted {
            execution_id,
            node_id: node.id.clone(),
            node_type,
            timestamp: Utc::now(),
        });

        let ctx = ActionContext {
            execution_id,
            node: Arc::clone(node),
            input: Arc::clone(&run.input),
            context: Arc::new(run.context.read().await.clone()),
            cancellation: run.cancellation.clone(),
        };

        let policy = RetryPolicy::for_node(node, self.retry_backoff);
        let handler: &dyn Action = action.as_ref();
        let ctx_ref = &ctx;
        let start = Instant::now();
        let outcome = policy
            .run(&run.cancellation, move || attempt(handler, ctx_ref))
            .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok((result, attempts)) => {
                if let Some(data) = &result.data {
                    let overwritten = run
                        .context
                        .write()
                        .await
                        .merge_output(&node.id, data, self.promote_outputs);
                    for key in overwritten {
                        tracing::warn!(
                            %execution_id,
                            node_id = %node.id,
                            key = %key,
                            "Node output overwrote an existing context key"
                        );
                    }
                }

                tracing::info!(
                    %execution_id,
                    node_id = %node.id,
                    %node_type,
                    attempts,
                    "Node completed in {}ms",
                    duration_ms
                );

                run.events.emit(ExecutionEvent::TaskCompleted {
                    execution_id,
                    node_id: node.id.clone(),
                    status: result.status,
                    output: result.data.clone(),
                    branch: result.branch.clone(),
                    attempts,
                    duration_ms,
                    timestamp: Utc::now(),
                });

                run.record_result(&node.id, result.clone());
                Ok(Some(result))
            }
            Err(RetryError { error, attempts }) => {
                tracing::error!(
                    %execution_id,
                    node_id = %node.id,
                    %node_type,
                    attempts,
                    "Node failed: {}",
                    error
                );

                run.events.emit(ExecutionEvent::TaskFailed {
                    execution_id,
                    node_id: node.id.clone(),
                    error: error.to_string(),
                    attempts,
                    timestamp: Utc::now(),
                });

                Err(match error {
                    NodeError::Cancelled => EngineError::Cancelled,
                    other => EngineError::TaskFailed {
                        node_id: node.id.clone(),
                        message: other.to_string(),
                    },
                })
            }
        }
    }
}

/// Validate, build the graph and make sure every node type can run
fn prepare(workflow: &Workflow, registry: &ActionRegistry) -> Result<Graph, EngineError> {
    if let Some(issue) = validation_issues(workflow).into_iter().next() {
        return Err(EngineError::Validation {
            message: issue.message,
            node_id: issue.node_id,
        });
    }

    let graph = Graph::build(workflow)?;
    for node in graph.nodes() {
        registry.resolve(node.node_type())?;
    }
    Ok(graph)
}

/// One attempt; a FAILED result counts as an error
async fn attempt(action: &dyn Action, ctx: &ActionContext) -> Result<TaskResult, NodeError> {
    let result = action.execute(ctx).await?;
    if result.is_success() {
        Ok(result)
    } else {
        let reason = result
            .logs
            .last()
            .cloned()
            .unwrap_or_else(|| "task reported failure".to_string());
        Err(NodeError::ExecutionFailed(reason))
    }
}

/// Evaluate outgoing edges of the finished batch and compute the next one
async fn advance(
    executed: &[(Arc<NodeSpec>, TaskResult)],
    tracker: &mut ActivationTracker,
    run: &RunState<'_>,
) -> Vec<Arc<NodeSpec>> {
    let context = run.context.read().await;
    let mut touched: Vec<&str> = Vec::new();

    for (node, result) in executed {
        for edge in run.graph.outgoing_edges(&node.id) {
            let activated = edge_activates(edge, result, &context);
            tracker.record(&edge.target, activated);

            tracing::debug!(
                execution_id = %run.execution_id,
                source = %edge.source,
                target = %edge.target,
                activated,
                "Evaluated edge"
            );

            if !touched.contains(&edge.target.as_str()) {
                touched.push(edge.target.as_str());
            }
        }
    }

    touched
        .into_iter()
        .filter(|id| tracker.is_ready(id))
        .filter_map(|id| run.graph.node(id).cloned())
        .collect()
}

fn completion_event(
    execution_id: ExecutionId,
    failure: Option<&EngineError>,
    duration_ms: u64,
) -> ExecutionEvent {
    ExecutionEvent::ExecutionCompleted {
        execution_id,
        success: failure.is_none(),
        error: failure.map(ToString::to_string),
        node_id: failure.and_then(EngineError::node_id).map(str::to_string),
        duration_ms,
        timestamp: Utc::now(),
    }
}

/// Mutable state of one run, shared by the nodes of a batch
struct RunState<'a> {
    execution_id: ExecutionId,
    graph: &'a Graph,
    registry: &'a ActionRegistry,
    events: &'a EventRecorder,
    input: Arc<Map<String, Value>>,
    context: RwLock<RunContext>,
    visited: Mutex<HashSet<NodeId>>,
    results: Mutex<BTreeMap<NodeId, TaskResult>>,
    cancellation: CancellationToken,
}

impl RunState<'_> {
    /// Returns false when the node already ran in this execution
    fn mark_visited(&self, node_id: &str) -> bool {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node_id.to_string())
    }

    fn record_result(&self, node_id: &str, result: TaskResult) {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node_id.to_string(), result);
    }

    fn into_parts(self) -> (Map<String, Value>, BTreeMap<NodeId, TaskResult>) {
        let results = self
            .results
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        (self.context.into_inner().into_inner(), results)
    }
}

/// Collects events for the result and forwards them to live observers
struct EventRecorder {
    events: Mutex<Vec<ExecutionEvent>>,
    callback: Option<EventCallback>,
    bus: Option<Arc<EventBus>>,
}

impl EventRecorder {
    fn new(callback: Option<EventCallback>, bus: Option<Arc<EventBus>>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            callback,
            bus,
        }
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(callback) = &self.callback {
            callback(&event);
        }
        if let Some(bus) = &self.bus {
            bus.emit(event.clone());
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn into_events(self) -> Vec<ExecutionEvent> {
        self.events.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Result of workflow execution
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub execution_id: ExecutionId,
    pub events: Vec<ExecutionEvent>,
    pub shared_context: Map<String, Value>,
    pub results: BTreeMap<NodeId, TaskResult>,
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Whether the node produced a result in this run
    pub fn executed(&self, node_id: &str) -> bool {
        self.results.contains_key(node_id)
    }

    /// Node ids in the order their tasks started
    pub fn execution_order(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter(|e| matches!(e, ExecutionEvent::TaskStarted { .. }))
            .filter_map(ExecutionEvent::node_id)
            .collect()
    }
}
