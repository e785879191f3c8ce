use crate::{ExecutionId, NodeError, NodeSpec, NodeType, RunContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Core trait that every node action implements
#[async_trait]
pub trait Action: Send + Sync {
    /// Node type this action runs
    fn node_type(&self) -> NodeType;

    /// Execute one attempt for the node in `ctx`
    async fn execute(&self, ctx: &ActionContext) -> Result<TaskResult, NodeError>;
}

/// Execution context passed to each action attempt
#[derive(Clone)]
pub struct ActionContext {
    pub execution_id: ExecutionId,

    /// Node being executed
    pub node: Arc<NodeSpec>,

    /// Caller-supplied run input
    pub input: Arc<Map<String, Value>>,

    /// Snapshot of the run context taken before the first attempt
    pub context: Arc<RunContext>,

    /// Cancellation token for the whole run
    pub cancellation: CancellationToken,
}

impl ActionContext {
    pub fn new(node: NodeSpec, context: RunContext) -> Self {
        Self {
            execution_id: ExecutionId::new_v4(),
            node: Arc::new(node),
            input: Arc::new(Map::new()),
            context: Arc::new(context),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_input(mut self, input: Map<String, Value>) -> Self {
        self.input = Arc::new(input);
        self
    }

    /// Context values, for template rendering and expressions
    pub fn values(&self) -> &Map<String, Value> {
        self.context.as_map()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Success,
    Failed,
}

/// Outcome of one node execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub status: TaskStatus,

    /// Payload merged into the run context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,

    /// Selects which labelled outgoing edges may activate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
}

impl TaskResult {
    pub fn success() -> Self {
        Self {
            status: TaskStatus::Success,
            data: None,
            branch: None,
            logs: Vec::new(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            data: None,
            branch: None,
            logs: vec![reason.into()],
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_log(mut self, line: impl Into<String>) -> Self {
        self.logs.push(line.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}

impl Default for TaskResult {
    fn default() -> Self {
        Self::success()
    }
}
