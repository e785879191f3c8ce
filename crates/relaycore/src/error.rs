use crate::NodeType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("{message}")]
    Validation {
        message: String,
        node_id: Option<String>,
    },

    #[error("No action registered for node type {0}")]
    UnregisteredAction(NodeType),

    #[error("Node '{node_id}' failed: {message}")]
    TaskFailed { node_id: String, message: String },

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Node id responsible for the failure, when there is one.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            EngineError::Validation { node_id, .. } => node_id.as_deref(),
            EngineError::TaskFailed { node_id, .. } => Some(node_id),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Edge {source_id} -> {target_id} references unknown node '{missing}'")]
    UnknownNode {
        source_id: String,
        target_id: String,
        missing: String,
    },

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Expression parse error: {0}")]
    Parse(String),

    #[error("Expression evaluation error: {0}")]
    Evaluation(String),

    #[error("Expression must evaluate to a boolean, got {0}")]
    NotBoolean(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error("Task timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Cancelled")]
    Cancelled,
}

impl NodeError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, NodeError::ExecutionFailed(_) | NodeError::Timeout { .. })
    }
}
