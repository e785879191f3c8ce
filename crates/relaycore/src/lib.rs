//! Core abstractions for the relay workflow engine
//!
//! Workflow definitions, the indexed graph, static validation, template
//! rendering, the condition evaluator, the run context, events and the
//! `Action` trait that every node type implements. No scheduling lives here.

pub mod condition;
pub mod context;
mod error;
pub mod events;
mod graph;
mod node;
mod node_config;
pub mod template;
pub mod validation;
mod workflow;

pub use condition::ExpressionEvaluator;
pub use context::RunContext;
pub use error::{EngineError, ExpressionError, GraphError, NodeError};
pub use events::*;
pub use graph::Graph;
pub use node::{Action, ActionContext, TaskResult, TaskStatus};
pub use node_config::{
    ConditionalConfig, DelayConfig, EmailConfig, HttpConfig, NodeConfig, SlackConfig,
    TransformConfig, WebhookConfig,
};
pub use validation::{validation_issues, ValidationIssue};
pub use workflow::{
    ConditionOperator, Edge, EdgeCondition, ExecutionMode, NodeId, NodeSpec, NodeType, Position,
    Workflow, WorkflowId, DEFAULT_RETRIES, DEFAULT_TIMEOUT_MS,
};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
