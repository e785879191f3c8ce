use crate::{NodeId, NodeType, TaskStatus, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Events emitted during workflow execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ExecutionEvent {
    ExecutionStarted {
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        timestamp: DateTime<Utc>,
    },
    TaskStarted {
        execution_id: ExecutionId,
        node_id: NodeId,
        node_type: NodeType,
        timestamp: DateTime<Utc>,
    },
    TaskCompleted {
        execution_id: ExecutionId,
        node_id: NodeId,
        status: TaskStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Map<String, Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch: Option<String>,
        attempts: u32,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    TaskFailed {
        execution_id: ExecutionId,
        node_id: NodeId,
        error: String,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },
    ExecutionCompleted {
        execution_id: ExecutionId,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_id: Option<NodeId>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// Discriminant of an [`ExecutionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    ExecutionStarted,
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    ExecutionCompleted,
}

impl ExecutionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ExecutionEvent::ExecutionStarted { .. } => EventKind::ExecutionStarted,
            ExecutionEvent::TaskStarted { .. } => EventKind::TaskStarted,
            ExecutionEvent::TaskCompleted { .. } => EventKind::TaskCompleted,
            ExecutionEvent::TaskFailed { .. } => EventKind::TaskFailed,
            ExecutionEvent::ExecutionCompleted { .. } => EventKind::ExecutionCompleted,
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        match self {
            ExecutionEvent::ExecutionStarted { execution_id, .. }
            | ExecutionEvent::TaskStarted { execution_id, .. }
            | ExecutionEvent::TaskCompleted { execution_id, .. }
            | ExecutionEvent::TaskFailed { execution_id, .. }
            | ExecutionEvent::ExecutionCompleted { execution_id, .. } => *execution_id,
        }
    }

    /// Node the event is about; the failing node for a failed run.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            ExecutionEvent::TaskStarted { node_id, .. }
            | ExecutionEvent::TaskCompleted { node_id, .. }
            | ExecutionEvent::TaskFailed { node_id, .. } => Some(node_id),
            ExecutionEvent::ExecutionCompleted { node_id, .. } => node_id.as_deref(),
            ExecutionEvent::ExecutionStarted { .. } => None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ExecutionEvent::ExecutionStarted { timestamp, .. }
            | ExecutionEvent::TaskStarted { timestamp, .. }
            | ExecutionEvent::TaskCompleted { timestamp, .. }
            | ExecutionEvent::TaskFailed { timestamp, .. }
            | ExecutionEvent::ExecutionCompleted { timestamp, .. } => *timestamp,
        }
    }
}
