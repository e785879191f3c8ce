use crate::node_config::NodeConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Opaque definition id; generated when absent.
pub type WorkflowId = String;
pub type NodeId = String;

/// Complete workflow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default = "generate_workflow_id")]
    pub id: WorkflowId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_workflow_id(),
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn add_node(&mut self, node: NodeSpec) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Add an unconditional edge.
    pub fn connect(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.edges.push(Edge::new(source, target));
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

fn generate_workflow_id() -> WorkflowId {
    Uuid::new_v4().to_string()
}

/// Closed set of node kinds the engine knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Start,
    End,
    Email,
    Slack,
    Http,
    Delay,
    Conditional,
    Transform,
    Webhook,
}

impl NodeType {
    pub const ALL: [NodeType; 9] = [
        NodeType::Start,
        NodeType::End,
        NodeType::Email,
        NodeType::Slack,
        NodeType::Http,
        NodeType::Delay,
        NodeType::Conditional,
        NodeType::Transform,
        NodeType::Webhook,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Start => "START",
            NodeType::End => "END",
            NodeType::Email => "EMAIL",
            NodeType::Slack => "SLACK",
            NodeType::Http => "HTTP",
            NodeType::Delay => "DELAY",
            NodeType::Conditional => "CONDITIONAL",
            NodeType::Transform => "TRANSFORM",
            NodeType::Webhook => "WEBHOOK",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Node specification in a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNodeSpec", into = "RawNodeSpec")]
pub struct NodeSpec {
    pub id: NodeId,
    pub label: Option<String>,
    pub config: NodeConfig,
    pub execution_mode: ExecutionMode,
    pub retries: u32,
    pub timeout_ms: u64,
    pub position: Option<Position>,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            id: id.into(),
            label: None,
            config,
            execution_mode: ExecutionMode::Sequential,
            retries: DEFAULT_RETRIES,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            position: None,
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.config.node_type()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn parallel(mut self) -> Self {
        self.execution_mode = ExecutionMode::Parallel;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Some(Position { x, y });
        self
    }
}

/// Wire form of a node; `config` is decoded against `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNodeSpec {
    id: NodeId,
    #[serde(rename = "type")]
    node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default)]
    config: Value,
    #[serde(default)]
    execution_mode: ExecutionMode,
    #[serde(default = "default_retries")]
    retries: u32,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    position: Option<Position>,
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl TryFrom<RawNodeSpec> for NodeSpec {
    type Error = serde_json::Error;

    fn try_from(raw: RawNodeSpec) -> Result<Self, Self::Error> {
        Ok(Self {
            config: NodeConfig::from_value(raw.node_type, raw.config)?,
            id: raw.id,
            label: raw.label,
            execution_mode: raw.execution_mode,
            retries: raw.retries,
            timeout_ms: raw.timeout_ms,
            position: raw.position,
        })
    }
}

impl From<NodeSpec> for RawNodeSpec {
    fn from(node: NodeSpec) -> Self {
        Self {
            node_type: node.node_type(),
            config: node.config.to_value(),
            id: node.id,
            label: node.label,
            execution_mode: node.execution_mode,
            retries: node.retries,
            timeout_ms: node.timeout_ms,
            position: node.position,
        }
    }
}

/// Node position in visual editor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Directed connection between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    /// Branch tag matched against the source result's `branch`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<EdgeCondition>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: None,
            condition: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_condition(
        mut self,
        field: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<Value>,
    ) -> Self {
        self.condition = Some(EdgeCondition {
            field: field.into(),
            operator,
            value: value.into(),
        });
        self
    }
}

/// Data predicate gating an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeCondition {
    /// Dot path into the run context.
    pub field: String,
    pub operator: ConditionOperator,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Includes,
    #[serde(other)]
    Unknown,
}
