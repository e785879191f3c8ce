use async_trait::async_trait;
use relaycore::{
    Action, ActionContext, ExpressionEvaluator, NodeConfig, NodeError, NodeType, TaskResult,
};
use serde_json::Value;

/// Entry point: publishes the run input
pub struct StartAction;

#[async_trait]
impl Action for StartAction {
    fn node_type(&self) -> NodeType {
        NodeType::Start
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<TaskResult, NodeError> {
        Ok(TaskResult::success().with_data(ctx.input.as_ref().clone()))
    }
}

/// Terminal marker
pub struct EndAction;

#[async_trait]
impl Action for EndAction {
    fn node_type(&self) -> NodeType {
        NodeType::End
    }

    async fn execute(&self, _ctx: &ActionContext) -> Result<TaskResult, NodeError> {
        Ok(TaskResult::success())
    }
}

/// Evaluates a boolean expression and selects a branch label
#[derive(Default)]
pub struct ConditionalAction {
    evaluator: ExpressionEvaluator,
}

impl ConditionalAction {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Action for ConditionalAction {
    fn node_type(&self) -> NodeType {
        NodeType::Conditional
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<TaskResult, NodeError> {
        let NodeConfig::Conditional(config) = &ctx.node.config else {
            return Err(NodeError::Configuration(format!(
                "Node '{}' is not a conditional node",
                ctx.node.id
            )));
        };

        let expression = config
            .expression
            .as_deref()
            .ok_or_else(|| NodeError::Configuration("Conditional node requires an 'expression'".into()))?;

        let result = self.evaluator.evaluate(expression, ctx.values())?;
        let branch = if result {
            &config.branch_true
        } else {
            &config.branch_false
        };

        tracing::debug!(node_id = %ctx.node.id, expression, result, branch = %branch, "Condition evaluated");

        Ok(TaskResult::success()
            .with_field("result", Value::Bool(result))
            .with_branch(branch.clone()))
    }
}
