use async_trait::async_trait;
use relaycore::template::render_value;
use relaycore::{Action, ActionContext, NodeConfig, NodeError, NodeType, TaskResult};
use serde_json::Map;

/// Builds a new object by rendering each `mapper` entry against the context
pub struct TransformAction;

#[async_trait]
impl Action for TransformAction {
    fn node_type(&self) -> NodeType {
        NodeType::Transform
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<TaskResult, NodeError> {
        let NodeConfig::Transform(config) = &ctx.node.config else {
            return Err(NodeError::Configuration(format!(
                "Node '{}' is not a transform node",
                ctx.node.id
            )));
        };

        let values = ctx.values();
        let mapped: Map<_, _> = config
            .mapper
            .iter()
            .map(|(key, template)| (key.clone(), render_value(template, values)))
            .collect();

        tracing::debug!(node_id = %ctx.node.id, keys = mapped.len(), "Transform applied");
        Ok(TaskResult::success().with_data(mapped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycore::{NodeSpec, RunContext, TransformConfig};
    use serde_json::json;

    #[tokio::test]
    async fn renders_every_mapper_entry() {
        let mapper = json!({
            "greeting": "Hello {{ user.name }}",
            "plan": "{{ user.plan }}",
            "fixed": 3
        });
        let ctx = ActionContext::new(
            NodeSpec::new(
                "shape",
                NodeConfig::Transform(TransformConfig {
                    mapper: mapper.as_object().cloned().unwrap(),
                }),
            ),
            RunContext::new(
                json!({"user": {"name": "Ada", "plan": "pro"}})
                    .as_object()
                    .cloned()
                    .unwrap(),
            ),
        );

        let data = TransformAction.execute(&ctx).await.unwrap().data.unwrap();
        assert_eq!(data["greeting"], "Hello Ada");
        assert_eq!(data["plan"], "pro");
        assert_eq!(data["fixed"], 3);
    }
}
