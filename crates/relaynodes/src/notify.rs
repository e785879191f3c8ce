use crate::time::pause;
use async_trait::async_trait;
use chrono::Utc;
use relaycore::template::render;
use relaycore::{Action, ActionContext, NodeConfig, NodeError, NodeType, TaskResult};

/// Chat notification with simulated delivery
pub struct SlackAction {
    latency_ms: u64,
}

impl SlackAction {
    pub fn new(latency_ms: u64) -> Self {
        Self { latency_ms }
    }
}

#[async_trait]
impl Action for SlackAction {
    fn node_type(&self) -> NodeType {
        NodeType::Slack
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<TaskResult, NodeError> {
        let NodeConfig::Slack(config) = &ctx.node.config else {
            return Err(NodeError::Configuration(format!(
                "Node '{}' is not a slack node",
                ctx.node.id
            )));
        };

        let values = ctx.values();
        let channel = render(config.channel.as_deref().unwrap_or_default(), values);
        if channel.trim().is_empty() {
            return Err(NodeError::Configuration("Slack node requires a 'channel'".into()));
        }
        let message = render(config.message.as_deref().unwrap_or_default(), values);

        pause(self.latency_ms, &ctx.cancellation).await?;
        tracing::info!(node_id = %ctx.node.id, channel = %channel, "Slack message posted");

        Ok(TaskResult::success()
            .with_field("channel", channel)
            .with_field("message", message)
            .with_field("ts", Utc::now().to_rfc3339()))
    }
}

/// Outbound webhook with simulated delivery
pub struct WebhookAction {
    latency_ms: u64,
}

impl WebhookAction {
    pub fn new(latency_ms: u64) -> Self {
        Self { latency_ms }
    }
}

#[async_trait]
impl Action for WebhookAction {
    fn node_type(&self) -> NodeType {
        NodeType::Webhook
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<TaskResult, NodeError> {
        pause(self.latency_ms, &ctx.cancellation).await?;

        let delivery_id = format!("whd_{}", uuid::Uuid::new_v4().simple());
        let mut result = TaskResult::success().with_field("deliveryId", delivery_id.clone());

        if let NodeConfig::Webhook(config) = &ctx.node.config {
            if let Some(url) = &config.url {
                result = result.with_field("url", render(url, ctx.values()));
            }
            if let Some(event) = &config.event {
                result = result.with_field("event", event.clone());
            }
        }

        tracing::info!(node_id = %ctx.node.id, delivery_id = %delivery_id, "Webhook delivered");
        Ok(result)
    }
}
