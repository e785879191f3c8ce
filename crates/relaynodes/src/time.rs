use async_trait::async_trait;
use relaycore::{Action, ActionContext, NodeConfig, NodeError, NodeType, TaskResult};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// Sleep for `ms`, returning early with `Cancelled` if the run is cancelled
pub(crate) async fn pause(ms: u64, cancellation: &CancellationToken) -> Result<(), NodeError> {
    tokio::select! {
        _ = cancellation.cancelled() => Err(NodeError::Cancelled),
        _ = sleep(Duration::from_millis(ms)) => Ok(()),
    }
}

/// Delay execution for the configured duration, capped
pub struct DelayAction {
    cap_ms: u64,
}

impl DelayAction {
    pub fn new(cap_ms: u64) -> Self {
        Self { cap_ms }
    }
}

#[async_trait]
impl Action for DelayAction {
    fn node_type(&self) -> NodeType {
        NodeType::Delay
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<TaskResult, NodeError> {
        let configured = match &ctx.node.config {
            NodeConfig::Delay(config) => config.duration_ms.ok_or_else(|| {
                NodeError::Configuration("Delay node requires a numeric 'durationMs'".into())
            })?,
            _ => {
                return Err(NodeError::Configuration(format!(
                    "Node '{}' is not a delay node",
                    ctx.node.id
                )))
            }
        };

        let waited = configured.min(self.cap_ms);
        if waited < configured {
            tracing::debug!(node_id = %ctx.node.id, configured, waited, "Delay capped");
        }

        pause(waited, &ctx.cancellation).await?;

        Ok(TaskResult::success().with_field("waitedMs", configured))
    }
}
