use crate::time::pause;
use async_trait::async_trait;
use relaycore::template::{render, render_value};
use relaycore::{Action, ActionContext, NodeConfig, NodeError, NodeType, TaskResult};
use serde_json::Value;

const METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// HTTP request node.
///
/// The request is simulated: after the configured latency it reports a 200
/// response for the rendered method and url.
pub struct HttpAction {
    latency_ms: u64,
}

impl HttpAction {
    pub fn new(latency_ms: u64) -> Self {
        Self { latency_ms }
    }
}

#[async_trait]
impl Action for HttpAction {
    fn node_type(&self) -> NodeType {
        NodeType::Http
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<TaskResult, NodeError> {
        let NodeConfig::Http(config) = &ctx.node.config else {
            return Err(NodeError::Configuration(format!(
                "Node '{}' is not an http node",
                ctx.node.id
            )));
        };

        let values = ctx.values();
        let url = render(config.url.as_deref().unwrap_or_default(), values);
        if url.trim().is_empty() {
            return Err(NodeError::Configuration("HTTP node requires a 'url'".into()));
        }

        let method = config.method.to_uppercase();
        if !METHODS.contains(&method.as_str()) {
            return Err(NodeError::Configuration(format!("Unsupported method: {}", method)));
        }

        tracing::info!(node_id = %ctx.node.id, "{} {}", method, url);
        pause(self.latency_ms, &ctx.cancellation).await?;

        let mut result = TaskResult::success()
            .with_field("method", method)
            .with_field("url", url)
            .with_field("status", 200);

        if !config.headers.is_empty() {
            let headers: serde_json::Map<_, _> = config
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), render_value(v, values)))
                .collect();
            result = result.with_field("headers", Value::Object(headers));
        }

        if let Some(body) = &config.body {
            let rendered = match body {
                Value::Object(fields) => Value::Object(
                    fields
                        .iter()
                        .map(|(k, v)| (k.clone(), render_value(v, values)))
                        .collect(),
                ),
                other => render_value(other, values),
            };
            result = result.with_field("body", rendered);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycore::{HttpConfig, NodeSpec, RunContext};
    use serde_json::json;

    fn http(config: HttpConfig) -> ActionContext {
        ActionContext::new(
            NodeSpec::new("call", NodeConfig::Http(config)),
            RunContext::new(json!({"id": 7}).as_object().cloned().unwrap()),
        )
    }

    #[tokio::test]
    async fn reports_simulated_success() {
        let ctx = http(HttpConfig {
            url: Some("https://api.example.com/leads/{{ id }}".into()),
            method: "post".into(),
            body: Some(json!({"lead": "{{ id }}", "n": 1})),
            ..Default::default()
        });

        let data = HttpAction::new(1).execute(&ctx).await.unwrap().data.unwrap();
        assert_eq!(data["method"], "POST");
        assert_eq!(data["url"], "https://api.example.com/leads/7");
        assert_eq!(data["status"], 200);
        assert_eq!(data["body"], json!({"lead": "7", "n": 1}));
    }

    #[tokio::test]
    async fn unknown_method_is_a_configuration_error() {
        let ctx = http(HttpConfig {
            url: Some("https://api.example.com".into()),
            method: "FETCH".into(),
            ..Default::default()
        });

        let err = HttpAction::new(1).execute(&ctx).await.unwrap_err();
        assert_eq!(err, NodeError::Configuration("Unsupported method: FETCH".into()));
    }
}
