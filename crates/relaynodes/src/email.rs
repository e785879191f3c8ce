use async_trait::async_trait;
use regex::Regex;
use relaycore::template::render;
use relaycore::{Action, ActionContext, NodeConfig, NodeError, NodeType, TaskResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, OnceLock};

/// A rendered message ready for dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    /// Plain-text fallback derived from `html`
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

/// Mail-sending collaborator used by EMAIL nodes
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Dispatch `message`, returning the provider's message id
    async fn send(&self, message: &MailMessage) -> Result<String, NodeError>;
}

/// Logs messages instead of sending them
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &MailMessage) -> Result<String, NodeError> {
        let id = format!("log-{}", uuid::Uuid::new_v4());
        tracing::info!(
            message_id = %id,
            to = %message.to,
            subject = %message.subject,
            "Email dispatched to log mailer"
        );
        Ok(id)
    }
}

/// Sends through a transactional mail HTTP API
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: Option<String>,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

impl HttpMailer {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            from: None,
        }
    }

    /// Sender used when a node leaves `from` empty
    pub fn with_from(mut self, from: Option<String>) -> Self {
        self.from = from;
        self
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &MailMessage) -> Result<String, NodeError> {
        let from = message.from.as_ref().or(self.from.as_ref());
        let payload = json!({
            "from": from,
            "to": [message.to],
            "subject": message.subject,
            "html": message.html,
            "text": message.text,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Mail request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NodeError::ExecutionFailed(format!(
                "Mail provider returned {}: {}",
                status, body
            )));
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Failed to read mail response: {}", e)))?;

        Ok(sent.id)
    }
}

fn markup_regex() -> &'static Regex {
    static MARKUP: OnceLock<Regex> = OnceLock::new();
    MARKUP.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid regex"))
}

/// Strip markup tags, leaving the text content
pub fn strip_markup(html: &str) -> String {
    markup_regex().replace_all(html, "").trim().to_string()
}

/// Renders an email from the node config and hands it to a [`Mailer`]
pub struct EmailAction {
    mailer: Arc<dyn Mailer>,
}

impl EmailAction {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl Action for EmailAction {
    fn node_type(&self) -> NodeType {
        NodeType::Email
    }

    async fn execute(&self, ctx: &ActionContext) -> Result<TaskResult, NodeError> {
        let NodeConfig::Email(config) = &ctx.node.config else {
            return Err(NodeError::Configuration(format!(
                "Node '{}' is not an email node",
                ctx.node.id
            )));
        };

        let values = ctx.values();
        let field = |raw: &Option<String>| render(raw.as_deref().unwrap_or_default(), values).trim().to_string();

        let to = field(&config.to);
        let subject = field(&config.subject);
        if to.is_empty() || subject.is_empty() {
            return Err(NodeError::Configuration(
                "Email requires a non-empty 'to' and 'subject' after rendering".into(),
            ));
        }

        let html = field(&config.body);
        let message = MailMessage {
            text: strip_markup(&html),
            html,
            from: config.from.as_deref().map(|f| render(f, values)).filter(|f| !f.trim().is_empty()),
            to,
            subject,
        };

        let message_id = self.mailer.send(&message).await?;
        tracing::info!(node_id = %ctx.node.id, message_id = %message_id, to = %message.to, "Email sent");

        Ok(TaskResult::success()
            .with_field("messageId", message_id)
            .with_field("to", message.to)
            .with_field("subject", message.subject))
    }
}
