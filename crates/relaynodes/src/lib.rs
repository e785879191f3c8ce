//! Standard node library
//!
//! One action per node type, plus the mail collaborator used by EMAIL nodes.

mod config;
mod control;
mod email;
mod http;
mod notify;
mod time;
mod transform;

pub use config::{MailerConfig, NodesConfig};
pub use control::{ConditionalAction, EndAction, StartAction};
pub use email::{strip_markup, EmailAction, HttpMailer, LogMailer, MailMessage, Mailer};
pub use http::HttpAction;
pub use notify::{SlackAction, WebhookAction};
pub use time::DelayAction;
pub use transform::TransformAction;

use relaycore::{Action, NodeType};
use relayruntime::ActionRegistry;
use std::sync::Arc;

/// Build the mailer selected by `config`
pub fn mailer_from_config(config: &MailerConfig) -> Arc<dyn Mailer> {
    match config {
        MailerConfig::Log => Arc::new(LogMailer),
        MailerConfig::Http {
            endpoint,
            api_key,
            from,
        } => Arc::new(HttpMailer::new(endpoint.clone(), api_key.clone()).with_from(from.clone())),
    }
}

/// Standard action for `node_type`
pub fn action_for(
    node_type: NodeType,
    config: &NodesConfig,
    mailer: &Arc<dyn Mailer>,
) -> Arc<dyn Action> {
    match node_type {
        NodeType::Start => Arc::new(StartAction),
        NodeType::End => Arc::new(EndAction),
        NodeType::Email => Arc::new(EmailAction::new(Arc::clone(mailer))),
        NodeType::Slack => Arc::new(SlackAction::new(config.simulated_latency_ms)),
        NodeType::Http => Arc::new(HttpAction::new(config.simulated_latency_ms)),
        NodeType::Delay => Arc::new(DelayAction::new(config.delay_cap_ms)),
        NodeType::Conditional => Arc::new(ConditionalAction::new()),
        NodeType::Transform => Arc::new(TransformAction),
        NodeType::Webhook => Arc::new(WebhookAction::new(config.simulated_latency_ms)),
    }
}

/// Register all standard actions with a registry
pub fn register_all(registry: &mut ActionRegistry, config: &NodesConfig) {
    let mailer = mailer_from_config(&config.mailer);
    register_with_mailer(registry, config, mailer);
}

/// Register all standard actions, dispatching EMAIL through `mailer`
pub fn register_with_mailer(
    registry: &mut ActionRegistry,
    config: &NodesConfig,
    mailer: Arc<dyn Mailer>,
) {
    for node_type in NodeType::ALL {
        registry.register(action_for(node_type, config, &mailer));
    }
}

/// A registry holding every standard action
pub fn standard_registry(config: &NodesConfig) -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    register_all(&mut registry, config);
    registry
}
