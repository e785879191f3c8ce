use anyhow::{Context, Result};
use relaynodes::NodesConfig;
use relayruntime::RuntimeConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of a `relay.toml` file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub runtime: RuntimeConfig,
    pub nodes: NodesConfig,
}

impl CliConfig {
    /// Load from `path`, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaynodes::MailerConfig;

    #[test]
    fn partial_tables_keep_defaults() {
        let config = CliConfig::parse(
            r#"
            [runtime]
            max_parallel_nodes = 2

            [nodes]
            delay_cap_ms = 500

            [nodes.mailer]
            kind = "http"
            endpoint = "https://mail.example.com/emails"
            api_key = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.runtime.max_parallel_nodes, 2);
        assert_eq!(config.runtime.retry_backoff_ms, 150);
        assert_eq!(config.nodes.delay_cap_ms, 500);
        assert_eq!(config.nodes.simulated_latency_ms, 100);
        assert!(matches!(config.nodes.mailer, MailerConfig::Http { .. }));
    }

    #[test]
    fn missing_file_means_defaults() {
        assert_eq!(CliConfig::load(None).unwrap(), CliConfig::default());
    }
}
