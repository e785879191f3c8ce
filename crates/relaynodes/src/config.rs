use serde::{Deserialize, Serialize};

/// Settings for the standard node actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodesConfig {
    /// Latency simulated by SLACK, HTTP and WEBHOOK nodes
    pub simulated_latency_ms: u64,
    /// Upper bound on a single DELAY node's sleep
    pub delay_cap_ms: u64,
    pub mailer: MailerConfig,
}

impl Default for NodesConfig {
    fn default() -> Self {
        Self {
            simulated_latency_ms: 100,
            delay_cap_ms: 2000,
            mailer: MailerConfig::default(),
        }
    }
}

/// Which mail collaborator EMAIL nodes dispatch through
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MailerConfig {
    /// Log the message and return a synthetic id
    #[default]
    Log,
    /// POST to a transactional mail API
    Http {
        endpoint: String,
        api_key: String,
        #[serde(default)]
        from: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: NodesConfig = serde_json::from_str(r#"{"delay_cap_ms": 50}"#).unwrap();
        assert_eq!(config.delay_cap_ms, 50);
        assert_eq!(config.simulated_latency_ms, 100);
        assert_eq!(config.mailer, MailerConfig::Log);
    }

    #[test]
    fn http_mailer_is_tagged() {
        let config: NodesConfig = serde_json::from_str(
            r#"{"mailer": {"kind": "http", "endpoint": "https://mail.example.com/emails", "api_key": "k"}}"#,
        )
        .unwrap();
        assert_eq!(
            config.mailer,
            MailerConfig::Http {
                endpoint: "https://mail.example.com/emails".into(),
                api_key: "k".into(),
                from: None,
            }
        );
    }
}
