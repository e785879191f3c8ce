use crate::NodeType;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Typed configuration, one variant per node type.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    Start,
    End,
    Email(EmailConfig),
    Slack(SlackConfig),
    Http(HttpConfig),
    Delay(DelayConfig),
    Conditional(ConditionalConfig),
    Transform(TransformConfig),
    Webhook(WebhookConfig),
}

impl NodeConfig {
    /// Decode the raw `config` object of a node of the given type.
    ///
    /// A missing or null config decodes as an empty object.
    pub fn from_value(node_type: NodeType, value: Value) -> Result<Self, serde_json::Error> {
        let value = if value.is_null() {
            Value::Object(Map::new())
        } else {
            value
        };

        Ok(match node_type {
            NodeType::Start => NodeConfig::Start,
            NodeType::End => NodeConfig::End,
            NodeType::Email => NodeConfig::Email(serde_json::from_value(value)?),
            NodeType::Slack => NodeConfig::Slack(serde_json::from_value(value)?),
            NodeType::Http => NodeConfig::Http(serde_json::from_value(value)?),
            NodeType::Delay => NodeConfig::Delay(serde_json::from_value(value)?),
            NodeType::Conditional => NodeConfig::Conditional(serde_json::from_value(value)?),
            NodeType::Transform => NodeConfig::Transform(serde_json::from_value(value)?),
            NodeType::Webhook => NodeConfig::Webhook(serde_json::from_value(value)?),
        })
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            NodeConfig::Start => NodeType::Start,
            NodeConfig::End => NodeType::End,
            NodeConfig::Email(_) => NodeType::Email,
            NodeConfig::Slack(_) => NodeType::Slack,
            NodeConfig::Http(_) => NodeType::Http,
            NodeConfig::Delay(_) => NodeType::Delay,
            NodeConfig::Conditional(_) => NodeType::Conditional,
            NodeConfig::Transform(_) => NodeType::Transform,
            NodeConfig::Webhook(_) => NodeType::Webhook,
        }
    }

    /// Raw JSON form, as stored in a workflow definition.
    pub fn to_value(&self) -> Value {
        let encoded = match self {
            NodeConfig::Start | NodeConfig::End => Ok(Value::Object(Map::new())),
            NodeConfig::Email(c) => serde_json::to_value(c),
            NodeConfig::Slack(c) => serde_json::to_value(c),
            NodeConfig::Http(c) => serde_json::to_value(c),
            NodeConfig::Delay(c) => serde_json::to_value(c),
            NodeConfig::Conditional(c) => serde_json::to_value(c),
            NodeConfig::Transform(c) => serde_json::to_value(c),
            NodeConfig::Webhook(c) => serde_json::to_value(c),
        };
        encoded.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub headers: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            url: None,
            method: default_method(),
            headers: Map::new(),
            body: None,
        }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayConfig {
    #[serde(
        default,
        deserialize_with = "lenient_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_ms: Option<u64>,
}

/// Accepts `800`, `800.0` and `"800"`. Anything else decodes as absent so
/// validation reports it against the node.
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(millis_from_value))
}

fn millis_from_value(value: &Value) -> Option<u64> {
    let millis = match value {
        Value::Number(n) => {
            if let Some(ms) = n.as_u64() {
                return Some(ms);
            }
            n.as_f64()?
        }
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (millis.is_finite() && millis >= 0.0).then(|| millis.round() as u64)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default = "default_branch_true")]
    pub branch_true: String,
    #[serde(default = "default_branch_false")]
    pub branch_false: String,
}

impl Default for ConditionalConfig {
    fn default() -> Self {
        Self {
            expression: None,
            branch_true: default_branch_true(),
            branch_false: default_branch_false(),
        }
    }
}

fn default_branch_true() -> String {
    "true".to_string()
}

fn default_branch_false() -> String {
    "false".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Output key to template value.
    #[serde(default)]
    pub mapper: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delay(config: Value) -> DelayConfig {
        match NodeConfig::from_value(NodeType::Delay, config).unwrap() {
            NodeConfig::Delay(c) => c,
            other => panic!("unexpected config {:?}", other),
        }
    }

    #[test]
    fn delay_duration_accepts_editor_numbers() {
        assert_eq!(delay(json!({"durationMs": 800})).duration_ms, Some(800));
        assert_eq!(delay(json!({"durationMs": 800.0})).duration_ms, Some(800));
        assert_eq!(delay(json!({"durationMs": " 800 "})).duration_ms, Some(800));
    }

    #[test]
    fn unusable_delay_duration_decodes_as_absent() {
        assert_eq!(delay(json!({})).duration_ms, None);
        assert_eq!(delay(json!({"durationMs": null})).duration_ms, None);
        assert_eq!(delay(json!({"durationMs": "soon"})).duration_ms, None);
        assert_eq!(delay(json!({"durationMs": -5})).duration_ms, None);
    }
}
