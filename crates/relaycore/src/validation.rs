//! Static checks run before a workflow is allowed to execute.

use crate::template::is_template;
use crate::{NodeConfig, NodeSpec, Workflow};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// A problem found in a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

impl ValidationIssue {
    fn for_node(node_id: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            node_id: Some(node_id.to_string()),
        }
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"))
}

/// Run every check and return all issues found. Empty means runnable.
pub fn validation_issues(workflow: &Workflow) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    issues.extend(detect_cycle(workflow));

    issues.extend(workflow.nodes.iter().filter_map(check_node_config));

    issues.extend(check_edge_endpoints(workflow));
    issues
}

/// Report the first cycle found, if any.
fn detect_cycle(workflow: &Workflow) -> Option<ValidationIssue> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

    for node in &workflow.nodes {
        indices
            .entry(node.id.as_str())
            .or_insert_with(|| graph.add_node(node.id.as_str()));
    }

    // Dangling edges are reported separately.
    for edge in &workflow.edges {
        if let (Some(&from), Some(&to)) = (
            indices.get(edge.source.as_str()),
            indices.get(edge.target.as_str()),
        ) {
            graph.add_edge(from, to, ());
        }
    }

    toposort(&graph, None).err().map(|cycle| {
        let node_id = graph[cycle.node_id()];
        ValidationIssue::for_node(
            node_id,
            format!("Workflow contains a cycle through node '{}'", node_id),
        )
    })
}

fn check_node_config(node: &NodeSpec) -> Option<ValidationIssue> {
    let message = match &node.config {
        NodeConfig::Email(config) => {
            let to = non_empty(config.to.as_deref());
            let subject = non_empty(config.subject.as_deref());

            let mut missing = Vec::new();
            if to.is_none() {
                missing.push("'to'");
            }
            if subject.is_none() {
                missing.push("'subject'");
            }

            if !missing.is_empty() {
                Some(format!(
                    "Email node requires non-empty {}",
                    missing.join(" and ")
                ))
            } else {
                to.filter(|to| !is_template(to) && !email_regex().is_match(to))
                    .map(|to| format!("Email recipient '{}' is not a valid email address", to))
            }
        }
        NodeConfig::Http(config) => match non_empty(config.url.as_deref()) {
            None => Some("HTTP node requires a 'url'".to_string()),
            Some(url) if !is_template(url) => check_http_url(url),
            Some(_) => None,
        },
        NodeConfig::Slack(config) => non_empty(config.channel.as_deref())
            .is_none()
            .then(|| "Slack node requires a 'channel'".to_string()),
        NodeConfig::Delay(config) => config
            .duration_ms
            .is_none()
            .then(|| "Delay node requires a numeric 'durationMs'".to_string()),
        // Malformed expressions surface when the node runs.
        NodeConfig::Conditional(config) => non_empty(config.expression.as_deref())
            .is_none()
            .then(|| "Conditional node requires an 'expression'".to_string()),
        NodeConfig::Start | NodeConfig::End | NodeConfig::Transform(_) | NodeConfig::Webhook(_) => {
            None
        }
    };

    message.map(|message| ValidationIssue::for_node(&node.id, message))
}

fn check_http_url(url: &str) -> Option<String> {
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => None,
        Ok(parsed) => Some(format!(
            "HTTP url must use http or https, got '{}'",
            parsed.scheme()
        )),
        Err(err) => Some(format!("HTTP url '{}' is not a valid absolute URL: {}", url, err)),
    }
}

fn check_edge_endpoints(workflow: &Workflow) -> Vec<ValidationIssue> {
    let known: std::collections::HashSet<&str> =
        workflow.nodes.iter().map(|n| n.id.as_str()).collect();

    workflow
        .edges
        .iter()
        .filter_map(|edge| {
            let missing = [&edge.source, &edge.target]
                .into_iter()
                .find(|id| !known.contains(id.as_str()))?;
            Some(ValidationIssue {
                message: format!(
                    "Edge {} -> {} references unknown node '{}'",
                    edge.source, edge.target, missing
                ),
                node_id: None,
            })
        })
        .collect()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ConditionalConfig, DelayConfig, EmailConfig, HttpConfig, NodeSpec, SlackConfig,
        Workflow,
    };

    fn email(to: &str, subject: &str) -> NodeConfig {
        NodeConfig::Email(EmailConfig {
            to: Some(to.into()),
            subject: Some(subject.into()),
            ..Default::default()
        })
    }

    fn http(url: &str) -> NodeConfig {
        NodeConfig::Http(HttpConfig {
            url: Some(url.into()),
            ..Default::default()
        })
    }

    fn single(config: NodeConfig) -> Workflow {
        let mut wf = Workflow::new("single");
        wf.add_node(NodeSpec::new("n1", config));
        wf
    }

    #[test]
    fn clean_workflow_has_no_issues() {
        let mut wf = Workflow::new("clean");
        wf.add_node(NodeSpec::new("start", NodeConfig::Start));
        wf.add_node(NodeSpec::new("mail", email("ops@example.com", "Hello")));
        wf.add_node(NodeSpec::new("call", http("https://example.com/hook")));
        wf.add_node(NodeSpec::new("end", NodeConfig::End));
        wf.connect("start", "mail");
        wf.connect("mail", "call");
        wf.connect("call", "end");

        assert!(validation_issues(&wf).is_empty());
    }

    #[test]
    fn empty_email_config_names_both_fields() {
        let wf = single(NodeConfig::Email(EmailConfig::default()));

        let issues = validation_issues(&wf);

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].node_id.as_deref(), Some("n1"));
        assert!(issues[0].message.contains("to"));
        assert!(issues[0].message.contains("subject"));
    }

    #[test]
    fn email_recipient_must_be_an_address_unless_templated() {
        let issues = validation_issues(&single(email("not-an-address", "Hi")));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("not a valid email address"));

        assert!(validation_issues(&single(email("{{ input.email }}", "Hi"))).is_empty());
    }

    #[test]
    fn http_url_must_be_absolute_http() {
        assert_eq!(validation_issues(&single(http("/relative"))).len(), 1);
        assert_eq!(validation_issues(&single(http("ftp://example.com"))).len(), 1);
        assert!(validation_issues(&single(http("{{ target }}"))).is_empty());
        assert_eq!(
            validation_issues(&single(NodeConfig::Http(HttpConfig::default())))[0].message,
            "HTTP node requires a 'url'"
        );
    }

    #[test]
    fn required_fields_per_type() {
        assert_eq!(validation_issues(&single(NodeConfig::Slack(SlackConfig::default()))).len(), 1);
        assert_eq!(validation_issues(&single(NodeConfig::Delay(DelayConfig::default()))).len(), 1);
        assert_eq!(
            validation_issues(&single(NodeConfig::Conditional(ConditionalConfig::default()))).len(),
            1
        );
        assert!(validation_issues(&single(NodeConfig::Delay(DelayConfig {
            duration_ms: Some(10)
        })))
        .is_empty());
    }

    #[test]
    fn malformed_expression_passes_validation() {
        let wf = single(NodeConfig::Conditional(ConditionalConfig {
            expression: Some("score >".into()),
            ..Default::default()
        }));

        assert!(validation_issues(&wf).is_empty());
    }

    #[test]
    fn reports_a_single_cycle() {
        let mut wf = Workflow::new("cyclic");
        for id in ["a", "b", "c", "d", "e"] {
            wf.add_node(NodeSpec::new(id, NodeConfig::End));
        }
        wf.connect("a", "b");
        wf.connect("b", "a");
        wf.connect("c", "d");
        wf.connect("d", "e");
        wf.connect("e", "c");

        let issues = validation_issues(&wf);

        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("cycle"));
        assert!(issues[0].node_id.is_some());
    }

    #[test]
    fn cycle_and_config_issues_are_concatenated() {
        let mut wf = Workflow::new("both");
        wf.add_node(NodeSpec::new("a", NodeConfig::Slack(SlackConfig::default())));
        wf.add_node(NodeSpec::new("b", NodeConfig::End));
        wf.connect("a", "b");
        wf.connect("b", "a");

        let issues = validation_issues(&wf);

        assert_eq!(issues.len(), 2);
        assert!(issues[0].message.contains("cycle"));
        assert_eq!(issues[1].node_id.as_deref(), Some("a"));
    }

    #[test]
    fn dangling_edges_are_reported() {
        let mut wf = single(NodeConfig::Start);
        wf.connect("n1", "ghost");

        let issues = validation_issues(&wf);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("ghost"));
        assert_eq!(issues[0].node_id, None);
    }
}
