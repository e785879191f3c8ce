//! Edge activation and per-node readiness bookkeeping.

use relaycore::context::coerce_number;
use relaycore::{ConditionOperator, Edge, EdgeCondition, Graph, NodeId, RunContext, TaskResult};
use serde_json::Value;
use std::collections::HashMap;

/// Whether `edge` counts toward making its target ready, given the source
/// node's result and the live run context.
pub fn edge_activates(edge: &Edge, result: &TaskResult, context: &RunContext) -> bool {
    let branch_matches = match &edge.label {
        None => true,
        Some(label) => result.branch.as_deref() == Some(label.as_str()),
    };

    branch_matches
        && edge
            .condition
            .as_ref()
            .map_or(true, |condition| condition_holds(condition, context))
}

/// Evaluate an edge condition against the context.
pub fn condition_holds(condition: &EdgeCondition, context: &RunContext) -> bool {
    let actual = context.lookup(&condition.field).unwrap_or(&Value::Null);
    let expected = &condition.value;

    match condition.operator {
        ConditionOperator::Eq => loosely_equal(actual, expected),
        ConditionOperator::Neq => !loosely_equal(actual, expected),
        ConditionOperator::Gt => compare(actual, expected, |a, b| a > b),
        ConditionOperator::Gte => compare(actual, expected, |a, b| a >= b),
        ConditionOperator::Lt => compare(actual, expected, |a, b| a < b),
        ConditionOperator::Lte => compare(actual, expected, |a, b| a <= b),
        ConditionOperator::Includes => match actual {
            Value::Array(items) => items.contains(expected),
            _ => false,
        },
        ConditionOperator::Unknown => {
            tracing::warn!(field = %condition.field, "Unknown edge operator, treating condition as met");
            true
        }
    }
}

fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    match (coerce_number(actual), coerce_number(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => actual == expected || scalar_text(actual) == scalar_text(expected),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn compare(actual: &Value, expected: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (coerce_number(actual), coerce_number(expected)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

/// Incoming-edge counters for one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationCounter {
    pub indegree: usize,
    pub processed: usize,
    pub activated: usize,
}

impl ActivationCounter {
    /// Every incoming edge has been evaluated and at least one fired.
    pub fn is_ready(&self) -> bool {
        self.processed == self.indegree && self.activated > 0
    }
}

/// Counters for every node of a run.
#[derive(Debug, Default)]
pub struct ActivationTracker {
    counters: HashMap<NodeId, ActivationCounter>,
}

impl ActivationTracker {
    pub fn new(graph: &Graph) -> Self {
        let counters = graph
            .nodes()
            .iter()
            .map(|node| {
                (
                    node.id.clone(),
                    ActivationCounter {
                        indegree: graph.indegree(&node.id),
                        ..Default::default()
                    },
                )
            })
            .collect();
        Self { counters }
    }

    /// Record one evaluated edge into `target`.
    pub fn record(&mut self, target: &str, activated: bool) {
        if let Some(counter) = self.counters.get_mut(target) {
            counter.processed += 1;
            if activated {
                counter.activated += 1;
            }
        }
    }

    pub fn counter(&self, node_id: &str) -> Option<ActivationCounter> {
        self.counters.get(node_id).copied()
    }

    pub fn is_ready(&self, node_id: &str) -> bool {
        self.counters.get(node_id).is_some_and(ActivationCounter::is_ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycore::{NodeConfig, NodeSpec, Workflow};
    use serde_json::json;

    fn context(value: Value) -> RunContext {
        RunContext::new(value.as_object().cloned().unwrap())
    }

    fn cond(field: &str, operator: ConditionOperator, value: Value) -> EdgeCondition {
        EdgeCondition {
            field: field.into(),
            operator,
            value,
        }
    }

    #[test]
    fn label_must_match_branch() {
        let ctx = RunContext::default();
        let edge = Edge::new("a", "b").with_label("high");

        assert!(edge_activates(&edge, &TaskResult::success().with_branch("high"), &ctx));
        assert!(!edge_activates(&edge, &TaskResult::success().with_branch("low"), &ctx));
        assert!(!edge_activates(&edge, &TaskResult::success(), &ctx));
        assert!(edge_activates(&Edge::new("a", "b"), &TaskResult::success().with_branch("low"), &ctx));
    }

    #[test]
    fn label_and_condition_must_both_hold() {
        let edge = Edge::new("a", "b")
            .with_label("yes")
            .with_condition("amount", ConditionOperator::Gt, 100);
        let yes = TaskResult::success().with_branch("yes");

        assert!(edge_activates(&edge, &yes, &context(json!({"amount": 150}))));
        assert!(!edge_activates(&edge, &yes, &context(json!({"amount": 50}))));
        assert!(!edge_activates(
            &edge,
            &TaskResult::success().with_branch("no"),
            &context(json!({"amount": 150}))
        ));
    }

    #[test]
    fn numeric_operators_coerce_strings() {
        let ctx = context(json!({"n": "42", "word": "abc", "nested": {"v": 3}}));

        assert!(condition_holds(&cond("n", ConditionOperator::Eq, json!(42)), &ctx));
        assert!(condition_holds(&cond("n", ConditionOperator::Gte, json!("42")), &ctx));
        assert!(condition_holds(&cond("n", ConditionOperator::Lt, json!(50.5)), &ctx));
        assert!(!condition_holds(&cond("n", ConditionOperator::Lte, json!(41)), &ctx));
        assert!(!condition_holds(&cond("word", ConditionOperator::Gt, json!(1)), &ctx));
        assert!(condition_holds(&cond("nested.v", ConditionOperator::Neq, json!(4)), &ctx));
    }

    #[test]
    fn equality_falls_back_to_text() {
        let ctx = context(json!({"status": "open", "flag": true}));

        assert!(condition_holds(&cond("status", ConditionOperator::Eq, json!("open")), &ctx));
        assert!(condition_holds(&cond("status", ConditionOperator::Neq, json!("closed")), &ctx));
        assert!(condition_holds(&cond("flag", ConditionOperator::Eq, json!("true")), &ctx));
        assert!(!condition_holds(&cond("missing", ConditionOperator::Eq, json!("x")), &ctx));
    }

    #[test]
    fn includes_requires_an_array() {
        let ctx = context(json!({"tags": ["vip", "eu"], "name": "vip"}));

        assert!(condition_holds(&cond("tags", ConditionOperator::Includes, json!("vip")), &ctx));
        assert!(!condition_holds(&cond("tags", ConditionOperator::Includes, json!("us")), &ctx));
        assert!(!condition_holds(&cond("name", ConditionOperator::Includes, json!("vip")), &ctx));
    }

    #[test]
    fn unknown_operator_is_permissive() {
        let ctx = RunContext::default();
        assert!(condition_holds(&cond("x", ConditionOperator::Unknown, json!(1)), &ctx));
    }

    #[test]
    fn tracker_requires_all_edges_processed() {
        let mut wf = Workflow::new("join");
        wf.add_node(NodeSpec::new("a", NodeConfig::Start));
        wf.add_node(NodeSpec::new("b", NodeConfig::Start));
        wf.add_node(NodeSpec::new("c", NodeConfig::End));
        wf.connect("a", "c");
        wf.connect("b", "c");
        let graph = Graph::build(&wf).unwrap();

        let mut tracker = ActivationTracker::new(&graph);
        tracker.record("c", false);
        assert!(!tracker.is_ready("c"));
        tracker.record("c", true);
        assert!(tracker.is_ready("c"));

        let mut pruned = ActivationTracker::new(&graph);
        pruned.record("c", false);
        pruned.record("c", false);
        assert!(!pruned.is_ready("c"));
        assert_eq!(
            pruned.counter("c"),
            Some(ActivationCounter {
                indegree: 2,
                processed: 2,
                activated: 0
            })
        );
    }
}
