// crates/relaycore/tests/definition_test.rs

use relaycore::{
    validation_issues, ConditionOperator, ExecutionEvent, ExecutionMode, Graph, NodeConfig,
    NodeType, TaskStatus, Workflow, DEFAULT_RETRIES, DEFAULT_TIMEOUT_MS,
};
use serde_json::json;

fn branching_definition() -> serde_json::Value {
    json!({
        "name": "lead-routing",
        "nodes": [
            {"id": "start", "type": "START"},
            {
                "id": "score",
                "type": "CONDITIONAL",
                "label": "High score?",
                "config": {"expression": "score > 50", "branchTrue": "high", "branchFalse": "low"}
            },
            {
                "id": "notify",
                "type": "SLACK",
                "config": {"channel": "#sales", "message": "Lead {{ name }} scored {{ score }}"},
                "executionMode": "PARALLEL",
                "retries": 0,
                "timeoutMs": 250
            },
            {"id": "wait", "type": "DELAY", "config": {"durationMs": 100}},
            {"id": "end", "type": "END", "position": {"x": 10.0, "y": 20.5}}
        ],
        "edges": [
            {"source": "start", "target": "score"},
            {"source": "score", "target": "notify", "label": "high"},
            {"source": "score", "target": "wait", "label": "low",
             "condition": {"field": "score", "operator": "gte", "value": 0}},
            {"source": "notify", "target": "end",
             "condition": {"field": "tags", "operator": "matches", "value": "x"}}
        ]
    })
}

#[test]
fn test_definition_decodes_typed_configs_and_defaults() {
    let workflow: Workflow = serde_json::from_value(branching_definition()).unwrap();

    assert_eq!(workflow.name, "lead-routing");
    assert_eq!(workflow.nodes.len(), 5);

    let score = workflow.find_node("score").unwrap();
    assert_eq!(score.node_type(), NodeType::Conditional);
    assert_eq!(score.label.as_deref(), Some("High score?"));
    assert_eq!(score.execution_mode, ExecutionMode::Sequential);
    assert_eq!(score.retries, DEFAULT_RETRIES);
    assert_eq!(score.timeout_ms, DEFAULT_TIMEOUT_MS);
    match &score.config {
        NodeConfig::Conditional(c) => {
            assert_eq!(c.expression.as_deref(), Some("score > 50"));
            assert_eq!(c.branch_true, "high");
            assert_eq!(c.branch_false, "low");
        }
        other => panic!("unexpected config {:?}", other),
    }

    let notify = workflow.find_node("notify").unwrap();
    assert_eq!(notify.execution_mode, ExecutionMode::Parallel);
    assert_eq!(notify.retries, 0);
    assert_eq!(notify.timeout_ms, 250);

    let wait = workflow.find_node("wait").unwrap();
    assert_eq!(wait.config, NodeConfig::Delay(relaycore::DelayConfig { duration_ms: Some(100) }));

    assert_eq!(workflow.edges[2].condition.as_ref().unwrap().operator, ConditionOperator::Gte);
    assert_eq!(
        workflow.edges[3].condition.as_ref().unwrap().operator,
        ConditionOperator::Unknown
    );
}

#[test]
fn test_definition_round_trips_through_json() {
    let workflow: Workflow = serde_json::from_value(branching_definition()).unwrap();

    let encoded = serde_json::to_value(&workflow).unwrap();
    assert_eq!(encoded["nodes"][1]["type"], "CONDITIONAL");
    assert_eq!(encoded["nodes"][1]["config"]["branchTrue"], "high");
    assert_eq!(encoded["nodes"][2]["executionMode"], "PARALLEL");
    assert_eq!(encoded["nodes"][2]["timeoutMs"], 250);

    let decoded: Workflow = serde_json::from_value(encoded).unwrap();
    assert_eq!(decoded.nodes, workflow.nodes);
    assert_eq!(decoded.edges, workflow.edges);
}

#[test]
fn test_unknown_node_type_is_rejected_at_decode() {
    let result: Result<Workflow, _> = serde_json::from_value(json!({
        "nodes": [{"id": "x", "type": "TELEPORT"}]
    }));

    assert!(result.is_err());
}

#[test]
fn test_clean_definition_validates_and_builds() {
    let workflow: Workflow = serde_json::from_value(branching_definition()).unwrap();

    assert!(validation_issues(&workflow).is_empty());

    let graph = Graph::build(&workflow).unwrap();
    assert_eq!(graph.entry_nodes(), &["start".to_string()]);
    assert_eq!(graph.indegree("end"), 1);
}

#[test]
fn test_events_serialize_with_screaming_type_tags() {
    let event = ExecutionEvent::TaskCompleted {
        execution_id: uuid::Uuid::nil(),
        node_id: "notify".into(),
        status: TaskStatus::Success,
        output: None,
        branch: Some("high".into()),
        attempts: 1,
        duration_ms: 3,
        timestamp: chrono::Utc::now(),
    };

    let encoded = serde_json::to_value(&event).unwrap();
    assert_eq!(encoded["type"], "TASK_COMPLETED");
    assert_eq!(encoded["status"], "SUCCESS");
    assert_eq!(encoded["nodeId"], "notify");
    assert_eq!(encoded["executionId"], uuid::Uuid::nil().to_string());
    assert_eq!(encoded["durationMs"], 3);
    assert!(encoded.get("node_id").is_none());
    assert!(encoded.get("output").is_none());
}

#[test]
fn test_workflow_ids_are_opaque_strings() {
    let mut definition = branching_definition();
    definition["id"] = json!("wf_lead_routing");
    let named: Workflow = serde_json::from_value(definition).unwrap();
    assert_eq!(named.id, "wf_lead_routing");

    let generated: Workflow = serde_json::from_value(branching_definition()).unwrap();
    assert!(!generated.id.is_empty());
}
