use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key/value store shared by every node of a single run.
///
/// Seeded with the caller's input. Each successful node writes its output
/// under its own id and, when promotion is enabled, shallow-merges the same
/// keys into the top level so later nodes can reference either
/// `node_id.field` or `field`. Colliding top-level keys are last-writer-wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunContext {
    values: Map<String, Value>,
}

impl RunContext {
    pub fn new(input: Map<String, Value>) -> Self {
        Self { values: input }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Resolve a dot-separated path, e.g. `fetch.body.items.0`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.values, path)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.values
    }

    /// Record a node's output. Returns the keys whose previous value was
    /// replaced by a different one.
    pub fn merge_output(
        &mut self,
        node_id: &str,
        data: &Map<String, Value>,
        promote: bool,
    ) -> Vec<String> {
        let mut overwritten = Vec::new();

        let namespaced = Value::Object(data.clone());
        if let Some(previous) = self.values.insert(node_id.to_string(), namespaced.clone()) {
            if previous != namespaced {
                overwritten.push(node_id.to_string());
            }
        }

        if promote {
            for (key, value) in data {
                if let Some(previous) = self.values.insert(key.clone(), value.clone()) {
                    if &previous != value {
                        overwritten.push(key.clone());
                    }
                }
            }
        }

        overwritten
    }

    /// Top-level entries holding numbers, strings or booleans only.
    pub fn primitives(&self) -> Map<String, Value> {
        self.values
            .iter()
            .filter(|(_, v)| matches!(v, Value::Number(_) | Value::String(_) | Value::Bool(_)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl From<Map<String, Value>> for RunContext {
    fn from(values: Map<String, Value>) -> Self {
        Self::new(values)
    }
}

/// Walk `path` through nested objects; numeric segments index arrays.
pub fn lookup_path<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }

    // Exact keys win so promoted names containing dots still resolve.
    if let Some(value) = root.get(path) {
        return Some(value);
    }

    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Numeric view of a value: numbers as-is, strings parsed, booleans as 1/0.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Text form used for template substitution.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn lookup_walks_objects_and_arrays() {
        let ctx = RunContext::new(map(json!({
            "fetch": {"body": {"items": [{"id": 7}]}},
            "score": 10
        })));

        assert_eq!(ctx.lookup("score"), Some(&json!(10)));
        assert_eq!(ctx.lookup("fetch.body.items.0.id"), Some(&json!(7)));
        assert_eq!(ctx.lookup(" fetch.body "), Some(&json!({"items": [{"id": 7}]})));
        assert_eq!(ctx.lookup("fetch.missing"), None);
        assert_eq!(ctx.lookup("score.deeper"), None);
    }

    #[test]
    fn merge_reports_overwritten_keys() {
        let mut ctx = RunContext::new(map(json!({"status": "new", "user": "ada"})));

        let overwritten = ctx.merge_output("check", &map(json!({"status": "done", "user": "ada"})), true);

        assert_eq!(overwritten, vec!["status".to_string()]);
        assert_eq!(ctx.lookup("check.status"), Some(&json!("done")));
        assert_eq!(ctx.get("status"), Some(&json!("done")));
    }

    #[test]
    fn merge_without_promotion_only_namespaces() {
        let mut ctx = RunContext::default();

        let overwritten = ctx.merge_output("a", &map(json!({"x": 1})), false);

        assert!(overwritten.is_empty());
        assert_eq!(ctx.lookup("a.x"), Some(&json!(1)));
        assert_eq!(ctx.get("x"), None);
    }

    #[test]
    fn primitives_drop_objects_and_arrays() {
        let ctx = RunContext::new(map(json!({
            "n": 1.5, "s": "x", "b": true, "o": {"k": 1}, "a": [1], "z": null
        })));

        let prims = ctx.primitives();
        assert_eq!(prims.len(), 3);
        assert!(prims.contains_key("n") && prims.contains_key("s") && prims.contains_key("b"));
    }

    #[test]
    fn coercion_follows_numeric_parsing() {
        assert_eq!(coerce_number(&json!("42")), Some(42.0));
        assert_eq!(coerce_number(&json!(" 3.5 ")), Some(3.5));
        assert_eq!(coerce_number(&json!("abc")), None);
        assert_eq!(coerce_number(&json!(true)), Some(1.0));
        assert_eq!(coerce_number(&json!(null)), None);
    }
}
