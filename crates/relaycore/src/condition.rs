use crate::error::ExpressionError;
use rhai::packages::{ArithmeticPackage, Package};
use rhai::{Dynamic, Engine, Map as RhaiMap, Scope, AST};
use serde_json::{Map, Value};

/// Boolean expression evaluator for CONDITIONAL nodes.
///
/// Runs on a raw Rhai engine with only the arithmetic package loaded, so
/// operators work but no host functions exist. Expression syntax only (no
/// statements or assignments).
/// Only primitive context values are visible, both as `context.<key>` and
/// as bare `<key>` bindings.
pub struct ExpressionEvaluator {
    engine: Engine,
}

impl Default for ExpressionEvaluator {
    fn default() -> Self {
        let mut engine = Engine::new_raw();
        engine.register_global_module(ArithmeticPackage::new().as_shared_module());
        engine.set_max_operations(50_000);
        engine.set_max_call_levels(16);
        engine.set_max_expr_depths(64, 32);
        engine.set_max_string_size(64 * 1024);
        engine.disable_symbol("eval");
        engine.on_print(|_| {});
        engine.on_debug(|_, _, _| {});
        Self { engine }
    }
}

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `expression` without evaluating it.
    pub fn check(&self, expression: &str) -> Result<(), ExpressionError> {
        self.compile(expression).map(|_| ())
    }

    pub fn evaluate(
        &self,
        expression: &str,
        context: &Map<String, Value>,
    ) -> Result<bool, ExpressionError> {
        let ast = self.compile(expression)?;

        let mut bindings = RhaiMap::new();
        let mut scope = Scope::new();
        for (key, value) in primitive_entries(context) {
            let value = to_dynamic(value);
            bindings.insert(key.as_str().into(), value.clone());
            scope.push_dynamic(key.as_str(), value);
        }
        // Pushed last so it shadows a top-level key named `context`.
        scope.push_dynamic("context", Dynamic::from_map(bindings));

        let result = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map_err(|err| ExpressionError::Evaluation(err.to_string()))?;

        let type_name = result.type_name();
        result
            .as_bool()
            .map_err(|_| ExpressionError::NotBoolean(type_name.to_string()))
    }

    fn compile(&self, expression: &str) -> Result<AST, ExpressionError> {
        if expression.trim().is_empty() {
            return Err(ExpressionError::Parse("expression is empty".to_string()));
        }
        self.engine
            .compile_expression(expression)
            .map_err(|err| ExpressionError::Parse(err.to_string()))
    }
}

fn primitive_entries(context: &Map<String, Value>) -> impl Iterator<Item = (&String, &Value)> {
    context
        .iter()
        .filter(|(_, v)| matches!(v, Value::Number(_) | Value::String(_) | Value::Bool(_)))
}

fn to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else {
                Dynamic::from(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Dynamic::from(s.clone()),
        _ => Dynamic::UNIT,
    }
}
