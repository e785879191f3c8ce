use relaycore::{Action, EngineError, NodeType};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of node actions, keyed by node type
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<NodeType, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Register an action, replacing any previous one for the same type
    pub fn register(&mut self, action: Arc<dyn Action>) {
        let node_type = action.node_type();
        tracing::debug!(%node_type, "Registering node action");
        self.actions.insert(node_type, action);
    }

    pub fn with(mut self, action: Arc<dyn Action>) -> Self {
        self.register(action);
        self
    }

    /// Look up the action for a node type
    pub fn resolve(&self, node_type: NodeType) -> Result<Arc<dyn Action>, EngineError> {
        self.actions
            .get(&node_type)
            .cloned()
            .ok_or(EngineError::UnregisteredAction(node_type))
    }

    pub fn contains(&self, node_type: NodeType) -> bool {
        self.actions.contains_key(&node_type)
    }

    /// Registered node types, in declaration order
    pub fn node_types(&self) -> Vec<NodeType> {
        let mut types: Vec<NodeType> = self.actions.keys().copied().collect();
        types.sort();
        types
    }
}
