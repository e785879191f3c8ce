use crate::{Edge, GraphError, NodeId, NodeSpec, NodeType, Workflow};
use std::collections::HashMap;
use std::sync::Arc;

/// Indexed, read-only view of a workflow built once per run.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Arc<NodeSpec>>,
    index: HashMap<NodeId, usize>,
    edges: Vec<Edge>,
    adjacency: HashMap<NodeId, Vec<NodeId>>,
    reverse_adjacency: HashMap<NodeId, Vec<NodeId>>,
    outgoing: HashMap<NodeId, Vec<usize>>,
    entry_nodes: Vec<NodeId>,
}

impl Graph {
    /// Build the graph, rejecting duplicate ids and dangling edges.
    pub fn build(workflow: &Workflow) -> Result<Self, GraphError> {
        let mut nodes = Vec::with_capacity(workflow.nodes.len());
        let mut index = HashMap::with_capacity(workflow.nodes.len());
        let mut adjacency = HashMap::new();
        let mut reverse_adjacency = HashMap::new();
        let mut outgoing = HashMap::new();

        for node in &workflow.nodes {
            if index.insert(node.id.clone(), nodes.len()).is_some() {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
            nodes.push(Arc::new(node.clone()));
            adjacency.insert(node.id.clone(), Vec::new());
            reverse_adjacency.insert(node.id.clone(), Vec::new());
            outgoing.insert(node.id.clone(), Vec::new());
        }

        for (position, edge) in workflow.edges.iter().enumerate() {
            for endpoint in [&edge.source, &edge.target] {
                if !index.contains_key(endpoint) {
                    return Err(GraphError::UnknownNode {
                        source_id: edge.source.clone(),
                        target_id: edge.target.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }

            adjacency
                .entry(edge.source.clone())
                .or_insert_with(Vec::new)
                .push(edge.target.clone());
            reverse_adjacency
                .entry(edge.target.clone())
                .or_insert_with(Vec::new)
                .push(edge.source.clone());
            outgoing
                .entry(edge.source.clone())
                .or_insert_with(Vec::new)
                .push(position);
        }

        // START nodes stay entry points even when something points at them.
        let entry_nodes = nodes
            .iter()
            .filter(|node| {
                node.node_type() == NodeType::Start
                    || reverse_adjacency.get(&node.id).map_or(true, Vec::is_empty)
            })
            .map(|node| node.id.clone())
            .collect();

        Ok(Self {
            nodes,
            index,
            edges: workflow.edges.clone(),
            adjacency,
            reverse_adjacency,
            outgoing,
            entry_nodes,
        })
    }

    pub fn node(&self, id: &str) -> Option<&Arc<NodeSpec>> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Nodes in definition order.
    pub fn nodes(&self) -> &[Arc<NodeSpec>] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn successors(&self, id: &str) -> &[NodeId] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn predecessors(&self, id: &str) -> &[NodeId] {
        self.reverse_adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn indegree(&self, id: &str) -> usize {
        self.predecessors(id).len()
    }

    /// Outgoing edges of `id`, in definition order.
    pub fn outgoing_edges<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.outgoing
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(move |&i| &self.edges[i])
    }

    pub fn entry_nodes(&self) -> &[NodeId] {
        &self.entry_nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
