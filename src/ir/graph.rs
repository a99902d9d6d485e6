//! Graph structures for the IR.
//!
//! Nodes and edges live in two arenas and refer to each other by index only.
//! An edge has at most one producer; graph inputs and constants have none.

use crate::error::{ForgeResult, StructuralError};
use crate::ir::{
    op::{Attributes, OpType},
    tensor::TensorDesc,
};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Fed by the caller at execution time
    Input,
    /// Weight or other initializer
    Constant,
    /// Produced by a node
    Intermediate,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub op_type: OpType,
    pub inputs: Vec<EdgeId>,
    pub outputs: Vec<EdgeId>,
    pub attrs: Attributes,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub name: String,
    pub kind: EdgeKind,
    pub producer: Option<NodeId>,
    pub consumers: Vec<NodeId>,
    pub desc: TensorDesc,
}

impl Edge {
    /// Inputs and constants never need a boundary conversion
    pub fn is_engine_neutral(&self) -> bool {
        self.producer.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    name: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    edge_index: HashMap<String, EdgeId>,
    node_index: HashMap<String, NodeId>,
    outputs: Vec<EdgeId>,
}

impl Graph {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn edge_by_name(&self, name: &str) -> Option<EdgeId> {
        self.edge_index.get(name).copied()
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.node_index.get(name).copied()
    }

    pub fn producer(&self, edge: EdgeId) -> Option<NodeId> {
        self.edges[edge.0].producer
    }

    pub fn consumers(&self, edge: EdgeId) -> &[NodeId] {
        &self.edges[edge.0].consumers
    }

    /// Edges without a producer (graph inputs and constants)
    pub fn inputs(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|e| e.producer.is_none())
    }

    /// Edges exposed to the caller after execution
    pub fn outputs(&self) -> &[EdgeId] {
        &self.outputs
    }

    pub fn mark_output(&mut self, edge: EdgeId) {
        if !self.outputs.contains(&edge) {
            self.outputs.push(edge);
        }
    }

    pub fn input_descs(&self, node: NodeId) -> Vec<&TensorDesc> {
        self.nodes[node.0]
            .inputs
            .iter()
            .map(|e| &self.edges[e.0].desc)
            .collect()
    }

    pub fn output_descs(&self, node: NodeId) -> Vec<&TensorDesc> {
        self.nodes[node.0]
            .outputs
            .iter()
            .map(|e| &self.edges[e.0].desc)
            .collect()
    }

    pub fn add_edge(
        &mut self,
        name: &str,
        kind: EdgeKind,
        desc: TensorDesc,
    ) -> ForgeResult<EdgeId> {
        if self.edge_index.contains_key(name) {
            return Err(StructuralError::DuplicateEdge(name.to_string()).into());
        }
        let id = EdgeId(self.edges.len());
        self.edges.push(Edge {
            id,
            name: name.to_string(),
            kind,
            producer: None,
            consumers: Vec::new(),
            desc,
        });
        self.edge_index.insert(name.to_string(), id);
        Ok(id)
    }

    pub(crate) fn set_edge_kind(&mut self, edge: EdgeId, kind: EdgeKind) {
        self.edges[edge.0].kind = kind;
    }

    pub(crate) fn set_edge_desc(&mut self, edge: EdgeId, desc: TensorDesc) {
        self.edges[edge.0].desc = desc;
    }

    /// Append a node and wire it to existing edges.
    ///
    /// Fails without modifying the graph when an edge is unknown or an output
    /// edge already has a producer.
    pub fn add_node(
        &mut self,
        name: &str,
        op_type: OpType,
        attrs: Attributes,
        inputs: Vec<EdgeId>,
        outputs: Vec<EdgeId>,
    ) -> ForgeResult<NodeId> {
        if self.node_index.contains_key(name) {
            return Err(StructuralError::DuplicateNode(name.to_string()).into());
        }
        for edge in inputs.iter().chain(outputs.iter()) {
            if edge.0 >= self.edges.len() {
                return Err(StructuralError::UnknownEdge(edge.to_string()).into());
            }
        }
        for (i, edge) in outputs.iter().enumerate() {
            let existing = self.edges[edge.0]
                .producer
                .map(|p| self.nodes[p.0].name.clone())
                .or_else(|| outputs[..i].contains(edge).then(|| name.to_string()));
            if let Some(existing) = existing {
                return Err(StructuralError::DuplicateProducer {
                    edge: self.edges[edge.0].name.clone(),
                    existing,
                    node: name.to_string(),
                }
                .into());
            }
        }

        let id = NodeId(self.nodes.len());
        for edge in &inputs {
            let consumers = &mut self.edges[edge.0].consumers;
            if !consumers.contains(&id) {
                consumers.push(id);
            }
        }
        for edge in &outputs {
            let edge = &mut self.edges[edge.0];
            edge.producer = Some(id);
            edge.kind = EdgeKind::Intermediate;
        }
        self.nodes.push(Node {
            id,
            name: name.to_string(),
            op_type,
            inputs,
            outputs,
            attrs,
        });
        self.node_index.insert(name.to_string(), id);
        Ok(id)
    }

    /// Splice a single-input, single-output node after `edge`.
    ///
    /// Only `rewire` consumers are moved to the new edge; all other consumers
    /// keep reading `edge`. Returns the new node and its output edge.
    pub fn insert_node_on_edge(
        &mut self,
        edge: EdgeId,
        rewire: &[NodeId],
        node_name: &str,
        op_type: OpType,
        attrs: Attributes,
    ) -> ForgeResult<(NodeId, EdgeId)> {
        if edge.0 >= self.edges.len() {
            return Err(StructuralError::UnknownEdge(edge.to_string()).into());
        }
        let node_name = self.unique_node_name(node_name);
        let edge_name = self.unique_edge_name(&format!("{}_out", node_name));
        let layout = self.edges[edge.0].desc.layout;
        let out = self.add_edge(
            &edge_name,
            EdgeKind::Intermediate,
            TensorDesc::unresolved().with_layout(layout),
        )?;
        let node = self.add_node(&node_name, op_type, attrs, vec![edge], vec![out])?;

        for consumer in rewire {
            if *consumer == node {
                continue;
            }
            for input in self.nodes[consumer.0].inputs.iter_mut() {
                if *input == edge {
                    *input = out;
                }
            }
            self.edges[edge.0].consumers.retain(|c| c != consumer);
            if !self.edges[out.0].consumers.contains(consumer) {
                self.edges[out.0].consumers.push(*consumer);
            }
        }
        Ok((node, out))
    }

    fn unique_node_name(&self, base: &str) -> String {
        unique_name(base, |n| self.node_index.contains_key(n))
    }

    fn unique_edge_name(&self, base: &str) -> String {
        unique_name(base, |n| self.edge_index.contains_key(n))
    }

    /// Kahn's algorithm; ready nodes are taken lowest index first.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, StructuralError> {
        let mut in_degree = vec![0usize; self.nodes.len()];
        for node in &self.nodes {
            in_degree[node.id.0] = node
                .inputs
                .iter()
                .filter(|e| self.edges[e.0].producer.is_some())
                .count();
        }

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(index)) = ready.pop() {
            order.push(NodeId(index));
            for edge in &self.nodes[index].outputs {
                for consumer in &self.edges[edge.0].consumers {
                    // one decrement per input slot fed by this edge
                    let uses = self.nodes[consumer.0]
                        .inputs
                        .iter()
                        .filter(|e| *e == edge)
                        .count();
                    in_degree[consumer.0] -= uses;
                    if in_degree[consumer.0] == 0 {
                        ready.push(Reverse(consumer.0));
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(StructuralError::Cycle {
                remaining: self.nodes.len() - order.len(),
            });
        }
        Ok(order)
    }

    /// Write an inferred descriptor.
    ///
    /// Returns `Ok(false)` when the edge already holds an identical
    /// descriptor; a different resolved descriptor is a conflict.
    pub fn resolve_desc(
        &mut self,
        edge: EdgeId,
        desc: TensorDesc,
    ) -> Result<bool, StructuralError> {
        let slot = &mut self.edges[edge.0];
        if slot.desc.is_resolved() {
            if slot.desc == desc {
                return Ok(false);
            }
            return Err(StructuralError::ConflictingDescriptor {
                edge: slot.name.clone(),
                existing: slot.desc.to_string(),
                inferred: desc.to_string(),
            });
        }
        slot.desc = desc;
        Ok(true)
    }
}

fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|i| format!("{}_{}", base, i))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}
