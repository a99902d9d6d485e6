//! Runtime graph info: the compiled artifact.
//!
//! Bindings are stored in execution order. The artifact is immutable once
//! `process_graph` returns it; only the partitioner can append to it.

use crate::error::{ForgeError, ForgeResult};
use crate::ir::{
    graph::{EdgeId, NodeId},
    op::OpType,
    tensor::TensorDesc,
};
use crate::kernel::KernelImpl;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// One node's engine assignment and executable unit
#[derive(Debug, Clone, Serialize)]
pub struct NodeBinding {
    pub node: NodeId,
    pub name: String,
    pub op_type: OpType,
    pub engine: String,
    pub kernel: KernelImpl,
    pub inputs: Vec<EdgeId>,
    pub outputs: Vec<EdgeId>,
    /// Inserted by the boundary pass rather than present in the source graph
    pub synthetic: bool,
}

/// Resolved descriptor of one edge
#[derive(Debug, Clone, Serialize)]
pub struct EdgeInfo {
    pub edge: EdgeId,
    pub name: String,
    pub desc: TensorDesc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    pub total_nodes: usize,
    pub conversion_nodes: usize,
    pub dynamic_edges: usize,
    pub nodes_per_engine: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeGraphInfo {
    graph_name: String,
    bindings: Vec<NodeBinding>,
    edges: Vec<EdgeInfo>,
    graph_outputs: Vec<EdgeId>,
    stats: PartitionStats,
    #[serde(skip)]
    binding_index: HashMap<NodeId, usize>,
    #[serde(skip)]
    binding_names: HashMap<String, usize>,
    #[serde(skip)]
    edge_names: HashMap<String, usize>,
}

impl RuntimeGraphInfo {
    pub(crate) fn new(graph_name: &str) -> Self {
        Self {
            graph_name: graph_name.to_string(),
            bindings: Vec::new(),
            edges: Vec::new(),
            graph_outputs: Vec::new(),
            stats: PartitionStats::default(),
            binding_index: HashMap::new(),
            binding_names: HashMap::new(),
            edge_names: HashMap::new(),
        }
    }

    pub(crate) fn push_binding(&mut self, binding: NodeBinding) {
        self.stats.total_nodes += 1;
        if binding.synthetic {
            self.stats.conversion_nodes += 1;
        }
        *self
            .stats
            .nodes_per_engine
            .entry(binding.engine.clone())
            .or_insert(0) += 1;
        let slot = self.bindings.len();
        self.binding_index.insert(binding.node, slot);
        self.binding_names.insert(binding.name.clone(), slot);
        self.bindings.push(binding);
    }

    pub(crate) fn push_edge(&mut self, edge: EdgeInfo) {
        if edge.desc.is_dynamic() {
            self.stats.dynamic_edges += 1;
        }
        self.edge_names.insert(edge.name.clone(), self.edges.len());
        self.edges.push(edge);
    }

    pub(crate) fn set_graph_outputs(&mut self, outputs: Vec<EdgeId>) {
        self.graph_outputs = outputs;
    }

    pub fn graph_name(&self) -> &str {
        &self.graph_name
    }

    /// Bindings in execution order
    pub fn bindings(&self) -> &[NodeBinding] {
        &self.bindings
    }

    pub fn execution_order(&self) -> Vec<NodeId> {
        self.bindings.iter().map(|b| b.node).collect()
    }

    pub fn binding(&self, node: NodeId) -> Option<&NodeBinding> {
        self.binding_index.get(&node).map(|&slot| &self.bindings[slot])
    }

    pub fn binding_by_name(&self, name: &str) -> Option<&NodeBinding> {
        self.binding_names.get(name).map(|&slot| &self.bindings[slot])
    }

    /// Engine id a node was assigned to
    pub fn engine_of(&self, name: &str) -> Option<&str> {
        self.binding_by_name(name).map(|b| b.engine.as_str())
    }

    pub fn edges(&self) -> &[EdgeInfo] {
        &self.edges
    }

    /// Edges are recorded in `EdgeId` order, so the id is the slot.
    pub fn edge_desc(&self, edge: EdgeId) -> Option<&TensorDesc> {
        self.edges
            .get(edge.0)
            .filter(|e| e.edge == edge)
            .map(|e| &e.desc)
    }

    pub fn edge_desc_by_name(&self, name: &str) -> Option<&TensorDesc> {
        self.edge_names.get(name).map(|&slot| &self.edges[slot].desc)
    }

    pub fn graph_outputs(&self) -> &[EdgeId] {
        &self.graph_outputs
    }

    /// Synthesized boundary conversions
    pub fn conversions(&self) -> impl Iterator<Item = &NodeBinding> {
        self.bindings.iter().filter(|b| b.synthetic)
    }

    pub fn stats(&self) -> &PartitionStats {
        &self.stats
    }

    /// Pretty JSON for inspection and golden tests
    pub fn to_json(&self) -> ForgeResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ForgeError::Internal(format!("artifact serialization failed: {}", e)))
    }

    /// Completeness check: every binding has an engine and a kernel for the
    /// same engine, and every edge is fully resolved.
    pub fn verify(&self) -> ForgeResult<()> {
        for binding in &self.bindings {
            if binding.engine.is_empty() || binding.kernel.engine != binding.engine {
                return Err(ForgeError::Internal(format!(
                    "node '{}' bound to '{}' but kernel targets '{}'",
                    binding.name, binding.engine, binding.kernel.engine
                )));
            }
            for edge in binding.inputs.iter().chain(&binding.outputs) {
                match self.edge_desc(*edge) {
                    Some(desc) if desc.is_resolved() => {}
                    _ => {
                        return Err(ForgeError::Internal(format!(
                            "edge {} used by '{}' is not resolved in the artifact",
                            edge, binding.name
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{op::Attributes, tensor::DataType};

    fn binding(node: usize, engine: &str, synthetic: bool) -> NodeBinding {
        let op_type = if synthetic {
            OpType::convert()
        } else {
            OpType::onnx("Relu")
        };
        NodeBinding {
            node: NodeId(node),
            name: format!("n{}", node),
            op_type: op_type.clone(),
            engine: engine.to_string(),
            kernel: KernelImpl {
                engine: engine.to_string(),
                symbol: KernelImpl::symbol_for(engine, &op_type),
                op_type,
                params: Attributes::new(),
                output_descs: vec![],
                workspace_bytes: 0,
                has_dynamic_shapes: false,
            },
            inputs: vec![EdgeId(node)],
            outputs: vec![EdgeId(node + 1)],
            synthetic,
        }
    }

    fn edge(id: usize, desc: TensorDesc) -> EdgeInfo {
        EdgeInfo {
            edge: EdgeId(id),
            name: format!("e{}", id),
            desc,
        }
    }

    #[test]
    fn test_stats_accumulate() {
        let mut info = RuntimeGraphInfo::new("g");
        info.push_binding(binding(0, "gpu", false));
        info.push_binding(binding(1, "boundary", true));
        info.push_binding(binding(2, "cpu", false));

        let stats = info.stats();
        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.conversion_nodes, 1);
        assert_eq!(stats.nodes_per_engine.get("gpu"), Some(&1));
        assert_eq!(info.engine_of("n2"), Some("cpu"));
        assert_eq!(info.execution_order(), vec![NodeId(0), NodeId(1), NodeId(2)]);
        assert_eq!(info.conversions().count(), 1);
    }

    #[test]
    fn test_verify_requires_resolved_edges() {
        let mut info = RuntimeGraphInfo::new("g");
        info.push_binding(binding(0, "gpu", false));
        info.push_edge(edge(0, TensorDesc::with_static(DataType::F32, &[2])));
        info.push_edge(edge(1, TensorDesc::unresolved()));
        assert!(info.verify().is_err());

        let mut info = RuntimeGraphInfo::new("g");
        info.push_binding(binding(0, "gpu", false));
        info.push_edge(edge(0, TensorDesc::with_static(DataType::F32, &[2])));
        info.push_edge(edge(1, TensorDesc::with_static(DataType::F32, &[2])));
        assert!(info.verify().is_ok());
    }

    #[test]
    fn test_lookups_by_id_and_name() {
        let mut info = RuntimeGraphInfo::new("g");
        info.push_binding(binding(3, "gpu", false));
        info.push_binding(binding(1, "cpu", false));
        info.push_edge(edge(0, TensorDesc::with_static(DataType::F32, &[2])));
        info.push_edge(edge(1, TensorDesc::with_static(DataType::I64, &[4])));

        assert_eq!(info.binding(NodeId(1)).map(|b| b.engine.as_str()), Some("cpu"));
        assert_eq!(info.binding(NodeId(3)).map(|b| b.name.as_str()), Some("n3"));
        assert!(info.binding(NodeId(2)).is_none());
        assert_eq!(info.binding_by_name("n1").map(|b| b.node), Some(NodeId(1)));

        assert_eq!(info.edge_desc(EdgeId(1)).and_then(|d| d.dtype), Some(DataType::I64));
        assert!(info.edge_desc(EdgeId(2)).is_none());
        assert_eq!(info.edge_desc_by_name("e0").and_then(|d| d.dtype), Some(DataType::F32));
        assert!(info.edge_desc_by_name("e9").is_none());
    }

    #[test]
    fn test_json_contains_bindings() {
        let mut info = RuntimeGraphInfo::new("g");
        info.push_binding(binding(0, "gpu", false));
        let json = info.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["graph_name"], "g");
        assert_eq!(value["bindings"][0]["kernel"]["symbol"], "gpu.onnx.Relu");
        assert_eq!(value["stats"]["total_nodes"], 1);
    }
}
