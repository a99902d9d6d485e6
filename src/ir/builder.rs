//! Name-based graph construction.
//!
//! Edges are created on first mention, so nodes may be added in any order.
//! `finalize` classifies every edge that nobody produces as a graph input
//! (unless it was declared a constant) and every produced edge that nobody
//! consumes as a graph output.

use crate::error::{ForgeResult, StructuralError};
use crate::ir::{
    graph::{EdgeId, EdgeKind, Graph, NodeId},
    op::{Attributes, OpType},
    tensor::TensorDesc,
};

#[derive(Debug)]
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            graph: Graph::new(name),
        }
    }

    fn edge(&mut self, name: &str) -> ForgeResult<EdgeId> {
        match self.graph.edge_by_name(name) {
            Some(id) => Ok(id),
            None => self
                .graph
                .add_edge(name, EdgeKind::Intermediate, TensorDesc::unresolved()),
        }
    }

    pub fn add_node(
        &mut self,
        name: &str,
        op_type: OpType,
        inputs: &[&str],
        outputs: &[&str],
    ) -> ForgeResult<NodeId> {
        self.add_node_with_attrs(name, op_type, Attributes::new(), inputs, outputs)
    }

    /// Add a node by edge names. On error neither the node nor any edge it
    /// mentions is added.
    pub fn add_node_with_attrs(
        &mut self,
        name: &str,
        op_type: OpType,
        attrs: Attributes,
        inputs: &[&str],
        outputs: &[&str],
    ) -> ForgeResult<NodeId> {
        self.check_new_node(name, outputs)?;
        let inputs = inputs
            .iter()
            .map(|n| self.edge(n))
            .collect::<ForgeResult<Vec<_>>>()?;
        let outputs = outputs
            .iter()
            .map(|n| self.edge(n))
            .collect::<ForgeResult<Vec<_>>>()?;
        self.graph.add_node(name, op_type, attrs, inputs, outputs)
    }

    fn check_new_node(&self, name: &str, outputs: &[&str]) -> ForgeResult<()> {
        if self.graph.node_by_name(name).is_some() {
            return Err(StructuralError::DuplicateNode(name.to_string()).into());
        }
        for (i, output) in outputs.iter().enumerate() {
            let existing = match self.graph.edge_by_name(output) {
                Some(id) => {
                    let edge = self.graph.edge(id);
                    match edge.producer {
                        Some(producer) => Some(self.graph.node(producer).name.clone()),
                        None if edge.kind != EdgeKind::Intermediate => {
                            Some(format!("<{:?}>", edge.kind).to_lowercase())
                        }
                        None => None,
                    }
                }
                None => None,
            };
            let existing =
                existing.or_else(|| outputs[..i].contains(output).then(|| name.to_string()));
            if let Some(existing) = existing {
                return Err(StructuralError::DuplicateProducer {
                    edge: output.to_string(),
                    existing,
                    node: name.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Declare a graph input with its caller-supplied descriptor.
    pub fn set_input(&mut self, name: &str, desc: TensorDesc) -> ForgeResult<EdgeId> {
        self.declare(name, EdgeKind::Input, desc)
    }

    /// Declare a constant (initializer) with its descriptor.
    pub fn set_constant(&mut self, name: &str, desc: TensorDesc) -> ForgeResult<EdgeId> {
        self.declare(name, EdgeKind::Constant, desc)
    }

    fn declare(&mut self, name: &str, kind: EdgeKind, desc: TensorDesc) -> ForgeResult<EdgeId> {
        let id = self.edge(name)?;
        if let Some(producer) = self.graph.producer(id) {
            return Err(StructuralError::DuplicateProducer {
                edge: name.to_string(),
                existing: self.graph.node(producer).name.clone(),
                node: format!("<{:?}>", kind).to_lowercase(),
            }
            .into());
        }
        self.graph.set_edge_kind(id, kind);
        self.graph.set_edge_desc(id, desc);
        Ok(id)
    }

    /// Expose an edge as graph output even if it also has consumers.
    pub fn mark_output(&mut self, name: &str) -> ForgeResult<EdgeId> {
        let id = self
            .graph
            .edge_by_name(name)
            .ok_or_else(|| StructuralError::UnknownEdge(name.to_string()))?;
        self.graph.mark_output(id);
        Ok(id)
    }

    pub fn finalize(mut self) -> Graph {
        let mut outputs = Vec::new();
        for edge in self.graph.edges() {
            if edge.producer.is_some() && edge.consumers.is_empty() {
                outputs.push(edge.id);
            }
        }
        let dangling: Vec<EdgeId> = self
            .graph
            .edges()
            .filter(|e| e.producer.is_none() && e.kind == EdgeKind::Intermediate)
            .map(|e| e.id)
            .collect();
        for id in dangling {
            self.graph.set_edge_kind(id, EdgeKind::Input);
        }
        for id in outputs {
            self.graph.mark_output(id);
        }
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::tensor::DataType;

    #[test]
    fn test_out_of_order_construction() {
        let mut builder = GraphBuilder::new("g");
        builder
            .add_node("b", OpType::onnx("Relu"), &["mid"], &["out"])
            .unwrap();
        builder
            .add_node("a", OpType::onnx("Relu"), &["in"], &["mid"])
            .unwrap();
        builder
            .set_input("in", TensorDesc::with_static(DataType::F32, &[2]))
            .unwrap();
        let graph = builder.finalize();

        let mid = graph.edge_by_name("mid").unwrap();
        let out = graph.edge_by_name("out").unwrap();
        assert_eq!(graph.producer(mid), graph.node_by_name("a"));
        assert_eq!(graph.outputs(), &[out]);
        assert_eq!(graph.inputs().count(), 1);

        let order = graph.topological_order().unwrap();
        assert_eq!(order, vec![NodeId(1), NodeId(0)]);
    }

    #[test]
    fn test_undeclared_dangling_edge_becomes_input() {
        let mut builder = GraphBuilder::new("g");
        builder
            .add_node("a", OpType::onnx("Relu"), &["x"], &["y"])
            .unwrap();
        let graph = builder.finalize();
        let x = graph.edge(graph.edge_by_name("x").unwrap());
        assert_eq!(x.kind, EdgeKind::Input);
        assert!(!x.desc.is_resolved());
    }

    #[test]
    fn test_input_cannot_be_produced() {
        let mut builder = GraphBuilder::new("g");
        builder
            .set_input("x", TensorDesc::with_static(DataType::F32, &[2]))
            .unwrap();
        let err = builder
            .add_node("a", OpType::onnx("Relu"), &["y"], &["x"])
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::ForgeError::Structural(StructuralError::DuplicateProducer { .. })
        ));
    }

    #[test]
    fn test_rejected_node_leaves_no_edges() {
        let mut builder = GraphBuilder::new("g");
        builder
            .set_input("x", TensorDesc::with_static(DataType::F32, &[2]))
            .unwrap();
        builder
            .add_node("n", OpType::onnx("Relu"), &["x"], &["y"])
            .unwrap();

        let duplicate_name = builder.add_node("n", OpType::onnx("Relu"), &["ghost"], &["z"]);
        assert!(matches!(
            duplicate_name,
            Err(crate::error::ForgeError::Structural(StructuralError::DuplicateNode(_)))
        ));
        let second_producer = builder.add_node("m", OpType::onnx("Relu"), &["ghost"], &["z", "y"]);
        assert!(matches!(
            second_producer,
            Err(crate::error::ForgeError::Structural(
                StructuralError::DuplicateProducer { ref existing, .. }
            )) if existing == "n"
        ));
        let repeated_output = builder.add_node("m", OpType::onnx("Relu"), &["ghost"], &["z", "z"]);
        assert!(repeated_output.is_err());

        let graph = builder.finalize();
        let names: Vec<&str> = graph.edges().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert_eq!(graph.nodes().count(), 1);
        assert_eq!(graph.inputs().count(), 1);
    }

    #[test]
    fn test_constant_kind_preserved() {
        let mut builder = GraphBuilder::new("g");
        builder
            .set_constant("w", TensorDesc::with_static(DataType::F32, &[2]))
            .unwrap();
        builder
            .add_node("a", OpType::onnx("Add"), &["x", "w"], &["y"])
            .unwrap();
        builder.mark_output("y").unwrap();
        let graph = builder.finalize();
        let w = graph.edge(graph.edge_by_name("w").unwrap());
        assert_eq!(w.kind, EdgeKind::Constant);
        assert_eq!(graph.outputs().len(), 1);
    }
}
