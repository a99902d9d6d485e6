//! # Partitioning & Inference Orchestrator
//!
//! [`process_graph`] turns a graph plus a [`SharedResource`] into a
//! [`RuntimeGraphInfo`]:
//!
//! 1. preconditions (resolved graph inputs, at least one usable engine)
//! 2. topological order, ties broken by node index
//! 3. per node: first accepting engine, init, type/shape inference,
//!    descriptor write-back, finalize
//! 4. boundary conversions on every edge that crosses engines
//! 5. kernel instantiation in the final order, optional verification
//!
//! The first error aborts the compilation and no artifact is returned. The
//! graph's descriptors are then partially resolved and the graph should be
//! discarded.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use graphforge::{partition::process_graph, SharedResource};
//!
//! let resource = SharedResource::with_default_engines();
//! let info = process_graph(&resource, &mut graph)?;
//! println!("{}", info.to_json()?);
//! ```

mod assign;
mod boundary;

use crate::engine::Engine;
use crate::error::{ErrorCategory, ForgeError, ForgeResult, StructuralError};
use crate::internal_error;
use crate::ir::graph::{Graph, NodeId};
use crate::kernel::OptKernel;
use crate::runtime::{
    graph_info::{EdgeInfo, NodeBinding, RuntimeGraphInfo},
    resource::SharedResource,
};
use std::sync::Arc;
use std::time::Instant;

/// Engine assignment and kernel wrapper for one node
pub(crate) struct Assignment {
    pub engine: Arc<dyn Engine>,
    pub kernel: OptKernel,
    pub synthetic: bool,
}

/// Per-node state kept beside the graph, indexed by `NodeId`
#[derive(Default)]
pub(crate) struct SideTable {
    slots: Vec<Option<Assignment>>,
}

impl SideTable {
    pub fn with_capacity(nodes: usize) -> Self {
        let mut slots = Vec::with_capacity(nodes);
        slots.resize_with(nodes, || None);
        Self { slots }
    }

    pub fn insert(
        &mut self,
        node: NodeId,
        engine: Arc<dyn Engine>,
        kernel: OptKernel,
        synthetic: bool,
    ) {
        if node.0 >= self.slots.len() {
            self.slots.resize_with(node.0 + 1, || None);
        }
        self.slots[node.0] = Some(Assignment {
            engine,
            kernel,
            synthetic,
        });
    }

    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut Assignment> {
        self.slots.get_mut(node.0).and_then(Option::as_mut)
    }

    pub fn engine_id<'a>(&'a self, graph: &Graph, node: NodeId) -> ForgeResult<&'a str> {
        self.slots
            .get(node.0)
            .and_then(Option::as_ref)
            .map(|a| a.engine.engine_id())
            .ok_or_else(|| {
                internal_error!("node '{}' has no engine assignment", graph.node(node).name)
            })
    }
}

/// Compile `graph` against the engines in `resource`.
pub fn process_graph(
    resource: &SharedResource,
    graph: &mut Graph,
) -> ForgeResult<RuntimeGraphInfo> {
    let span = tracing::info_span!(
        "process_graph",
        graph = %graph.name(),
        nodes = graph.node_count()
    );
    let _enter = span.enter();
    let started = Instant::now();

    match compile(resource, graph) {
        Ok(info) => {
            if resource.options().log_partition_summary {
                let stats = info.stats();
                tracing::info!(
                    nodes = stats.total_nodes,
                    conversions = stats.conversion_nodes,
                    dynamic_edges = stats.dynamic_edges,
                    engines = ?stats.nodes_per_engine,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "graph partitioned"
                );
            }
            Ok(info)
        }
        Err(err) => {
            match err.category() {
                ErrorCategory::User => {
                    tracing::warn!(category = %err.category(), error = %err, "compilation failed")
                }
                ErrorCategory::Backend | ErrorCategory::Internal => {
                    tracing::error!(category = %err.category(), error = %err, "compilation failed")
                }
            }
            Err(err)
        }
    }
}

fn check_preconditions(resource: &SharedResource, graph: &Graph) -> ForgeResult<()> {
    if resource.engines().is_empty() {
        return Err(ForgeError::InvalidConfiguration(
            "no engines registered".to_string(),
        ));
    }
    if resource.active_engines().next().is_none() {
        return Err(ForgeError::InvalidConfiguration(format!(
            "engine filter {:?} matches no registered engine",
            resource.options().engine_filter
        )));
    }
    if let Some(edge) = graph.inputs().find(|e| !e.desc.is_resolved()) {
        return Err(StructuralError::UnresolvedGraphInput(edge.name.clone()).into());
    }
    Ok(())
}

fn compile(resource: &SharedResource, graph: &mut Graph) -> ForgeResult<RuntimeGraphInfo> {
    check_preconditions(resource, graph)?;
    let order = graph.topological_order()?;

    let mut table = SideTable::with_capacity(graph.node_count());
    assign::assign_all(resource, graph, &order, &mut table)?;
    boundary::insert_conversions(resource, graph, &mut table)?;

    let order = graph.topological_order()?;
    let mut info = RuntimeGraphInfo::new(graph.name());
    for node_id in order {
        let node = graph.node(node_id);
        let assignment = table
            .get_mut(node_id)
            .ok_or_else(|| internal_error!("node '{}' has no kernel", node.name))?;
        let kernel = assignment.kernel.create_kernel_impl()?;
        info.push_binding(NodeBinding {
            node: node_id,
            name: node.name.clone(),
            op_type: node.op_type.clone(),
            engine: assignment.engine.engine_id().to_string(),
            kernel,
            inputs: node.inputs.clone(),
            outputs: node.outputs.clone(),
            synthetic: assignment.synthetic,
        });
    }
    for edge in graph.edges() {
        info.push_edge(EdgeInfo {
            edge: edge.id,
            name: edge.name.clone(),
            desc: edge.desc.clone(),
        });
    }
    info.set_graph_outputs(graph.outputs().to_vec());

    if resource.options().verify_artifact {
        if info.bindings().len() != graph.node_count() {
            return Err(internal_error!(
                "artifact has {} bindings for {} nodes",
                info.bindings().len(),
                graph.node_count()
            ));
        }
        info.verify()?;
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConstraints, OpCapability, TableEngine};
    use crate::ir::{
        builder::GraphBuilder,
        layout::Layout,
        op::{Attributes, OpType},
        tensor::{DataType, TensorDesc},
    };
    use crate::ops::PASSTHROUGH;
    use crate::runtime::options::CompileOptions;

    fn engine(id: &str, ops: &[&str]) -> Arc<dyn Engine> {
        let mut engine = TableEngine::new(id);
        for op in ops {
            let op_type = OpType::new("test", op);
            engine = engine
                .with_capability(
                    OpCapability::new(op_type.clone()).with_dtypes(DataType::ALL.to_vec()),
                )
                .with_rules(op_type, &PASSTHROUGH);
        }
        Arc::new(engine)
    }

    fn diamond() -> Graph {
        // src feeds left and right; only left feeds join
        let mut builder = GraphBuilder::new("diamond");
        builder
            .set_input("x", TensorDesc::with_static(DataType::F32, &[2, 2]))
            .unwrap();
        builder
            .add_node("src", OpType::new("test", "a"), &["x"], &["s"])
            .unwrap();
        builder
            .add_node("left", OpType::new("test", "a"), &["s"], &["l"])
            .unwrap();
        builder
            .add_node("right", OpType::new("test", "b"), &["s"], &["r"])
            .unwrap();
        builder
            .add_node("join", OpType::new("test", "a"), &["l"], &["y"])
            .unwrap();
        builder.finalize()
    }

    #[test]
    fn test_side_table_reports_missing_assignment() {
        let graph = diamond();
        let table = SideTable::with_capacity(graph.node_count());
        assert!(table.engine_id(&graph, NodeId(0)).unwrap_err().is_internal_error());
    }

    #[test]
    fn test_mixed_consumers_share_one_conversion() {
        let mut resource = SharedResource::new();
        resource.register_engine(engine("one", &["a"])).unwrap();
        resource.register_engine(engine("two", &["b"])).unwrap();
        let mut graph = diamond();

        let info = process_graph(&resource, &mut graph).unwrap();
        assert_eq!(info.stats().conversion_nodes, 1);

        let s = graph.edge_by_name("s").unwrap();
        let left = graph.node_by_name("left").unwrap();
        let right = graph.node_by_name("right").unwrap();
        // same-engine consumer keeps the original edge
        assert!(graph.node(left).inputs.contains(&s));
        assert!(!graph.node(right).inputs.contains(&s));

        let conversion = info.conversions().next().unwrap();
        assert_eq!(conversion.engine, crate::engine::BOUNDARY_ENGINE_ID);
        assert_eq!(conversion.kernel.params.get_str("src_engine"), Ok(Some("one")));
        assert_eq!(conversion.kernel.params.get_str("dst_engine"), Ok(Some("two")));
    }

    #[test]
    fn test_converted_edge_takes_destination_layout() {
        let blocked = TableEngine::new("blocked")
            .with_capability(
                OpCapability::new(OpType::new("test", "b")).with_dtypes(DataType::ALL.to_vec()),
            )
            .with_rules(OpType::new("test", "b"), &PASSTHROUGH)
            .with_constraints(
                EngineConstraints::default().with_default_layout(Layout::Blocked { block: 4 }),
            );
        let mut resource = SharedResource::new();
        resource.register_engine(engine("one", &["a"])).unwrap();
        resource.register_engine(Arc::new(blocked)).unwrap();
        let mut graph = diamond();

        let info = process_graph(&resource, &mut graph).unwrap();
        let conversion = info.conversions().next().unwrap();
        let converted = info.edge_desc(conversion.outputs[0]).unwrap();
        assert_eq!(converted.layout, Layout::Blocked { block: 4 });
        assert_eq!(converted.dtype, Some(DataType::F32));
    }

    #[test]
    fn test_no_engines_is_configuration_error() {
        let resource = SharedResource::new();
        let mut graph = diamond();
        let err = process_graph(&resource, &mut graph).unwrap_err();
        assert!(matches!(err, ForgeError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_filter_matching_nothing_is_configuration_error() {
        let resource = SharedResource::new()
            .with_engine(engine("one", &["a", "b"]))
            .unwrap()
            .with_options(CompileOptions::default().with_engine_filter(["nope"]));
        let mut graph = diamond();
        assert!(matches!(
            process_graph(&resource, &mut graph),
            Err(ForgeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_unresolved_graph_input_rejected() {
        let resource = SharedResource::new()
            .with_engine(engine("one", &["a"]))
            .unwrap();
        let mut builder = GraphBuilder::new("g");
        builder
            .add_node("n", OpType::new("test", "a"), &["x"], &["y"])
            .unwrap();
        let mut graph = builder.finalize();
        let err = process_graph(&resource, &mut graph).unwrap_err();
        assert!(matches!(
            err,
            ForgeError::Structural(StructuralError::UnresolvedGraphInput(ref name)) if name == "x"
        ));
    }

    #[test]
    fn test_attributes_survive_into_kernel_params() {
        let resource = SharedResource::new()
            .with_engine(engine("one", &["a"]))
            .unwrap();
        let mut builder = GraphBuilder::new("g");
        builder
            .set_input("x", TensorDesc::with_static(DataType::I8, &[3]))
            .unwrap();
        builder
            .add_node_with_attrs(
                "n",
                OpType::new("test", "a"),
                Attributes::new().with("alpha", 0.5f32),
                &["x"],
                &["y"],
            )
            .unwrap();
        let mut graph = builder.finalize();
        let info = process_graph(&resource, &mut graph).unwrap();
        let binding = info.binding_by_name("n").unwrap();
        assert!(binding.kernel.params.contains("alpha"));
        assert_eq!(binding.kernel.symbol, "one.test.a");
    }
}
