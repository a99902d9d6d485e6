//! Engine selection and per-node inference.

use super::SideTable;
use crate::engine::Engine;
use crate::error::{ForgeError, ForgeResult, InferenceErrorKind};
use crate::internal_error;
use crate::ir::{
    graph::{EdgeId, Graph, NodeId},
    layout::Layout,
    shape::has_dynamic,
    tensor::TensorDesc,
};
use crate::kernel::OptKernel;
use crate::runtime::{options::CompileOptions, resource::SharedResource};
use std::sync::Arc;

/// First engine in priority order that accepts the node.
pub(crate) fn select_engine(
    resource: &SharedResource,
    graph: &Graph,
    node_id: NodeId,
) -> ForgeResult<Arc<dyn Engine>> {
    let node = graph.node(node_id);
    let inputs = graph.input_descs(node_id);
    if let Some(i) = inputs.iter().position(|d| !d.is_resolved()) {
        return Err(internal_error!(
            "node '{}' reached before input {} was resolved",
            node.name,
            i
        ));
    }

    resource
        .active_engines()
        .find(|engine| engine.supports_op(node, &inputs))
        .cloned()
        .ok_or_else(|| ForgeError::UnsupportedOperation {
            node: node.name.clone(),
            op_type: node.op_type.to_string(),
        })
}

/// Create, initialize, infer and finalize the kernel for one node, writing
/// its output descriptors into the graph.
pub(crate) fn bind_node(
    engine: &dyn Engine,
    graph: &mut Graph,
    node_id: NodeId,
    layout: Layout,
    options: &CompileOptions,
) -> ForgeResult<OptKernel> {
    let (mut kernel, resolved) = {
        let node = graph.node(node_id);
        let mut kernel = engine.create_opt_kernel(node)?;
        kernel.init(node)?;

        let inputs = graph.input_descs(node_id);
        let dtypes = kernel.infer_type(node, &inputs)?;
        let shapes = kernel.infer_shape(node, &inputs)?;
        if !options.allow_dynamic_dims {
            if let Some(i) = shapes.iter().position(|dims| has_dynamic(dims)) {
                return Err(ForgeError::Inference {
                    node: node.name.clone(),
                    kind: InferenceErrorKind::DynamicNotAllowed(i),
                });
            }
        }

        let resolved: Vec<(EdgeId, TensorDesc)> = node
            .outputs
            .iter()
            .zip(dtypes.into_iter().zip(shapes))
            .map(|(edge, (dtype, dims))| (*edge, TensorDesc::new(dtype, dims).with_layout(layout)))
            .collect();
        (kernel, resolved)
    };

    for (edge, desc) in resolved {
        graph.resolve_desc(edge, desc)?;
    }

    let node = graph.node(node_id);
    let inputs = graph.input_descs(node_id);
    let outputs = graph.output_descs(node_id);
    kernel.finalize(node, &inputs, &outputs, options)?;

    tracing::debug!(
        node = %node.name,
        op = %node.op_type,
        engine = engine.engine_id(),
        outputs = ?outputs.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
        "bound node"
    );
    Ok(kernel)
}

/// Assign and bind every node in `order`.
pub(crate) fn assign_all(
    resource: &SharedResource,
    graph: &mut Graph,
    order: &[NodeId],
    table: &mut SideTable,
) -> ForgeResult<()> {
    let options = resource.options();
    for &node_id in order {
        let engine = select_engine(resource, graph, node_id)?;
        let layout = engine.constraints().default_layout;
        let kernel = bind_node(engine.as_ref(), graph, node_id, layout, options)?;
        table.insert(node_id, engine, kernel, false);
    }
    Ok(())
}
