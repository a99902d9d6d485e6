//! Boundary pass: one conversion node per edge whose producer and some
//! consumer live on different engines.

use super::{assign::bind_node, SideTable};
use crate::engine::Engine;
use crate::error::{ForgeError, ForgeResult};
use crate::ir::{
    graph::{EdgeId, Graph, NodeId},
    layout::Layout,
    op::{Attributes, OpType},
};
use crate::ops::convert::{DST_ENGINE_ATTR, SRC_ENGINE_ATTR};
use crate::runtime::resource::SharedResource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Crossing {
    pub edge: EdgeId,
    pub src_engine: String,
    /// Consumers bound to another engine than the producer
    pub foreign: Vec<NodeId>,
    /// Distinct engines of the foreign consumers, first-seen order
    pub dst_engines: Vec<String>,
}

/// Edges that need a conversion, in edge index order.
pub(crate) fn find_crossings(graph: &Graph, table: &SideTable) -> ForgeResult<Vec<Crossing>> {
    let mut crossings = Vec::new();
    for edge in graph.edges() {
        // graph inputs and constants are engine-neutral
        let Some(producer) = edge.producer else {
            continue;
        };
        let src_engine = table.engine_id(graph, producer)?;

        let mut foreign = Vec::new();
        let mut dst_engines: Vec<String> = Vec::new();
        for &consumer in &edge.consumers {
            let engine = table.engine_id(graph, consumer)?;
            if engine != src_engine {
                foreign.push(consumer);
                if !dst_engines.iter().any(|e| e == engine) {
                    dst_engines.push(engine.to_string());
                }
            }
        }

        if !foreign.is_empty() {
            crossings.push(Crossing {
                edge: edge.id,
                src_engine: src_engine.to_string(),
                foreign,
                dst_engines,
            });
        }
    }
    Ok(crossings)
}

/// The converted edge takes the destination layout when all destinations
/// agree on one, row-major otherwise.
fn destination_layout(resource: &SharedResource, dst_engines: &[String]) -> Layout {
    let mut layouts = dst_engines
        .iter()
        .filter_map(|id| resource.engine(id))
        .map(|engine| engine.constraints().default_layout);
    let Some(first) = layouts.next() else {
        return Layout::RowMajor;
    };
    if layouts.all(|l| l == first) {
        first
    } else {
        Layout::RowMajor
    }
}

/// Insert and bind conversion nodes; returns how many were added.
pub(crate) fn insert_conversions(
    resource: &SharedResource,
    graph: &mut Graph,
    table: &mut SideTable,
) -> ForgeResult<usize> {
    let crossings = find_crossings(graph, table)?;
    let boundary = resource.boundary_engine().clone();
    let options = resource.options();

    for crossing in &crossings {
        let attrs = Attributes::new()
            .with(SRC_ENGINE_ATTR, crossing.src_engine.as_str())
            .with(DST_ENGINE_ATTR, crossing.dst_engines.join(","));
        let name = format!("{}_convert", graph.edge(crossing.edge).name);
        let (node_id, _) = graph.insert_node_on_edge(
            crossing.edge,
            &crossing.foreign,
            &name,
            OpType::convert(),
            attrs,
        )?;

        let node = graph.node(node_id);
        if !boundary.supports_op(node, &graph.input_descs(node_id)) {
            return Err(ForgeError::UnsupportedOperation {
                node: node.name.clone(),
                op_type: node.op_type.to_string(),
            });
        }

        let layout = destination_layout(resource, &crossing.dst_engines);
        let kernel = bind_node(boundary.as_ref(), graph, node_id, layout, options)?;
        tracing::debug!(
            edge = %graph.edge(crossing.edge).name,
            src = %crossing.src_engine,
            dst = ?crossing.dst_engines,
            consumers = crossing.foreign.len(),
            "inserted boundary conversion"
        );
        table.insert(node_id, boundary.clone(), kernel, true);
    }
    Ok(crossings.len())
}
