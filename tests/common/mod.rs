//! Common test utilities for graphforge integration tests
//!
//! Provides capability-table engines with passthrough rules, chain-graph
//! builders and a process-wide resource with the built-in engines.

#![allow(dead_code)]

use graphforge::ops::PASSTHROUGH;
use graphforge::{
    DataType, Engine, EngineConstraints, Graph, GraphBuilder, OpCapability, OpType,
    SharedResource, TableEngine, TensorDesc,
};
use once_cell::sync::Lazy;
use std::sync::Arc;

pub use serial_test::serial;

/// Domain of the synthetic ops used by partitioning tests
pub const TEST_DOMAIN: &str = "test";

/// Built-in GPU and CPU engines, shared across tests in one binary
pub static DEFAULT_RESOURCE: Lazy<Arc<SharedResource>> =
    Lazy::new(|| Arc::new(SharedResource::with_default_engines()));

pub fn test_op(name: &str) -> OpType {
    OpType::new(TEST_DOMAIN, name)
}

/// Table engine accepting every data type for `ops`, with passthrough rules
pub fn passthrough_table(id: &str, ops: &[&str]) -> TableEngine {
    ops.iter().fold(TableEngine::new(id), |engine, op| {
        engine
            .with_capability(OpCapability::new(test_op(op)).with_dtypes(DataType::ALL.to_vec()))
            .with_rules(test_op(op), &PASSTHROUGH)
    })
}

pub fn passthrough_engine(id: &str, ops: &[&str]) -> Arc<dyn Engine> {
    Arc::new(passthrough_table(id, ops))
}

pub fn constrained_engine(
    id: &str,
    ops: &[&str],
    constraints: EngineConstraints,
) -> Arc<dyn Engine> {
    Arc::new(passthrough_table(id, ops).with_constraints(constraints))
}

/// Resource holding `engines` in priority order
pub fn resource_with(engines: Vec<Arc<dyn Engine>>) -> SharedResource {
    let mut resource = SharedResource::new();
    for engine in engines {
        resource
            .register_engine(engine)
            .expect("test engine ids must be unique");
    }
    resource
}

/// Node name for position `i` of a chain: a, b, c, ...
pub fn chain_node_name(i: usize) -> String {
    if i < 26 {
        ((b'a' + i as u8) as char).to_string()
    } else {
        format!("n{}", i)
    }
}

/// Linear chain `input_of_a -> a -> output_of_a -> b -> ...`.
///
/// Node `i` runs `test::{ops[i]}` and every intermediate edge is marked as
/// a graph output.
pub fn chain_graph(ops: &[&str], input: TensorDesc) -> Graph {
    let mut builder = GraphBuilder::new("chain");
    builder
        .set_input("input_of_a", input)
        .expect("fresh input edge");

    let mut previous = "input_of_a".to_string();
    for (i, op) in ops.iter().enumerate() {
        let name = chain_node_name(i);
        let output = format!("output_of_{}", name);
        builder
            .add_node(&name, test_op(op), &[previous.as_str()], &[output.as_str()])
            .expect("chain node");
        builder.mark_output(&output).expect("chain output");
        previous = output;
    }
    builder.finalize()
}

pub fn f32_input(dims: &[usize]) -> TensorDesc {
    TensorDesc::with_static(DataType::F32, dims)
}
