//! Engine-specific executable unit descriptor.

use crate::ir::{op::Attributes, op::OpType, tensor::TensorDesc};
use serde::Serialize;

/// What the runtime needs to launch one node: which engine, which entry
/// point, with which parameters and how much scratch memory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KernelImpl {
    pub engine: String,
    /// `<engine>.<domain>.<op>`, e.g. `gpu.onnx.Softmax`
    pub symbol: String,
    pub op_type: OpType,
    pub params: Attributes,
    pub output_descs: Vec<TensorDesc>,
    /// Sum of the static output buffer sizes; dynamic outputs count as zero
    pub workspace_bytes: usize,
    pub has_dynamic_shapes: bool,
}

impl KernelImpl {
    pub fn symbol_for(engine: &str, op_type: &OpType) -> String {
        format!("{}.{}.{}", engine, op_type.domain, op_type.name)
    }
}
