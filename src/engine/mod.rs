//! # Engine Capability Interface
//!
//! An engine answers two questions for the partitioner: can it run a node
//! (`supports_op`, pure and safe to call speculatively), and if so, give me
//! a kernel wrapper bound to you (`create_opt_kernel`).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use graphforge::engine::{gpu_engine, cpu_engine, Engine};
//!
//! let gpu = gpu_engine();
//! if gpu.supports_op(node, &inputs) {
//!     let kernel = gpu.create_opt_kernel(node)?;
//! }
//! ```

pub mod boundary;
pub mod cpu;
pub mod gpu;
pub mod table;

pub use boundary::{BoundaryEngine, BOUNDARY_ENGINE_ID};
pub use cpu::{cpu_engine, CPU_ENGINE_ID};
pub use gpu::{gpu_engine, GPU_ENGINE_ID};
pub use table::TableEngine;

use crate::error::ForgeResult;
use crate::ir::{
    graph::Node,
    layout::Layout,
    op::OpType,
    shape::{element_count, Dim},
    tensor::{DataType, TensorDesc},
};
use crate::kernel::OptKernel;
use serde::Serialize;

/// Capability descriptor for one operation on an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpCapability {
    pub op_type: OpType,
    pub supported_dtypes: Vec<DataType>,
    /// Largest static element count of any input
    pub max_tensor_size: Option<usize>,
    /// Engine feature that must be enabled, e.g. "fp16" or "simd"
    pub requires_feature: Option<String>,
}

impl OpCapability {
    /// Create a new capability descriptor (F32 only)
    pub fn new(op_type: OpType) -> Self {
        Self {
            op_type,
            supported_dtypes: vec![DataType::F32],
            max_tensor_size: None,
            requires_feature: None,
        }
    }

    /// Replace the accepted input data types
    pub fn with_dtypes(mut self, dtypes: Vec<DataType>) -> Self {
        self.supported_dtypes = dtypes;
        self
    }

    /// Set maximum tensor size in elements
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_tensor_size = Some(size);
        self
    }

    /// Set required feature
    pub fn with_feature(mut self, feature: &str) -> Self {
        self.requires_feature = Some(feature.to_string());
        self
    }

    /// Whether one input descriptor satisfies this entry
    pub fn accepts(&self, dtype: DataType, dims: &[Dim]) -> bool {
        if !self.supported_dtypes.contains(&dtype) {
            return false;
        }
        match (self.max_tensor_size, crate::ir::shape::to_static(dims)) {
            (Some(max), Some(static_dims)) => {
                element_count(&static_dims).is_some_and(|count| count <= max)
            }
            _ => true,
        }
    }
}

/// Limits an engine enforces at finalize and instantiation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineConstraints {
    pub supported_dtypes: Vec<DataType>,
    pub max_rank: usize,
    /// Required byte multiple of the innermost dimension
    pub alignment: Option<usize>,
    pub allow_dynamic_dims: bool,
    /// Layout given to the outputs of nodes bound to this engine
    pub default_layout: Layout,
    /// Upper bound on a kernel's workspace estimate in bytes
    pub workspace_limit: Option<usize>,
}

impl Default for EngineConstraints {
    fn default() -> Self {
        Self {
            supported_dtypes: DataType::ALL.to_vec(),
            max_rank: 8,
            alignment: None,
            allow_dynamic_dims: true,
            default_layout: Layout::RowMajor,
            workspace_limit: None,
        }
    }
}

impl EngineConstraints {
    pub fn with_dtypes(mut self, dtypes: Vec<DataType>) -> Self {
        self.supported_dtypes = dtypes;
        self
    }

    pub fn with_max_rank(mut self, max_rank: usize) -> Self {
        self.max_rank = max_rank;
        self
    }

    pub fn with_alignment(mut self, bytes: usize) -> Self {
        self.alignment = Some(bytes);
        self
    }

    pub fn with_dynamic_dims(mut self, allow: bool) -> Self {
        self.allow_dynamic_dims = allow;
        self
    }

    pub fn with_default_layout(mut self, layout: Layout) -> Self {
        self.default_layout = layout;
        self
    }

    pub fn with_workspace_limit(mut self, bytes: usize) -> Self {
        self.workspace_limit = Some(bytes);
        self
    }
}

/// Identity and limits of the engine a kernel wrapper is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineProfile {
    pub engine_id: String,
    pub constraints: EngineConstraints,
}

/// Capability query and kernel factory for one compute engine
pub trait Engine: Send + Sync {
    /// Stable identifier ("gpu", "cpu", ...)
    fn engine_id(&self) -> &str;

    /// All operations this engine can execute
    fn capabilities(&self) -> Vec<OpCapability>;

    /// Capability entry for an op type, `None` if unsupported
    fn op_capability(&self, op_type: &OpType) -> Option<OpCapability>;

    fn constraints(&self) -> &EngineConstraints;

    /// Whether this engine accepts `node` with the given input descriptors.
    ///
    /// Conservatively false when any input lacks a type or dimensions.
    fn supports_op(&self, node: &Node, inputs: &[&TensorDesc]) -> bool {
        let Some(capability) = self.op_capability(&node.op_type) else {
            return false;
        };
        let constraints = self.constraints();
        inputs.iter().all(|desc| match (desc.dtype, desc.dims.as_deref()) {
            (Some(dtype), Some(dims)) => {
                dims.len() <= constraints.max_rank && capability.accepts(dtype, dims)
            }
            _ => false,
        })
    }

    /// Build an unbound kernel wrapper for `node`
    fn create_opt_kernel(&self, node: &Node) -> ForgeResult<OptKernel>;

    fn profile(&self) -> EngineProfile {
        EngineProfile {
            engine_id: self.engine_id().to_string(),
            constraints: self.constraints().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_builder() {
        let cap = OpCapability::new(OpType::onnx("MatMul"))
            .with_dtypes(vec![DataType::F32, DataType::F16])
            .with_max_size(1024)
            .with_feature("fp16");

        assert_eq!(cap.supported_dtypes, vec![DataType::F32, DataType::F16]);
        assert_eq!(cap.max_tensor_size, Some(1024));
        assert_eq!(cap.requires_feature.as_deref(), Some("fp16"));
    }

    #[test]
    fn test_capability_accepts() {
        let cap = OpCapability::new(OpType::onnx("Add")).with_max_size(16);
        assert!(cap.accepts(DataType::F32, &[Dim::Static(4), Dim::Static(4)]));
        assert!(!cap.accepts(DataType::F32, &[Dim::Static(4), Dim::Static(5)]));
        assert!(!cap.accepts(DataType::I32, &[Dim::Static(4)]));
        // unknown size cannot be rejected up front
        assert!(cap.accepts(DataType::F32, &[Dim::Dynamic, Dim::Static(64)]));
        // an element count past usize is over any limit
        assert!(!cap.accepts(DataType::F32, &[Dim::Static(1 << 33), Dim::Static(1 << 33)]));
    }

    #[test]
    fn test_constraints_builder() {
        let constraints = EngineConstraints::default()
            .with_max_rank(4)
            .with_alignment(16)
            .with_dynamic_dims(false)
            .with_workspace_limit(1 << 20);
        assert_eq!(constraints.max_rank, 4);
        assert_eq!(constraints.alignment, Some(16));
        assert!(!constraints.allow_dynamic_dims);
        assert_eq!(constraints.workspace_limit, Some(1 << 20));
        assert_eq!(constraints.default_layout, Layout::RowMajor);
    }
}
