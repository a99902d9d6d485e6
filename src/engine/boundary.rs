//! The engine that owns synthesized conversion nodes.

use super::{Engine, EngineConstraints, OpCapability};
use crate::error::{ForgeError, ForgeResult};
use crate::ir::{graph::Node, op::OpType, tensor::DataType};
use crate::kernel::OptKernel;
use crate::ops::convert::CONVERT;

pub const BOUNDARY_ENGINE_ID: &str = "boundary";

/// Accepts `graphforge::Convert` for any data type and nothing else.
#[derive(Debug, Clone)]
pub struct BoundaryEngine {
    constraints: EngineConstraints,
}

impl BoundaryEngine {
    pub fn new() -> Self {
        Self {
            constraints: EngineConstraints::default().with_max_rank(usize::MAX),
        }
    }
}

impl Default for BoundaryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for BoundaryEngine {
    fn engine_id(&self) -> &str {
        BOUNDARY_ENGINE_ID
    }

    fn capabilities(&self) -> Vec<OpCapability> {
        vec![OpCapability::new(OpType::convert()).with_dtypes(DataType::ALL.to_vec())]
    }

    fn op_capability(&self, op_type: &OpType) -> Option<OpCapability> {
        self.capabilities()
            .into_iter()
            .find(|c| &c.op_type == op_type)
    }

    fn constraints(&self) -> &EngineConstraints {
        &self.constraints
    }

    fn create_opt_kernel(&self, node: &Node) -> ForgeResult<OptKernel> {
        if !node.op_type.is_convert() {
            return Err(ForgeError::Instantiation {
                node: node.name.clone(),
                engine: BOUNDARY_ENGINE_ID.to_string(),
                reason: format!("{} is not a boundary conversion", node.op_type),
            });
        }
        Ok(OptKernel::new(node, self.profile(), &CONVERT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        graph::{EdgeId, NodeId},
        op::Attributes,
        tensor::TensorDesc,
    };

    fn node(op_type: OpType) -> Node {
        Node {
            id: NodeId(3),
            name: "conv".to_string(),
            op_type,
            inputs: vec![EdgeId(0)],
            outputs: vec![EdgeId(1)],
            attrs: Attributes::new(),
        }
    }

    #[test]
    fn test_only_convert_supported() {
        let engine = BoundaryEngine::new();
        let x = TensorDesc::with_static(DataType::U8, &[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert!(engine.supports_op(&node(OpType::convert()), &[&x]));
        assert!(!engine.supports_op(&node(OpType::onnx("Relu")), &[&x]));
        assert!(engine.create_opt_kernel(&node(OpType::onnx("Relu"))).is_err());
        assert!(engine.create_opt_kernel(&node(OpType::convert())).is_ok());
    }
}
