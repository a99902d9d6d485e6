//! GPU capability declarations.
//!
//! Float-centric: arithmetic runs in F32/F16, integer tensors are accepted
//! only by data-movement and index ops.

use super::{EngineConstraints, OpCapability, TableEngine};
use crate::ir::{op::OpType, tensor::DataType};

pub const GPU_ENGINE_ID: &str = "gpu";

/// 512M elements per input
const GPU_MAX_ELEMENTS: usize = 512 * 1024 * 1024;
/// 2 GiB of scratch per kernel
const GPU_WORKSPACE_LIMIT: usize = 2 << 30;

pub fn gpu_engine() -> TableEngine {
    let float = vec![DataType::F32, DataType::F16];
    let movable = vec![DataType::F32, DataType::F16, DataType::I32, DataType::I64];
    let native = vec![
        DataType::Bool,
        DataType::I32,
        DataType::I64,
        DataType::F16,
        DataType::F32,
    ];

    let mut engine = TableEngine::new(GPU_ENGINE_ID)
        .with_feature("fp16")
        .with_constraints(
            EngineConstraints::default()
                .with_dtypes(native.clone())
                .with_max_rank(8)
                .with_dynamic_dims(true)
                .with_workspace_limit(GPU_WORKSPACE_LIMIT),
        );

    let arithmetic = [
        "Add", "Sub", "Mul", "Div", "Relu", "Sigmoid", "Tanh", "Softmax", "MatMul", "ArgMax",
    ];
    for name in arithmetic {
        engine = engine.with_capability(
            OpCapability::new(OpType::onnx(name))
                .with_dtypes(float.clone())
                .with_max_size(GPU_MAX_ELEMENTS),
        );
    }
    for name in ["Identity", "Reshape", "Unsqueeze", "Transpose", "Flatten", "Concat", "Cast"] {
        engine = engine.with_capability(
            OpCapability::new(OpType::onnx(name))
                .with_dtypes(movable.clone())
                .with_max_size(GPU_MAX_ELEMENTS),
        );
    }
    // Shape only reads metadata
    engine = engine.with_capability(
        OpCapability::new(OpType::onnx("Shape")).with_dtypes(native.clone()),
    );
    engine.with_capability(
        OpCapability::new(OpType::onnx("NonZero"))
            .with_dtypes(native)
            .with_max_size(GPU_MAX_ELEMENTS),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;

    #[test]
    fn test_gpu_is_float_centric() {
        let gpu = gpu_engine();
        let add = gpu.op_capability(&OpType::onnx("Add")).unwrap();
        assert!(add.supported_dtypes.contains(&DataType::F16));
        assert!(!add.supported_dtypes.contains(&DataType::F64));
        assert!(!add.supported_dtypes.contains(&DataType::I64));
        assert_eq!(gpu.constraints().max_rank, 8);
        assert!(gpu.constraints().allow_dynamic_dims);
        assert!(gpu.constraints().alignment.is_none());
    }

    #[test]
    fn test_gpu_ops_have_rules() {
        let gpu = gpu_engine();
        for cap in gpu.capabilities() {
            assert!(crate::ops::lookup(&cap.op_type).is_some(), "{}", cap.op_type);
        }
    }

    #[test]
    fn test_gpu_capabilities_stay_within_constraints() {
        // an accepted input type the engine cannot finalize would fail without fallback
        let gpu = gpu_engine();
        let native = &gpu.constraints().supported_dtypes;
        for cap in gpu.capabilities() {
            for dtype in &cap.supported_dtypes {
                assert!(native.contains(dtype), "{} accepts {}", cap.op_type, dtype);
            }
        }
    }
}
