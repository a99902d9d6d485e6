//! Vectorized CPU capability declarations.
//!
//! Covers every built-in op for every data type except F16, which has no
//! native vector arithmetic.

use super::{EngineConstraints, OpCapability, TableEngine};
use crate::ir::{op::OpType, tensor::DataType};
use crate::ops::ONNX_OPS;

pub const CPU_ENGINE_ID: &str = "cpu";

pub fn cpu_engine() -> TableEngine {
    let numeric = vec![
        DataType::I8,
        DataType::U8,
        DataType::I32,
        DataType::I64,
        DataType::F32,
        DataType::F64,
    ];
    let any_but_half: Vec<DataType> = DataType::ALL
        .into_iter()
        .filter(|d| *d != DataType::F16)
        .collect();

    let mut engine = TableEngine::new(CPU_ENGINE_ID).with_feature("simd").with_constraints(
        EngineConstraints::default()
            .with_dtypes(any_but_half.clone())
            .with_max_rank(6)
            .with_dynamic_dims(true),
    );

    for name in ONNX_OPS {
        let dtypes = match *name {
            "Add" | "Sub" | "Mul" | "Div" | "Relu" | "MatMul" | "ArgMax" => numeric.clone(),
            "Sigmoid" | "Tanh" | "Softmax" => vec![DataType::F32, DataType::F64],
            _ => any_but_half.clone(),
        };
        engine = engine.with_capability(
            OpCapability::new(OpType::onnx(name))
                .with_dtypes(dtypes)
                .with_feature("simd"),
        );
    }
    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;

    #[test]
    fn test_cpu_covers_every_builtin_op() {
        let cpu = cpu_engine();
        assert_eq!(cpu.capabilities().len(), ONNX_OPS.len());
        assert_eq!(cpu.constraints().max_rank, 6);
    }

    #[test]
    fn test_cpu_has_no_half_precision() {
        let cpu = cpu_engine();
        for cap in cpu.capabilities() {
            assert!(!cap.supported_dtypes.contains(&DataType::F16), "{}", cap.op_type);
        }
        let add = cpu.op_capability(&OpType::onnx("Add")).unwrap();
        assert!(add.supported_dtypes.contains(&DataType::F64));
    }
}
