//! Per-operation validation and inference rules.
//!
//! Every supported operation has one static [`OpRules`] entry. Rules are
//! plain function pointers: they see the node's attributes and its input
//! descriptors and never touch the graph.

pub mod convert;
pub mod elementwise;
pub mod index;
pub mod linalg;
pub mod shape_ops;

use crate::error::InferenceErrorKind;
use crate::ir::{
    op::{Attributes, OpType, INTERNAL_DOMAIN, ONNX_DOMAIN},
    shape::Dim,
    tensor::{DataType, TensorDesc},
};
use std::fmt;

pub type RuleResult<T> = Result<T, InferenceErrorKind>;

/// Static rule table entry for one operation.
pub struct OpRules {
    pub name: &'static str,
    /// Structural checks on the attribute block
    pub validate: fn(&Attributes) -> RuleResult<()>,
    /// One data type per output
    pub infer_type: fn(&Attributes, &[&TensorDesc]) -> RuleResult<Vec<DataType>>,
    /// One dimension list per output
    pub infer_shape: fn(&Attributes, &[&TensorDesc]) -> RuleResult<Vec<Vec<Dim>>>,
    /// Attribute block handed to the kernel (defaults filled in, axes normalized)
    pub normalize: fn(&Attributes, &[&TensorDesc]) -> RuleResult<Attributes>,
}

impl fmt::Debug for OpRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpRules").field("name", &self.name).finish()
    }
}

/// Single output with the type and shape of input 0.
pub static PASSTHROUGH: OpRules = OpRules {
    name: "Passthrough",
    validate: no_validation,
    infer_type: first_input_type,
    infer_shape: first_input_shape,
    normalize: keep_attributes,
};

/// Names of the standard operations with built-in rules
pub const ONNX_OPS: &[&str] = &[
    "Add", "Sub", "Mul", "Div", "Relu", "Sigmoid", "Tanh", "Identity", "Softmax", "Cast",
    "MatMul", "Reshape", "Unsqueeze", "Transpose", "Flatten", "Concat", "Shape", "ArgMax",
    "NonZero",
];

pub fn lookup(op_type: &OpType) -> Option<&'static OpRules> {
    let rules = match (op_type.domain.as_str(), op_type.name.as_str()) {
        (ONNX_DOMAIN, "Add") => &elementwise::ADD,
        (ONNX_DOMAIN, "Sub") => &elementwise::SUB,
        (ONNX_DOMAIN, "Mul") => &elementwise::MUL,
        (ONNX_DOMAIN, "Div") => &elementwise::DIV,
        (ONNX_DOMAIN, "Relu") => &elementwise::RELU,
        (ONNX_DOMAIN, "Sigmoid") => &elementwise::SIGMOID,
        (ONNX_DOMAIN, "Tanh") => &elementwise::TANH,
        (ONNX_DOMAIN, "Identity") => &elementwise::IDENTITY,
        (ONNX_DOMAIN, "Softmax") => &elementwise::SOFTMAX,
        (ONNX_DOMAIN, "Cast") => &elementwise::CAST,
        (ONNX_DOMAIN, "MatMul") => &linalg::MATMUL,
        (ONNX_DOMAIN, "Reshape") => &shape_ops::RESHAPE,
        (ONNX_DOMAIN, "Unsqueeze") => &shape_ops::UNSQUEEZE,
        (ONNX_DOMAIN, "Transpose") => &shape_ops::TRANSPOSE,
        (ONNX_DOMAIN, "Flatten") => &shape_ops::FLATTEN,
        (ONNX_DOMAIN, "Concat") => &shape_ops::CONCAT,
        (ONNX_DOMAIN, "Shape") => &shape_ops::SHAPE,
        (ONNX_DOMAIN, "ArgMax") => &index::ARGMAX,
        (ONNX_DOMAIN, "NonZero") => &index::NONZERO,
        (INTERNAL_DOMAIN, "Convert") => &convert::CONVERT,
        _ => return None,
    };
    Some(rules)
}

pub(crate) fn expect_inputs(inputs: &[&TensorDesc], min: usize, max: usize) -> RuleResult<()> {
    if inputs.len() < min || inputs.len() > max {
        let expected = if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!("at least {}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(InferenceErrorKind::InputArity {
            expected,
            got: inputs.len(),
        });
    }
    Ok(())
}

pub(crate) fn dtype_of(inputs: &[&TensorDesc], index: usize) -> RuleResult<DataType> {
    inputs
        .get(index)
        .and_then(|d| d.dtype)
        .ok_or(InferenceErrorKind::UnresolvedInput(index))
}

pub(crate) fn dims_of<'a>(inputs: &[&'a TensorDesc], index: usize) -> RuleResult<&'a [Dim]> {
    inputs
        .get(index)
        .and_then(|d| d.dims.as_deref())
        .ok_or(InferenceErrorKind::UnresolvedInput(index))
}

/// All inputs must share input 0's type
pub(crate) fn same_type(inputs: &[&TensorDesc]) -> RuleResult<DataType> {
    let first = dtype_of(inputs, 0)?;
    for i in 1..inputs.len() {
        let other = dtype_of(inputs, i)?;
        if other != first {
            return Err(InferenceErrorKind::TypeMismatch(format!(
                "input 0 is {} but input {} is {}",
                first, i, other
            )));
        }
    }
    Ok(first)
}

pub(crate) fn no_validation(_: &Attributes) -> RuleResult<()> {
    Ok(())
}

pub(crate) fn keep_attributes(attrs: &Attributes, _: &[&TensorDesc]) -> RuleResult<Attributes> {
    Ok(attrs.clone())
}

pub(crate) fn first_input_type(
    _: &Attributes,
    inputs: &[&TensorDesc],
) -> RuleResult<Vec<DataType>> {
    expect_inputs(inputs, 1, usize::MAX)?;
    Ok(vec![dtype_of(inputs, 0)?])
}

pub(crate) fn first_input_shape(
    _: &Attributes,
    inputs: &[&TensorDesc],
) -> RuleResult<Vec<Vec<Dim>>> {
    expect_inputs(inputs, 1, usize::MAX)?;
    Ok(vec![dims_of(inputs, 0)?.to_vec()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_covers_standard_ops() {
        for name in ONNX_OPS {
            let rules = lookup(&OpType::onnx(name));
            assert!(rules.is_some(), "missing rules for {}", name);
            assert_eq!(rules.map(|r| r.name), Some(*name));
        }
        assert!(lookup(&OpType::convert()).is_some());
        assert!(lookup(&OpType::onnx("Gemm")).is_none());
        assert!(lookup(&OpType::new("test", "Add")).is_none());
    }

    #[test]
    fn test_passthrough() {
        let x = TensorDesc::with_static(DataType::U8, &[3, 1]);
        let attrs = Attributes::new();
        assert_eq!((PASSTHROUGH.infer_type)(&attrs, &[&x]), Ok(vec![DataType::U8]));
        assert_eq!(
            (PASSTHROUGH.infer_shape)(&attrs, &[&x]),
            Ok(vec![vec![Dim::Static(3), Dim::Static(1)]])
        );
        assert!(matches!(
            (PASSTHROUGH.infer_type)(&attrs, &[]),
            Err(InferenceErrorKind::InputArity { .. })
        ));
    }

    #[test]
    fn test_unresolved_input_reported() {
        let x = TensorDesc::unresolved();
        assert_eq!(
            (PASSTHROUGH.infer_type)(&Attributes::new(), &[&x]),
            Err(InferenceErrorKind::UnresolvedInput(0))
        );
    }

    #[test]
    fn test_same_type() {
        let a = TensorDesc::with_static(DataType::F32, &[1]);
        let b = TensorDesc::with_static(DataType::F16, &[1]);
        assert_eq!(same_type(&[&a, &a]), Ok(DataType::F32));
        assert!(matches!(
            same_type(&[&a, &b]),
            Err(InferenceErrorKind::TypeMismatch(_))
        ));
    }
}
