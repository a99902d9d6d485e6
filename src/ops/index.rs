//! Index-producing operations. Both force `I64` output regardless of the
//! input type.

use super::{dims_of, dtype_of, expect_inputs, keep_attributes, no_validation, OpRules, RuleResult};
use crate::error::invalid_attr;
use crate::invalid_shape;
use crate::ir::{
    op::Attributes,
    shape::{normalize_axis, Dim},
    tensor::{DataType, TensorDesc},
};

/// Coordinates of the non-zero elements, shape `[rank, count]`.
pub static NONZERO: OpRules = OpRules {
    name: "NonZero",
    validate: no_validation,
    infer_type: index_type,
    infer_shape: nonzero_shape,
    normalize: keep_attributes,
};

pub static ARGMAX: OpRules = OpRules {
    name: "ArgMax",
    validate: argmax_validate,
    infer_type: index_type,
    infer_shape: argmax_shape,
    normalize: argmax_normalize,
};

fn index_type(_: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<DataType>> {
    expect_inputs(inputs, 1, 1)?;
    dtype_of(inputs, 0)?;
    Ok(vec![DataType::I64])
}

fn nonzero_shape(_: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<Vec<Dim>>> {
    expect_inputs(inputs, 1, 1)?;
    let rank = dims_of(inputs, 0)?.len();
    // the count depends on the data
    Ok(vec![vec![Dim::Static(rank), Dim::Dynamic]])
}

fn argmax_validate(attrs: &Attributes) -> RuleResult<()> {
    match attrs.int_or("keepdims", 1)? {
        0 | 1 => Ok(()),
        other => Err(invalid_attr("keepdims", format!("expected 0 or 1, got {}", other))),
    }
}

fn argmax_axis(attrs: &Attributes, rank: usize) -> RuleResult<usize> {
    let axis = attrs.int_or("axis", 0)?;
    normalize_axis(axis, rank)
        .ok_or_else(|| invalid_shape!("axis {} out of range for rank {}", axis, rank))
}

fn argmax_shape(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<Vec<Dim>>> {
    expect_inputs(inputs, 1, 1)?;
    let source = dims_of(inputs, 0)?;
    let axis = argmax_axis(attrs, source.len())?;
    let keepdims = attrs.int_or("keepdims", 1)? == 1;

    let mut out = source.to_vec();
    if keepdims {
        out[axis] = Dim::Static(1);
    } else {
        out.remove(axis);
    }
    Ok(vec![out])
}

fn argmax_normalize(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Attributes> {
    let axis = argmax_axis(attrs, dims_of(inputs, 0)?.len())?;
    let keepdims = attrs.int_or("keepdims", 1)?;
    Ok(attrs
        .clone()
        .with("axis", axis as i64)
        .with("keepdims", keepdims))
}
