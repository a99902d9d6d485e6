//! Elementwise operations: broadcasting binaries, unary activations,
//! `Softmax` and `Cast`.

use super::{
    dims_of, dtype_of, expect_inputs, first_input_shape, first_input_type, keep_attributes,
    no_validation, same_type, OpRules, RuleResult,
};
use crate::error::InferenceErrorKind;
use crate::invalid_shape;
use crate::ir::{
    op::Attributes,
    shape::{format_dims, normalize_axis, Dim},
    tensor::{DataType, TensorDesc},
};

macro_rules! binary_rules {
    ($name:ident, $op:literal) => {
        pub static $name: OpRules = OpRules {
            name: $op,
            validate: no_validation,
            infer_type: binary_type,
            infer_shape: binary_shape,
            normalize: keep_attributes,
        };
    };
}

macro_rules! unary_rules {
    ($name:ident, $op:literal) => {
        pub static $name: OpRules = OpRules {
            name: $op,
            validate: no_validation,
            infer_type: unary_type,
            infer_shape: unary_shape,
            normalize: keep_attributes,
        };
    };
}

binary_rules!(ADD, "Add");
binary_rules!(SUB, "Sub");
binary_rules!(MUL, "Mul");
binary_rules!(DIV, "Div");

unary_rules!(RELU, "Relu");
unary_rules!(SIGMOID, "Sigmoid");
unary_rules!(TANH, "Tanh");
unary_rules!(IDENTITY, "Identity");

pub static SOFTMAX: OpRules = OpRules {
    name: "Softmax",
    validate: no_validation,
    infer_type: softmax_type,
    infer_shape: softmax_shape,
    normalize: softmax_normalize,
};

pub static CAST: OpRules = OpRules {
    name: "Cast",
    validate: cast_validate,
    infer_type: cast_type,
    infer_shape: unary_shape,
    normalize: keep_attributes,
};

fn binary_type(_: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<DataType>> {
    expect_inputs(inputs, 2, 2)?;
    Ok(vec![same_type(inputs)?])
}

fn binary_shape(_: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<Vec<Dim>>> {
    expect_inputs(inputs, 2, 2)?;
    Ok(vec![broadcast(dims_of(inputs, 0)?, dims_of(inputs, 1)?)?])
}

fn unary_type(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<DataType>> {
    expect_inputs(inputs, 1, 1)?;
    first_input_type(attrs, inputs)
}

fn unary_shape(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<Vec<Dim>>> {
    expect_inputs(inputs, 1, 1)?;
    first_input_shape(attrs, inputs)
}

/// Numpy-style broadcast of two dimension lists.
///
/// A dynamic extent against a static extent greater than one resolves to the
/// static extent; against one (or another dynamic extent) it stays dynamic.
pub fn broadcast(a: &[Dim], b: &[Dim]) -> RuleResult<Vec<Dim>> {
    let rank = a.len().max(b.len());
    let mut out = Vec::with_capacity(rank);
    for i in 0..rank {
        let da = if i < rank - a.len() { Dim::Static(1) } else { a[i - (rank - a.len())] };
        let db = if i < rank - b.len() { Dim::Static(1) } else { b[i - (rank - b.len())] };
        let dim = match (da, db) {
            (Dim::Static(x), Dim::Static(y)) if x == y => Dim::Static(x),
            (Dim::Static(1), other) | (other, Dim::Static(1)) => other,
            (Dim::Dynamic, Dim::Static(n)) | (Dim::Static(n), Dim::Dynamic) => Dim::Static(n),
            (Dim::Dynamic, Dim::Dynamic) => Dim::Dynamic,
            (Dim::Static(_), Dim::Static(_)) => {
                return Err(invalid_shape!(
                    "cannot broadcast {} with {}",
                    format_dims(a),
                    format_dims(b)
                ))
            }
        };
        out.push(dim);
    }
    Ok(out)
}

fn softmax_type(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<DataType>> {
    expect_inputs(inputs, 1, 1)?;
    let dtype = dtype_of(inputs, 0)?;
    if !dtype.is_float() {
        return Err(InferenceErrorKind::TypeMismatch(format!(
            "Softmax requires a floating point input, got {}",
            dtype
        )));
    }
    first_input_type(attrs, inputs)
}

fn softmax_axis(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<usize> {
    let dims = dims_of(inputs, 0)?;
    let axis = attrs.int_or("axis", -1)?;
    normalize_axis(axis, dims.len())
        .ok_or_else(|| invalid_shape!("axis {} out of range for rank {}", axis, dims.len()))
}

fn softmax_shape(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<Vec<Dim>>> {
    expect_inputs(inputs, 1, 1)?;
    softmax_axis(attrs, inputs)?;
    first_input_shape(attrs, inputs)
}

fn softmax_normalize(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Attributes> {
    let axis = softmax_axis(attrs, inputs)?;
    Ok(attrs.clone().with("axis", axis as i64))
}

fn cast_validate(attrs: &Attributes) -> RuleResult<()> {
    attrs.require_dtype("to").map(|_| ())
}

fn cast_type(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<DataType>> {
    expect_inputs(inputs, 1, 1)?;
    dtype_of(inputs, 0)?;
    Ok(vec![attrs.require_dtype("to")?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::shape::static_shape;

    fn f32_desc(dims: &[usize]) -> TensorDesc {
        TensorDesc::with_static(DataType::F32, dims)
    }

    #[test]
    fn test_broadcast_static() {
        assert_eq!(
            broadcast(&static_shape(&[2, 1, 4]), &static_shape(&[3, 1])),
            Ok(static_shape(&[2, 3, 4]))
        );
        assert_eq!(broadcast(&static_shape(&[]), &static_shape(&[5])), Ok(static_shape(&[5])));
        assert!(matches!(
            broadcast(&static_shape(&[2, 3]), &static_shape(&[4, 3])),
            Err(InferenceErrorKind::InvalidShape(_))
        ));
    }

    #[test]
    fn test_broadcast_dynamic() {
        let a = vec![Dim::Dynamic, Dim::Static(4)];
        assert_eq!(broadcast(&a, &static_shape(&[1, 4])), Ok(a.clone()));
        assert_eq!(
            broadcast(&a, &static_shape(&[3, 4])),
            Ok(static_shape(&[3, 4]))
        );
        assert_eq!(
            broadcast(&[Dim::Dynamic], &[Dim::Dynamic]),
            Ok(vec![Dim::Dynamic])
        );
    }

    #[test]
    fn test_binary_requires_equal_types() {
        let a = f32_desc(&[2]);
        let b = TensorDesc::with_static(DataType::I32, &[2]);
        assert!(matches!(
            (ADD.infer_type)(&Attributes::new(), &[&a, &b]),
            Err(InferenceErrorKind::TypeMismatch(_))
        ));
        assert_eq!(
            (MUL.infer_type)(&Attributes::new(), &[&a, &a]),
            Ok(vec![DataType::F32])
        );
    }

    #[test]
    fn test_softmax_axis_normalized() {
        let x = f32_desc(&[2, 8]);
        let attrs = Attributes::new();
        let normalized = (SOFTMAX.normalize)(&attrs, &[&x]).unwrap();
        assert_eq!(normalized.get_int("axis"), Ok(Some(1)));

        let bad = Attributes::new().with("axis", 2i64);
        assert!(matches!(
            (SOFTMAX.infer_shape)(&bad, &[&x]),
            Err(InferenceErrorKind::InvalidShape(_))
        ));
    }

    #[test]
    fn test_softmax_rejects_integers() {
        let x = TensorDesc::with_static(DataType::I64, &[4]);
        assert!(matches!(
            (SOFTMAX.infer_type)(&Attributes::new(), &[&x]),
            Err(InferenceErrorKind::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_cast_forces_target_type() {
        let x = f32_desc(&[3]);
        let attrs = Attributes::new().with("to", DataType::F16);
        assert_eq!((CAST.validate)(&attrs), Ok(()));
        assert_eq!((CAST.infer_type)(&attrs, &[&x]), Ok(vec![DataType::F16]));
        assert_eq!(
            (CAST.validate)(&Attributes::new()),
            Err(InferenceErrorKind::MissingAttribute("to".into()))
        );
    }
}
