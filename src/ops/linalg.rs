//! `MatMul` with batch broadcasting.

use super::{dims_of, expect_inputs, keep_attributes, no_validation, same_type, OpRules, RuleResult};
use crate::invalid_shape;
use crate::ir::{
    op::Attributes,
    shape::{format_dims, Dim},
    tensor::{DataType, TensorDesc},
};
use crate::ops::elementwise::broadcast;

pub static MATMUL: OpRules = OpRules {
    name: "MatMul",
    validate: no_validation,
    infer_type: matmul_type,
    infer_shape: matmul_shape,
    normalize: keep_attributes,
};

fn matmul_type(_: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<DataType>> {
    expect_inputs(inputs, 2, 2)?;
    Ok(vec![same_type(inputs)?])
}

/// `[..., M, K] x [..., K, N] -> [..., M, N]`
fn matmul_shape(_: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<Vec<Dim>>> {
    expect_inputs(inputs, 2, 2)?;
    let a = dims_of(inputs, 0)?;
    let b = dims_of(inputs, 1)?;
    if a.len() < 2 || b.len() < 2 {
        return Err(invalid_shape!(
            "MatMul needs rank >= 2 operands, got {} and {}",
            format_dims(a),
            format_dims(b)
        ));
    }

    let (a_batch, a_mat) = a.split_at(a.len() - 2);
    let (b_batch, b_mat) = b.split_at(b.len() - 2);
    if let (Dim::Static(k1), Dim::Static(k2)) = (a_mat[1], b_mat[0]) {
        if k1 != k2 {
            return Err(invalid_shape!(
                "inner dimensions differ: {} x {}",
                format_dims(a),
                format_dims(b)
            ));
        }
    }

    let mut out = broadcast(a_batch, b_batch)?;
    out.push(a_mat[0]);
    out.push(b_mat[1]);
    Ok(vec![out])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceErrorKind;
    use crate::ir::shape::static_shape;

    #[test]
    fn test_matmul_batch_broadcast() {
        let a = TensorDesc::with_static(DataType::F32, &[8, 1, 4, 16]);
        let b = TensorDesc::with_static(DataType::F32, &[3, 16, 2]);
        assert_eq!(
            (MATMUL.infer_shape)(&Attributes::new(), &[&a, &b]),
            Ok(vec![static_shape(&[8, 3, 4, 2])])
        );
    }

    #[test]
    fn test_matmul_inner_mismatch() {
        let a = TensorDesc::with_static(DataType::F32, &[4, 16]);
        let b = TensorDesc::with_static(DataType::F32, &[15, 2]);
        assert!(matches!(
            (MATMUL.infer_shape)(&Attributes::new(), &[&a, &b]),
            Err(InferenceErrorKind::InvalidShape(_))
        ));
    }

    #[test]
    fn test_matmul_dynamic_rows() {
        let a = TensorDesc::new(DataType::F16, vec![Dim::Dynamic, Dim::Static(16)]);
        let b = TensorDesc::with_static(DataType::F16, &[16, 2]);
        assert_eq!(
            (MATMUL.infer_shape)(&Attributes::new(), &[&a, &b]),
            Ok(vec![vec![Dim::Dynamic, Dim::Static(2)]])
        );
    }

    #[test]
    fn test_matmul_rank_one_rejected() {
        let a = TensorDesc::with_static(DataType::F32, &[16]);
        let b = TensorDesc::with_static(DataType::F32, &[16, 2]);
        assert!((MATMUL.infer_shape)(&Attributes::new(), &[&a, &b]).is_err());
    }
}
