//! Shape manipulation: `Reshape`, `Unsqueeze`, `Transpose`, `Flatten`,
//! `Concat` and `Shape`.

use super::{
    dims_of, dtype_of, expect_inputs, first_input_type, keep_attributes, no_validation,
    same_type, OpRules, RuleResult,
};
use crate::error::invalid_attr;
use crate::invalid_shape;
use crate::ir::{
    op::Attributes,
    shape::{element_count, format_dims, normalize_axis, to_static, Dim},
    tensor::{DataType, TensorDesc},
};
use std::collections::BTreeSet;

pub static RESHAPE: OpRules = OpRules {
    name: "Reshape",
    validate: reshape_validate,
    infer_type: first_input_type,
    infer_shape: reshape_shape,
    normalize: keep_attributes,
};

pub static UNSQUEEZE: OpRules = OpRules {
    name: "Unsqueeze",
    validate: unsqueeze_validate,
    infer_type: first_input_type,
    infer_shape: unsqueeze_shape,
    normalize: unsqueeze_normalize,
};

pub static TRANSPOSE: OpRules = OpRules {
    name: "Transpose",
    validate: no_validation,
    infer_type: first_input_type,
    infer_shape: transpose_shape,
    normalize: transpose_normalize,
};

pub static FLATTEN: OpRules = OpRules {
    name: "Flatten",
    validate: no_validation,
    infer_type: first_input_type,
    infer_shape: flatten_shape,
    normalize: flatten_normalize,
};

pub static CONCAT: OpRules = OpRules {
    name: "Concat",
    validate: concat_validate,
    infer_type: concat_type,
    infer_shape: concat_shape,
    normalize: concat_normalize,
};

pub static SHAPE: OpRules = OpRules {
    name: "Shape",
    validate: no_validation,
    infer_type: shape_type,
    infer_shape: shape_shape,
    normalize: keep_attributes,
};

// Reshape

fn reshape_validate(attrs: &Attributes) -> RuleResult<()> {
    let target = attrs.require_ints("shape")?;
    if target.iter().any(|d| *d < -1) {
        return Err(invalid_attr("shape", format!("negative extent in {:?}", target)));
    }
    if target.iter().filter(|d| **d == -1).count() > 1 {
        return Err(invalid_attr("shape", "at most one extent may be -1"));
    }
    Ok(())
}

/// `0` copies the input extent at the same position, `-1` is inferred from
/// the remaining element count.
fn reshape_shape(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<Vec<Dim>>> {
    // a second input carries the shape tensor, already folded into the attribute
    expect_inputs(inputs, 1, 2)?;
    let source = dims_of(inputs, 0)?;
    let target = attrs.require_ints("shape")?;

    let mut out = Vec::with_capacity(target.len());
    for (i, extent) in target.iter().enumerate() {
        let dim = match *extent {
            0 => *source.get(i).ok_or_else(|| {
                invalid_shape!(
                    "shape[{}] = 0 copies a dimension the input (rank {}) lacks",
                    i,
                    source.len()
                )
            })?,
            -1 => Dim::Dynamic,
            n if n > 0 => Dim::Static(n as usize),
            n => return Err(invalid_attr("shape", format!("negative extent {}", n))),
        };
        out.push(dim);
    }

    let Some(source_dims) = to_static(source) else {
        // element count unknown: -1 stays dynamic
        return Ok(vec![out]);
    };
    let total = element_count(&source_dims).ok_or_else(|| {
        invalid_shape!("element count of {} overflows", format_dims(source))
    })?;
    let wildcard = target.iter().position(|d| *d == -1);
    let known_dims: Vec<usize> = out.iter().filter_map(Dim::as_static).collect();
    let known = element_count(&known_dims)
        .ok_or_else(|| invalid_shape!("element count of target {:?} overflows", target))?;

    match wildcard {
        Some(pos) => {
            if known == 0 || total % known != 0 {
                return Err(invalid_shape!(
                    "cannot reshape {} ({} elements) into {:?}",
                    format_dims(source),
                    total,
                    target
                ));
            }
            out[pos] = Dim::Static(total / known);
        }
        None => {
            if out.iter().any(Dim::is_dynamic) {
                // a copied dynamic extent leaves the count unverifiable
                return Ok(vec![out]);
            }
            if known != total {
                return Err(invalid_shape!(
                    "cannot reshape {} ({} elements) into {:?} ({} elements)",
                    format_dims(source),
                    total,
                    target,
                    known
                ));
            }
        }
    }
    Ok(vec![out])
}

// Unsqueeze

fn unsqueeze_validate(attrs: &Attributes) -> RuleResult<()> {
    let axes = attrs.require_ints("axes")?;
    if axes.is_empty() {
        return Err(invalid_attr("axes", "must not be empty"));
    }
    Ok(())
}

fn unsqueeze_axes(attrs: &Attributes, rank: usize) -> RuleResult<Vec<usize>> {
    let axes = attrs.require_ints("axes")?;
    let out_rank = rank + axes.len();
    let mut normalized = BTreeSet::new();
    for axis in axes {
        let resolved = normalize_axis(*axis, out_rank).ok_or_else(|| {
            invalid_shape!("axis {} out of range for output rank {}", axis, out_rank)
        })?;
        if !normalized.insert(resolved) {
            return Err(invalid_attr("axes", format!("axis {} repeated", axis)));
        }
    }
    Ok(normalized.into_iter().collect())
}

fn unsqueeze_shape(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<Vec<Dim>>> {
    expect_inputs(inputs, 1, 2)?;
    let source = dims_of(inputs, 0)?;
    let axes = unsqueeze_axes(attrs, source.len())?;

    let mut remaining = source.iter();
    let out = (0..source.len() + axes.len())
        .map(|i| {
            if axes.contains(&i) {
                Some(Dim::Static(1))
            } else {
                remaining.next().copied()
            }
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| invalid_shape!("axes do not fit input {}", format_dims(source)))?;
    Ok(vec![out])
}

fn unsqueeze_normalize(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Attributes> {
    let axes = unsqueeze_axes(attrs, dims_of(inputs, 0)?.len())?;
    let axes: Vec<i64> = axes.into_iter().map(|a| a as i64).collect();
    Ok(attrs.clone().with("axes", axes))
}

// Transpose

fn transpose_perm(attrs: &Attributes, rank: usize) -> RuleResult<Vec<usize>> {
    let Some(perm) = attrs.get_ints("perm")? else {
        return Ok((0..rank).rev().collect());
    };
    if perm.len() != rank {
        return Err(invalid_shape!("perm {:?} does not match rank {}", perm, rank));
    }
    let mut seen = vec![false; rank];
    let mut out = Vec::with_capacity(rank);
    for p in perm {
        let axis = normalize_axis(*p, rank)
            .ok_or_else(|| invalid_shape!("perm entry {} out of range for rank {}", p, rank))?;
        if std::mem::replace(&mut seen[axis], true) {
            return Err(invalid_attr("perm", format!("{:?} is not a permutation", perm)));
        }
        out.push(axis);
    }
    Ok(out)
}

fn transpose_shape(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<Vec<Dim>>> {
    expect_inputs(inputs, 1, 1)?;
    let source = dims_of(inputs, 0)?;
    let perm = transpose_perm(attrs, source.len())?;
    Ok(vec![perm.iter().map(|p| source[*p]).collect()])
}

fn transpose_normalize(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Attributes> {
    let perm = transpose_perm(attrs, dims_of(inputs, 0)?.len())?;
    let perm: Vec<i64> = perm.into_iter().map(|p| p as i64).collect();
    Ok(attrs.clone().with("perm", perm))
}

// Flatten

/// Axis in `0..=rank`
fn flatten_axis(attrs: &Attributes, rank: usize) -> RuleResult<usize> {
    let axis = attrs.int_or("axis", 1)?;
    let resolved = if axis < 0 { axis + rank as i64 } else { axis };
    if resolved < 0 || resolved > rank as i64 {
        return Err(invalid_shape!("axis {} out of range for rank {}", axis, rank));
    }
    Ok(resolved as usize)
}

fn product(dims: &[Dim]) -> RuleResult<Dim> {
    match to_static(dims) {
        Some(static_dims) => element_count(&static_dims)
            .map(Dim::Static)
            .ok_or_else(|| invalid_shape!("element count of {} overflows", format_dims(dims))),
        None => Ok(Dim::Dynamic),
    }
}

fn flatten_shape(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<Vec<Dim>>> {
    expect_inputs(inputs, 1, 1)?;
    let source = dims_of(inputs, 0)?;
    let axis = flatten_axis(attrs, source.len())?;
    Ok(vec![vec![product(&source[..axis])?, product(&source[axis..])?]])
}

fn flatten_normalize(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Attributes> {
    let axis = flatten_axis(attrs, dims_of(inputs, 0)?.len())?;
    Ok(attrs.clone().with("axis", axis as i64))
}

// Concat

fn concat_validate(attrs: &Attributes) -> RuleResult<()> {
    attrs.require_int("axis").map(|_| ())
}

fn concat_type(_: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<DataType>> {
    expect_inputs(inputs, 1, usize::MAX)?;
    Ok(vec![same_type(inputs)?])
}

fn concat_axis(attrs: &Attributes, rank: usize) -> RuleResult<usize> {
    let axis = attrs.require_int("axis")?;
    normalize_axis(axis, rank)
        .ok_or_else(|| invalid_shape!("axis {} out of range for rank {}", axis, rank))
}

fn concat_shape(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<Vec<Dim>>> {
    expect_inputs(inputs, 1, usize::MAX)?;
    let first = dims_of(inputs, 0)?;
    let axis = concat_axis(attrs, first.len())?;

    let mut out = first.to_vec();
    for i in 1..inputs.len() {
        let dims = dims_of(inputs, i)?;
        if dims.len() != first.len() {
            return Err(invalid_shape!(
                "input {} has rank {}, expected {}",
                i,
                dims.len(),
                first.len()
            ));
        }
        for (d, (acc, dim)) in out.iter_mut().zip(dims).enumerate() {
            *acc = if d == axis {
                match (*acc, *dim) {
                    (Dim::Static(a), Dim::Static(b)) => {
                        Dim::Static(a.checked_add(b).ok_or_else(|| {
                            invalid_shape!("concatenated extent on axis {} overflows", d)
                        })?)
                    }
                    _ => Dim::Dynamic,
                }
            } else {
                match (*acc, *dim) {
                    (Dim::Static(a), Dim::Static(b)) if a != b => {
                        return Err(invalid_shape!(
                            "dimension {} differs: {} vs {}",
                            d,
                            format_dims(first),
                            format_dims(dims)
                        ))
                    }
                    (Dim::Dynamic, other) => other,
                    (known, _) => known,
                }
            };
        }
    }
    Ok(vec![out])
}

fn concat_normalize(attrs: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Attributes> {
    let axis = concat_axis(attrs, dims_of(inputs, 0)?.len())?;
    Ok(attrs.clone().with("axis", axis as i64))
}

// Shape

fn shape_type(_: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<DataType>> {
    expect_inputs(inputs, 1, 1)?;
    dtype_of(inputs, 0)?;
    Ok(vec![DataType::I64])
}

fn shape_shape(_: &Attributes, inputs: &[&TensorDesc]) -> RuleResult<Vec<Vec<Dim>>> {
    expect_inputs(inputs, 1, 1)?;
    Ok(vec![vec![Dim::Static(dims_of(inputs, 0)?.len())]])
}
