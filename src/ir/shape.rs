//! Shape helpers for the graph IR.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One tensor dimension.
///
/// `Dynamic` means the extent is only known at execution time (e.g. the row
/// count of a `NonZero` result). It is a legal inference outcome, unlike an
/// invalid shape which is reported as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dim {
    Static(usize),
    Dynamic,
}

impl Dim {
    pub fn is_static(&self) -> bool {
        matches!(self, Dim::Static(_))
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Dim::Dynamic)
    }

    pub fn as_static(&self) -> Option<usize> {
        match self {
            Dim::Static(n) => Some(*n),
            Dim::Dynamic => None,
        }
    }
}

impl From<usize> for Dim {
    fn from(n: usize) -> Self {
        Dim::Static(n)
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Static(n) => write!(f, "{}", n),
            Dim::Dynamic => write!(f, "?"),
        }
    }
}

/// Build a fully static dimension list.
pub fn static_shape(dims: &[usize]) -> Vec<Dim> {
    dims.iter().copied().map(Dim::Static).collect()
}

/// All extents, or `None` if any dimension is dynamic.
pub fn to_static(dims: &[Dim]) -> Option<Vec<usize>> {
    dims.iter().map(Dim::as_static).collect()
}

pub fn has_dynamic(dims: &[Dim]) -> bool {
    dims.iter().any(Dim::is_dynamic)
}

/// Product of the extents, or `None` if it does not fit in `usize`.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n))
}

/// Map a possibly negative axis into `0..rank`.
pub fn normalize_axis(axis: i64, rank: usize) -> Option<usize> {
    let rank = rank as i64;
    let resolved = if axis < 0 { axis + rank } else { axis };
    if (0..rank).contains(&resolved) {
        Some(resolved as usize)
    } else {
        None
    }
}

pub fn format_dims(dims: &[Dim]) -> String {
    let inner: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
    format!("[{}]", inner.join(", "))
}
