//! Tensor layout definitions.
//!
//! A layout is a tag; strides are never stored and are derived from the
//! static dimensions on demand.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::shape::element_count;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Layout {
    #[default]
    RowMajor,
    /// Channel dimension (axis 1) stored innermost, as in NHWC
    ChannelsLast,
    /// Axis 1 padded up to a multiple of `block`
    Blocked { block: usize },
}

impl Layout {
    /// Extents as laid out in memory, including block padding. A padded
    /// extent that does not fit in `usize` saturates.
    pub fn padded_dims(&self, dims: &[usize]) -> Vec<usize> {
        self.checked_padded_dims(dims).unwrap_or_else(|| {
            let mut padded = dims.to_vec();
            padded[1] = usize::MAX;
            padded
        })
    }

    fn checked_padded_dims(&self, dims: &[usize]) -> Option<Vec<usize>> {
        match self {
            Layout::Blocked { block } if dims.len() >= 2 && *block > 1 => {
                let mut padded = dims.to_vec();
                padded[1] = dims[1].div_ceil(*block).checked_mul(*block)?;
                Some(padded)
            }
            _ => Some(dims.to_vec()),
        }
    }

    /// Element strides in logical axis order.
    pub fn strides(&self, dims: &[usize]) -> Vec<usize> {
        match self {
            Layout::ChannelsLast if dims.len() >= 3 => {
                // memory order: 0, 2, 3, .., 1
                let mut order: Vec<usize> = Vec::with_capacity(dims.len());
                order.push(0);
                order.extend(2..dims.len());
                order.push(1);

                let mut strides = vec![0; dims.len()];
                let mut stride: usize = 1;
                for &axis in order.iter().rev() {
                    strides[axis] = stride;
                    stride = stride.saturating_mul(dims[axis]);
                }
                strides
            }
            _ => row_major_strides(&self.padded_dims(dims)),
        }
    }

    /// Number of elements the buffer must hold, or `None` on overflow.
    pub fn storage_elements(&self, dims: &[usize]) -> Option<usize> {
        element_count(&self.checked_padded_dims(dims)?)
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::RowMajor => write!(f, "row-major"),
            Layout::ChannelsLast => write!(f, "channels-last"),
            Layout::Blocked { block } => write!(f, "blocked({})", block),
        }
    }
}

pub fn row_major_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = Vec::with_capacity(dims.len());
    let mut stride: usize = 1;
    for dim in dims.iter().rev() {
        strides.push(stride);
        stride = stride.saturating_mul(*dim);
    }
    strides.reverse();
    strides
}
