//! Tensor descriptors for the graph IR.

use crate::ir::{
    layout::Layout,
    shape::{format_dims, to_static, Dim},
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    I8,
    U8,
    I32,
    I64,
    F16,
    F32,
    F64,
}

impl DataType {
    pub const ALL: [DataType; 8] = [
        DataType::Bool,
        DataType::I8,
        DataType::U8,
        DataType::I32,
        DataType::I64,
        DataType::F16,
        DataType::F32,
        DataType::F64,
    ];

    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::Bool | DataType::I8 | DataType::U8 => 1,
            DataType::F16 => 2,
            DataType::I32 | DataType::F32 => 4,
            DataType::I64 | DataType::F64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F16 | DataType::F32 | DataType::F64)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::I8 | DataType::U8 | DataType::I32 | DataType::I64
        )
    }

    /// Parse the names used in attribute blocks ("float32", "int64", ...)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "bool" => Some(DataType::Bool),
            "i8" | "int8" => Some(DataType::I8),
            "u8" | "uint8" => Some(DataType::U8),
            "i32" | "int32" => Some(DataType::I32),
            "i64" | "int64" => Some(DataType::I64),
            "f16" | "float16" => Some(DataType::F16),
            "f32" | "float32" | "float" => Some(DataType::F32),
            "f64" | "float64" | "double" => Some(DataType::F64),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Bool => "bool",
            DataType::I8 => "i8",
            DataType::U8 => "u8",
            DataType::I32 => "i32",
            DataType::I64 => "i64",
            DataType::F16 => "f16",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Element type, dimensions and layout of one edge.
///
/// Intermediate edges start with `dtype` and `dims` unset; inference fills
/// them in exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TensorDesc {
    pub dtype: Option<DataType>,
    pub dims: Option<Vec<Dim>>,
    pub layout: Layout,
}

impl TensorDesc {
    pub fn unresolved() -> Self {
        Self::default()
    }

    pub fn new(dtype: DataType, dims: Vec<Dim>) -> Self {
        Self {
            dtype: Some(dtype),
            dims: Some(dims),
            layout: Layout::RowMajor,
        }
    }

    pub fn with_static(dtype: DataType, dims: &[usize]) -> Self {
        Self::new(dtype, dims.iter().copied().map(Dim::Static).collect())
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.dtype.is_some() && self.dims.is_some()
    }

    pub fn rank(&self) -> Option<usize> {
        self.dims.as_ref().map(Vec::len)
    }

    pub fn static_dims(&self) -> Option<Vec<usize>> {
        self.dims.as_deref().and_then(to_static)
    }

    pub fn is_dynamic(&self) -> bool {
        self.dims
            .as_ref()
            .map(|dims| dims.iter().any(Dim::is_dynamic))
            .unwrap_or(false)
    }

    pub fn strides(&self) -> Option<Vec<usize>> {
        self.static_dims().map(|dims| self.layout.strides(&dims))
    }

    /// Buffer size including layout padding. `None` unless fully static,
    /// and also `None` when the size does not fit in `usize`.
    pub fn byte_size(&self) -> Option<usize> {
        let dtype = self.dtype?;
        let dims = self.static_dims()?;
        self.layout
            .storage_elements(&dims)?
            .checked_mul(dtype.size_in_bytes())
    }

    /// Fully static, yet too large for `byte_size` to represent.
    pub fn size_overflows(&self) -> bool {
        self.dtype.is_some() && self.static_dims().is_some() && self.byte_size().is_none()
    }

    /// Byte extent of the innermost dimension, used for alignment checks.
    /// `None` when that extent is dynamic or overflows.
    pub fn innermost_bytes(&self) -> Option<usize> {
        let dtype = self.dtype?;
        match self.dims.as_ref()?.last() {
            Some(Dim::Static(n)) => n.checked_mul(dtype.size_in_bytes()),
            Some(Dim::Dynamic) => None,
            None => Some(dtype.size_in_bytes()),
        }
    }
}

impl fmt::Display for TensorDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dtype {
            Some(dtype) => write!(f, "{}", dtype)?,
            None => write!(f, "<unresolved>")?,
        }
        match &self.dims {
            Some(dims) => write!(f, "{}", format_dims(dims))?,
            None => write!(f, "[..]")?,
        }
        if self.layout != Layout::RowMajor {
            write!(f, " {}", self.layout)?;
        }
        Ok(())
    }
}
