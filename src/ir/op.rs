//! Operation types and attribute blocks.

use crate::error::{invalid_attr, InferenceErrorKind};
use crate::ir::tensor::DataType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Domain of the standard operator set
pub const ONNX_DOMAIN: &str = "onnx";
/// Domain of operations synthesized by the compiler itself
pub const INTERNAL_DOMAIN: &str = "graphforge";

/// `(domain, name)` pair identifying an operation.
///
/// The empty domain and `ai.onnx` are both stored as `onnx`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpType {
    pub domain: String,
    pub name: String,
}

impl OpType {
    pub fn new(domain: &str, name: &str) -> Self {
        let domain = match domain {
            "" | "ai.onnx" => ONNX_DOMAIN,
            other => other,
        };
        Self {
            domain: domain.to_string(),
            name: name.to_string(),
        }
    }

    pub fn onnx(name: &str) -> Self {
        Self::new(ONNX_DOMAIN, name)
    }

    /// The boundary conversion op
    pub fn convert() -> Self {
        Self::new(INTERNAL_DOMAIN, "Convert")
    }

    pub fn is_convert(&self) -> bool {
        self.domain == INTERNAL_DOMAIN && self.name == "Convert"
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.domain, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Int(i64),
    Ints(Vec<i64>),
    Float(f32),
    Floats(Vec<f32>),
    Str(String),
    DataType(DataType),
}

impl AttrValue {
    fn kind(&self) -> &'static str {
        match self {
            AttrValue::Int(_) => "int",
            AttrValue::Ints(_) => "ints",
            AttrValue::Float(_) => "float",
            AttrValue::Floats(_) => "floats",
            AttrValue::Str(_) => "string",
            AttrValue::DataType(_) => "data type",
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> Self {
        AttrValue::Ints(v)
    }
}

impl From<&[i64]> for AttrValue {
    fn from(v: &[i64]) -> Self {
        AttrValue::Ints(v.to_vec())
    }
}

impl From<f32> for AttrValue {
    fn from(v: f32) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<DataType> for AttrValue {
    fn from(v: DataType) -> Self {
        AttrValue::DataType(v)
    }
}

/// Named parameter block of a node.
///
/// Typed getters return `Ok(None)` when the attribute is absent and an
/// `InvalidAttribute` error when it has the wrong kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes(BTreeMap<String, AttrValue>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.0.iter()
    }

    pub fn get_int(&self, name: &str) -> Result<Option<i64>, InferenceErrorKind> {
        match self.0.get(name) {
            None => Ok(None),
            Some(AttrValue::Int(v)) => Ok(Some(*v)),
            Some(other) => Err(wrong_kind(name, "int", other)),
        }
    }

    pub fn get_ints(&self, name: &str) -> Result<Option<&[i64]>, InferenceErrorKind> {
        match self.0.get(name) {
            None => Ok(None),
            Some(AttrValue::Ints(v)) => Ok(Some(v.as_slice())),
            Some(other) => Err(wrong_kind(name, "ints", other)),
        }
    }

    pub fn get_str(&self, name: &str) -> Result<Option<&str>, InferenceErrorKind> {
        match self.0.get(name) {
            None => Ok(None),
            Some(AttrValue::Str(v)) => Ok(Some(v.as_str())),
            Some(other) => Err(wrong_kind(name, "string", other)),
        }
    }

    /// Data types may also be given by name ("float32").
    pub fn get_dtype(&self, name: &str) -> Result<Option<DataType>, InferenceErrorKind> {
        match self.0.get(name) {
            None => Ok(None),
            Some(AttrValue::DataType(v)) => Ok(Some(*v)),
            Some(AttrValue::Str(s)) => DataType::from_name(s)
                .map(Some)
                .ok_or_else(|| invalid_attr(name, format!("unknown data type '{}'", s))),
            Some(other) => Err(wrong_kind(name, "data type", other)),
        }
    }

    pub fn int_or(&self, name: &str, default: i64) -> Result<i64, InferenceErrorKind> {
        Ok(self.get_int(name)?.unwrap_or(default))
    }

    pub fn require_int(&self, name: &str) -> Result<i64, InferenceErrorKind> {
        self.get_int(name)?
            .ok_or_else(|| InferenceErrorKind::MissingAttribute(name.to_string()))
    }

    pub fn require_ints(&self, name: &str) -> Result<&[i64], InferenceErrorKind> {
        self.get_ints(name)?
            .ok_or_else(|| InferenceErrorKind::MissingAttribute(name.to_string()))
    }

    pub fn require_dtype(&self, name: &str) -> Result<DataType, InferenceErrorKind> {
        self.get_dtype(name)?
            .ok_or_else(|| InferenceErrorKind::MissingAttribute(name.to_string()))
    }
}

fn wrong_kind(name: &str, expected: &str, found: &AttrValue) -> InferenceErrorKind {
    invalid_attr(
        name,
        format!("expected {}, found {}", expected, found.kind()),
    )
}
