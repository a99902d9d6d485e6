//! Boundary conversion between two engines.
//!
//! Type and shape pass through unchanged; only placement and layout differ.

use super::{first_input_shape, first_input_type, keep_attributes, OpRules, RuleResult};
use crate::error::InferenceErrorKind;
use crate::ir::op::Attributes;

pub const SRC_ENGINE_ATTR: &str = "src_engine";
pub const DST_ENGINE_ATTR: &str = "dst_engine";

pub static CONVERT: OpRules = OpRules {
    name: "Convert",
    validate: convert_validate,
    infer_type: first_input_type,
    infer_shape: first_input_shape,
    normalize: keep_attributes,
};

fn convert_validate(attrs: &Attributes) -> RuleResult<()> {
    for name in [SRC_ENGINE_ATTR, DST_ENGINE_ATTR] {
        if attrs.get_str(name)?.is_none() {
            return Err(InferenceErrorKind::MissingAttribute(name.to_string()));
        }
    }
    Ok(())
}
