//! Optimizable kernel wrapper.
//!
//! An [`OptKernel`] binds one node to one engine and walks a fixed
//! lifecycle:
//!
//! ```text
//! Unbound --init--> Initialized --finalize--> Finalized --create_kernel_impl--> KernelInstantiated
//! ```
//!
//! `infer_type` and `infer_shape` are valid once initialized and may be
//! re-run. Calling anything out of order is an internal error.

pub mod kernel_impl;

pub use kernel_impl::KernelImpl;

use crate::engine::EngineProfile;
use crate::error::{ForgeError, ForgeResult, InferenceErrorKind};
use crate::internal_error;
use crate::ir::{
    graph::{Node, NodeId},
    op::{Attributes, OpType},
    shape::Dim,
    tensor::{DataType, TensorDesc},
};
use crate::ops::OpRules;
use crate::runtime::options::CompileOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelState {
    Unbound,
    Initialized,
    Finalized,
    KernelInstantiated,
}

impl KernelState {
    pub fn name(&self) -> &'static str {
        match self {
            KernelState::Unbound => "unbound",
            KernelState::Initialized => "initialized",
            KernelState::Finalized => "finalized",
            KernelState::KernelInstantiated => "instantiated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptKernel {
    node: NodeId,
    node_name: String,
    op_type: OpType,
    profile: EngineProfile,
    rules: &'static OpRules,
    state: KernelState,
    params: Option<Attributes>,
    output_descs: Vec<TensorDesc>,
}

impl OptKernel {
    pub fn new(node: &Node, profile: EngineProfile, rules: &'static OpRules) -> Self {
        Self {
            node: node.id,
            node_name: node.name.clone(),
            op_type: node.op_type.clone(),
            profile,
            rules,
            state: KernelState::Unbound,
            params: None,
            output_descs: Vec::new(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn state(&self) -> KernelState {
        self.state
    }

    pub fn engine_id(&self) -> &str {
        &self.profile.engine_id
    }

    pub fn op_type(&self) -> &OpType {
        &self.op_type
    }

    pub fn rules(&self) -> &'static OpRules {
        self.rules
    }

    /// Finalized parameters, available after `finalize`
    pub fn params(&self) -> Option<&Attributes> {
        self.params.as_ref()
    }

    pub fn output_descs(&self) -> &[TensorDesc] {
        &self.output_descs
    }

    /// Run the op's structural validation.
    pub fn init(&mut self, node: &Node) -> ForgeResult<()> {
        self.check_node(node)?;
        self.expect_state(&[KernelState::Unbound], "unbound")?;
        (self.rules.validate)(&node.attrs).map_err(|kind| self.inference_error(kind))?;
        self.state = KernelState::Initialized;
        Ok(())
    }

    /// One data type per output.
    pub fn infer_type(&self, node: &Node, inputs: &[&TensorDesc]) -> ForgeResult<Vec<DataType>> {
        self.check_node(node)?;
        self.expect_state(&[KernelState::Initialized, KernelState::Finalized], "initialized")?;
        let types = (self.rules.infer_type)(&node.attrs, inputs)
            .map_err(|kind| self.inference_error(kind))?;
        self.check_arity(node, types.len())?;
        Ok(types)
    }

    /// One dimension list per output; unknown extents are `Dim::Dynamic`.
    pub fn infer_shape(&self, node: &Node, inputs: &[&TensorDesc]) -> ForgeResult<Vec<Vec<Dim>>> {
        self.check_node(node)?;
        self.expect_state(&[KernelState::Initialized, KernelState::Finalized], "initialized")?;
        let shapes = (self.rules.infer_shape)(&node.attrs, inputs)
            .map_err(|kind| self.inference_error(kind))?;
        self.check_arity(node, shapes.len())?;
        Ok(shapes)
    }

    /// Validate the resolved descriptors against the engine limits and fix
    /// the kernel parameters.
    pub fn finalize(
        &mut self,
        node: &Node,
        inputs: &[&TensorDesc],
        outputs: &[&TensorDesc],
        options: &CompileOptions,
    ) -> ForgeResult<()> {
        self.check_node(node)?;
        self.expect_state(&[KernelState::Initialized], "initialized")?;

        for (role, descs) in [("input", inputs), ("output", outputs)] {
            for (i, desc) in descs.iter().enumerate() {
                self.check_desc(role, i, desc, options)?;
            }
        }

        let params = (self.rules.normalize)(&node.attrs, inputs)
            .map_err(|kind| self.finalization_error(kind.to_string()))?;
        self.params = Some(params);
        self.output_descs = outputs.iter().map(|d| (*d).clone()).collect();
        self.state = KernelState::Finalized;
        Ok(())
    }

    /// Build the executable unit. Deterministic; may be called again after
    /// a successful instantiation.
    pub fn create_kernel_impl(&mut self) -> ForgeResult<KernelImpl> {
        self.expect_state(
            &[KernelState::Finalized, KernelState::KernelInstantiated],
            "finalized",
        )?;
        let params = self.params.clone().ok_or_else(|| {
            internal_error!("kernel for '{}' finalized without params", self.node_name)
        })?;

        let mut workspace_bytes: usize = 0;
        for (i, desc) in self.output_descs.iter().enumerate() {
            if desc.size_overflows() {
                return Err(self.instantiation_error(format!(
                    "output {} ({}) is too large to allocate",
                    i, desc
                )));
            }
            let bytes = desc.byte_size().unwrap_or(0);
            workspace_bytes = workspace_bytes.checked_add(bytes).ok_or_else(|| {
                self.instantiation_error("workspace size overflows usize".to_string())
            })?;
        }
        if let Some(limit) = self.profile.constraints.workspace_limit {
            if workspace_bytes > limit {
                return Err(self.instantiation_error(format!(
                    "workspace of {} bytes exceeds the engine limit of {} bytes",
                    workspace_bytes, limit
                )));
            }
        }

        let kernel = KernelImpl {
            engine: self.profile.engine_id.clone(),
            symbol: KernelImpl::symbol_for(&self.profile.engine_id, &self.op_type),
            op_type: self.op_type.clone(),
            params,
            output_descs: self.output_descs.clone(),
            workspace_bytes,
            has_dynamic_shapes: self.output_descs.iter().any(TensorDesc::is_dynamic),
        };
        self.state = KernelState::KernelInstantiated;
        Ok(kernel)
    }

    fn check_desc(
        &self,
        role: &str,
        index: usize,
        desc: &TensorDesc,
        options: &CompileOptions,
    ) -> ForgeResult<()> {
        let constraints = &self.profile.constraints;
        let (Some(dtype), Some(dims)) = (desc.dtype, desc.dims.as_ref()) else {
            return Err(self.finalization_error(format!("{} {} is unresolved", role, index)));
        };
        if !constraints.supported_dtypes.contains(&dtype) {
            return Err(self.finalization_error(format!(
                "{} {} has unsupported data type {}",
                role, index, dtype
            )));
        }
        if dims.len() > constraints.max_rank {
            return Err(self.finalization_error(format!(
                "{} {} has rank {}, engine maximum is {}",
                role,
                index,
                dims.len(),
                constraints.max_rank
            )));
        }
        if desc.is_dynamic() && !(constraints.allow_dynamic_dims && options.allow_dynamic_dims) {
            return Err(self.finalization_error(format!(
                "{} {} has dynamic dimensions ({})",
                role, index, desc
            )));
        }
        if matches!(dims.last(), Some(Dim::Static(_))) && desc.innermost_bytes().is_none() {
            return Err(self.finalization_error(format!(
                "{} {} innermost extent overflows ({})",
                role, index, desc
            )));
        }
        if let (Some(alignment), Some(bytes)) = (constraints.alignment, desc.innermost_bytes()) {
            if alignment > 0 && bytes % alignment != 0 {
                return Err(self.finalization_error(format!(
                    "{} {} innermost extent of {} bytes is not a multiple of {}",
                    role, index, bytes, alignment
                )));
            }
        }
        Ok(())
    }

    fn check_node(&self, node: &Node) -> ForgeResult<()> {
        if node.id != self.node {
            return Err(internal_error!(
                "kernel for '{}' called with node '{}'",
                self.node_name,
                node.name
            ));
        }
        Ok(())
    }

    fn check_arity(&self, node: &Node, produced: usize) -> ForgeResult<()> {
        if produced != node.outputs.len() {
            return Err(self.inference_error(InferenceErrorKind::OutputArity {
                expected: node.outputs.len(),
                got: produced,
            }));
        }
        Ok(())
    }

    fn expect_state(&self, allowed: &[KernelState], expected: &'static str) -> ForgeResult<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(ForgeError::InvalidKernelState {
            node: self.node_name.clone(),
            expected,
            found: self.state.name(),
        })
    }

    fn inference_error(&self, kind: InferenceErrorKind) -> ForgeError {
        ForgeError::Inference {
            node: self.node_name.clone(),
            kind,
        }
    }

    fn finalization_error(&self, reason: String) -> ForgeError {
        ForgeError::Finalization {
            node: self.node_name.clone(),
            engine: self.profile.engine_id.clone(),
            reason,
        }
    }

    fn instantiation_error(&self, reason: String) -> ForgeError {
        ForgeError::Instantiation {
            node: self.node_name.clone(),
            engine: self.profile.engine_id.clone(),
            reason,
        }
    }
}
