//! Table-driven engine.
//!
//! Capabilities are a list of [`OpCapability`] entries; kernel wrappers use
//! the built-in rules from [`crate::ops`] unless an op has rules bound
//! explicitly with [`TableEngine::with_rules`].

use super::{Engine, EngineConstraints, OpCapability};
use crate::error::{ForgeError, ForgeResult};
use crate::ir::{graph::Node, op::OpType};
use crate::kernel::OptKernel;
use crate::ops::{self, OpRules};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct TableEngine {
    id: String,
    capabilities: Vec<OpCapability>,
    features: BTreeSet<String>,
    constraints: EngineConstraints,
    rules: HashMap<OpType, &'static OpRules>,
}

impl TableEngine {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            capabilities: Vec::new(),
            features: BTreeSet::new(),
            constraints: EngineConstraints::default(),
            rules: HashMap::new(),
        }
    }

    /// Add or replace the entry for `capability.op_type`
    pub fn with_capability(mut self, capability: OpCapability) -> Self {
        self.capabilities.retain(|c| c.op_type != capability.op_type);
        self.capabilities.push(capability);
        self
    }

    /// Bind rules for an op the built-in table does not know (or override it)
    pub fn with_rules(mut self, op_type: OpType, rules: &'static OpRules) -> Self {
        self.rules.insert(op_type, rules);
        self
    }

    pub fn with_constraints(mut self, constraints: EngineConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_feature(mut self, feature: &str) -> Self {
        self.features.insert(feature.to_string());
        self
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    fn enabled(&self, capability: &OpCapability) -> bool {
        capability
            .requires_feature
            .as_deref()
            .map_or(true, |f| self.features.contains(f))
    }

    fn rules_for(&self, op_type: &OpType) -> Option<&'static OpRules> {
        self.rules
            .get(op_type)
            .copied()
            .or_else(|| ops::lookup(op_type))
    }
}

impl Engine for TableEngine {
    fn engine_id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Vec<OpCapability> {
        self.capabilities
            .iter()
            .filter(|c| self.enabled(c))
            .cloned()
            .collect()
    }

    fn op_capability(&self, op_type: &OpType) -> Option<OpCapability> {
        self.capabilities
            .iter()
            .find(|c| &c.op_type == op_type && self.enabled(c))
            .cloned()
    }

    fn constraints(&self) -> &EngineConstraints {
        &self.constraints
    }

    fn create_opt_kernel(&self, node: &Node) -> ForgeResult<OptKernel> {
        let instantiation = |reason: String| ForgeError::Instantiation {
            node: node.name.clone(),
            engine: self.id.clone(),
            reason,
        };
        if self.op_capability(&node.op_type).is_none() {
            return Err(instantiation(format!(
                "{} is not in the capability table",
                node.op_type
            )));
        }
        let rules = self
            .rules_for(&node.op_type)
            .ok_or_else(|| instantiation(format!("no rules bound for {}", node.op_type)))?;
        Ok(OptKernel::new(node, self.profile(), rules))
    }
}
