//! Unified error handling for graphforge
//!
//! Every stage of the pipeline reports failures through [`ForgeError`]. The
//! variants follow the compilation taxonomy:
//! - Structural errors (cycles, duplicate producers, unresolved graph inputs)
//! - Unsupported operations (no registered engine accepts a node)
//! - Inference errors (a type or shape rule rejects its inputs)
//! - Finalization errors (an engine rejects the finalized parameters)
//! - Instantiation errors (executable-unit construction failed inside an engine)
//!
//! Errors are classified by [`ErrorCategory`] so callers and the orchestrator
//! can log engine defects separately from problems in the user's graph.

use std::fmt;

// Re-export thiserror for convenience
pub use thiserror;

/// Graph-construction and topology violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    /// No topological order exists
    #[error("graph contains a cycle ({remaining} node(s) could not be ordered)")]
    Cycle { remaining: usize },

    /// An edge would get a second producer
    #[error("edge '{edge}' already produced by node '{existing}', cannot be produced by '{node}'")]
    DuplicateProducer {
        edge: String,
        existing: String,
        node: String,
    },

    /// Edge name registered twice
    #[error("edge '{0}' already exists")]
    DuplicateEdge(String),

    /// Node name registered twice
    #[error("node '{0}' already exists")]
    DuplicateNode(String),

    /// Reference to an edge that is not part of the graph
    #[error("unknown edge '{0}'")]
    UnknownEdge(String),

    /// A graph input or constant carries no resolved descriptor
    #[error("graph input '{0}' has no resolved tensor descriptor")]
    UnresolvedGraphInput(String),

    /// A second, different descriptor was written to an edge
    #[error("edge '{edge}' already resolved to {existing}, refusing to overwrite with {inferred}")]
    ConflictingDescriptor {
        edge: String,
        existing: String,
        inferred: String,
    },
}

/// Why a type or shape rule rejected its inputs.
///
/// A dimension that is merely unknown until execution is not an error; it is
/// reported as [`Dim::Dynamic`](crate::ir::Dim::Dynamic) instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InferenceErrorKind {
    #[error("required attribute '{0}' is missing")]
    MissingAttribute(String),

    #[error("attribute '{name}' is invalid: {reason}")]
    InvalidAttribute { name: String, reason: String },

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("input {0} is not resolved")]
    UnresolvedInput(usize),

    #[error("expected {expected} input(s), got {got}")]
    InputArity { expected: String, got: usize },

    #[error("rule produced {got} output(s) but node declares {expected}")]
    OutputArity { expected: usize, got: usize },

    #[error("output {0} has a dynamic dimension but dynamic dimensions are disabled")]
    DynamicNotAllowed(usize),
}

/// Unified error type for graphforge
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    /// Graph topology violation, detected before or during inference
    #[error("structural error: {0}")]
    Structural(#[from] StructuralError),

    /// No registered engine accepts the node
    #[error("unsupported operation: node '{node}' ({op_type}) is not accepted by any registered engine")]
    UnsupportedOperation { node: String, op_type: String },

    /// Type or shape rule rejected its inputs
    #[error("inference failed for node '{node}': {kind}")]
    Inference {
        node: String,
        kind: InferenceErrorKind,
    },

    /// Engine rejected the finalized parameters
    #[error("finalization failed for node '{node}' on engine '{engine}': {reason}")]
    Finalization {
        node: String,
        engine: String,
        reason: String,
    },

    /// Executable-unit construction failed despite a successful capability check
    #[error("kernel instantiation failed for node '{node}' on engine '{engine}': {reason}")]
    Instantiation {
        node: String,
        engine: String,
        reason: String,
    },

    /// Kernel wrapper lifecycle was driven out of order
    #[error("kernel for node '{node}' is {found}, expected {expected}")]
    InvalidKernelState {
        node: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Invalid registry or options
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Internal error (indicates a bug)
    #[error("internal error: {0}")]
    Internal(String),
}

impl ForgeError {
    /// Categorize the error for handling decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            ForgeError::Structural(_)
            | ForgeError::UnsupportedOperation { .. }
            | ForgeError::Inference { .. }
            | ForgeError::Finalization { .. }
            | ForgeError::InvalidConfiguration(_) => ErrorCategory::User,

            ForgeError::Instantiation { .. } => ErrorCategory::Backend,

            ForgeError::InvalidKernelState { .. } | ForgeError::Internal(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Check if this is a user-facing error (graph or configuration problem)
    pub fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::User)
    }

    /// Check if this error points at an engine defect
    pub fn is_backend_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Backend)
    }

    /// Check if this is an internal error (indicates a bug)
    pub fn is_internal_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Internal)
    }

    /// Name of the node the error is attached to, when there is one
    pub fn node_name(&self) -> Option<&str> {
        match self {
            ForgeError::UnsupportedOperation { node, .. }
            | ForgeError::Inference { node, .. }
            | ForgeError::Finalization { node, .. }
            | ForgeError::Instantiation { node, .. }
            | ForgeError::InvalidKernelState { node, .. } => Some(node),
            _ => None,
        }
    }
}

/// Error category for handling decisions
///
/// - User: the graph or the configuration must be fixed
/// - Backend: an engine failed internally after accepting the node
/// - Internal: the pipeline itself misbehaved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    User,
    Backend,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::User => write!(f, "User"),
            ErrorCategory::Backend => write!(f, "Backend"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

/// Result alias used throughout graphforge
pub type ForgeResult<T> = std::result::Result<T, ForgeError>;

/// Create an internal error with context
///
/// # Examples
/// ```ignore
/// return Err(internal_error!("node {} has no assignment", id));
/// ```
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::error::ForgeError::Internal($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ForgeError::Internal(format!($fmt, $($arg)*))
    };
}

/// Create an `InvalidShape` inference error kind
///
/// # Examples
/// ```ignore
/// return Err(invalid_shape!("cannot reshape {} elements into {:?}", n, target));
/// ```
#[macro_export]
macro_rules! invalid_shape {
    ($msg:expr) => {
        $crate::error::InferenceErrorKind::InvalidShape($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::InferenceErrorKind::InvalidShape(format!($fmt, $($arg)*))
    };
}

/// Build an `InvalidAttribute` kind
pub fn invalid_attr(name: &str, reason: impl Into<String>) -> InferenceErrorKind {
    InferenceErrorKind::InvalidAttribute {
        name: name.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            ForgeError::Structural(StructuralError::Cycle { remaining: 2 }).category(),
            ErrorCategory::User
        );
        assert_eq!(
            ForgeError::UnsupportedOperation {
                node: "a".into(),
                op_type: "onnx::Foo".into()
            }
            .category(),
            ErrorCategory::User
        );
        assert_eq!(
            ForgeError::Instantiation {
                node: "a".into(),
                engine: "gpu".into(),
                reason: "out of workspace".into()
            }
            .category(),
            ErrorCategory::Backend
        );
        assert_eq!(
            internal_error!("bad {}", "state").category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_node_name_is_exposed() {
        let err = ForgeError::Inference {
            node: "reshape_0".into(),
            kind: invalid_shape!("cannot split {} by {}", 7, 2),
        };
        assert_eq!(err.node_name(), Some("reshape_0"));
        assert!(err.to_string().contains("cannot split 7 by 2"));

        let err = ForgeError::InvalidConfiguration("no engines".into());
        assert_eq!(err.node_name(), None);
    }

    #[test]
    fn test_structural_from_conversion() {
        let err: ForgeError = StructuralError::UnknownEdge("x".into()).into();
        assert!(err.is_user_error());
        assert!(matches!(
            err,
            ForgeError::Structural(StructuralError::UnknownEdge(_))
        ));
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(format!("{}", ErrorCategory::User), "User");
        assert_eq!(format!("{}", ErrorCategory::Backend), "Backend");
        assert_eq!(format!("{}", ErrorCategory::Internal), "Internal");
    }
}
