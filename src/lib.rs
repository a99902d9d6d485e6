//! graphforge - multi-backend graph partitioning for NN inference
//!
//! Takes a computation graph in intermediate form, assigns every operation
//! to a capable compute engine, propagates data types and shapes in
//! dependency order, inserts conversions where adjacent nodes live on
//! different engines and produces a runtime-ready [`RuntimeGraphInfo`].

#![allow(clippy::should_implement_trait)] // LogLevel/LogFormat::from_str return Option
#![allow(clippy::new_without_default)] // builders read better with explicit new()
#![allow(clippy::len_without_is_empty)]

pub mod engine;
pub mod error;
pub mod ir;
pub mod kernel;
pub mod logging;
pub mod ops;
pub mod partition;
pub mod runtime;

pub use engine::{
    cpu_engine, gpu_engine, BoundaryEngine, Engine, EngineConstraints, OpCapability, TableEngine,
};
pub use error::{ErrorCategory, ForgeError, ForgeResult, InferenceErrorKind, StructuralError};
pub use ir::{
    AttrValue, Attributes, DataType, Dim, EdgeId, EdgeKind, Graph, GraphBuilder, Layout, NodeId,
    OpType, TensorDesc,
};
pub use kernel::{KernelImpl, KernelState, OptKernel};
pub use logging::{init_logging_default, init_logging_from_env, init_with_config, LoggingConfig};
pub use partition::process_graph;
pub use runtime::{CompileOptions, NodeBinding, PartitionStats, RuntimeGraphInfo, SharedResource};
