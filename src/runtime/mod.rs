//! Compilation context and output artifact.

pub mod graph_info;
pub mod options;
pub mod resource;

pub use graph_info::{EdgeInfo, NodeBinding, PartitionStats, RuntimeGraphInfo};
pub use options::CompileOptions;
pub use resource::SharedResource;
