//! Graph intermediate representation.

pub mod builder;
pub mod graph;
pub mod layout;
pub mod op;
pub mod shape;
pub mod tensor;

pub use builder::GraphBuilder;
pub use graph::{Edge, EdgeId, EdgeKind, Graph, Node, NodeId};
pub use layout::Layout;
pub use op::{AttrValue, Attributes, OpType};
pub use shape::Dim;
pub use tensor::{DataType, TensorDesc};
