//! The IR graph: nodes, anchors, the out-edge index, and a small
//! construction API.

pub mod anchor;
pub mod builder;
pub mod edges;
mod graph;
pub mod node;

pub use anchor::Anchors;
pub use builder::Builder;
pub use edges::{Edge, OutEdges};
pub use graph::Graph;
pub use node::{Attr, DebugInfo, Node, NodeId, PinState};
