//! External text interfaces (§6): a read/write textual IR format and a
//! write-only graph-visualizer dump format.

pub mod dump;
pub mod text;

pub use dump::dump_graph;
pub use text::{read_graph, write_graph, ReadOutcome};
