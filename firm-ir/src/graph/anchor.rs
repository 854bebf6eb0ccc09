//! Graph-global roots.
//!
//! §9's open question notes that libfirm intermixes traversal roots with
//! value definitions in a single `Anchor` node. This implementation
//! takes the spec's offered alternative: "a separate `roots` record
//! instead, with equivalent semantics." `Anchors` is that record.

use super::node::NodeId;

/// The distinguished, graph-global root nodes every [`super::Graph`]
/// carries (§3, §4.5: "all anchors" is one of the walker kinds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchors {
    /// The `Start` node.
    pub start: NodeId,
    /// `Start`'s block.
    pub start_block: NodeId,
    /// The `End` node.
    pub end: NodeId,
    /// `End`'s block.
    pub end_block: NodeId,
    /// The frame pointer value.
    pub frame: NodeId,
    /// The incoming-arguments tuple.
    pub args: NodeId,
    /// The initial memory value.
    pub initial_mem: NodeId,
    /// The distinguished "no side effect yet" memory sentinel.
    pub no_mem: NodeId,
    /// The distinguished "unreachable/invalid value" sentinel.
    pub bad: NodeId,
    /// The distinguished "not yet known" sentinel.
    pub unknown: NodeId,
}

impl Anchors {
    /// All anchor node ids, for the "walk all anchors" walker kind
    /// (§4.5).
    pub fn all(&self) -> [NodeId; 10] {
        [
            self.start,
            self.start_block,
            self.end,
            self.end_block,
            self.frame,
            self.args,
            self.initial_mem,
            self.no_mem,
            self.bad,
            self.unknown,
        ]
    }
}
