//! The IR node kernel (§4.1).

use firm_asm::{
    BuiltinAttr, CallAttr, CmpAttr, ConfirmAttr, ConstAttr, Op, ProjAttr, SwitchAttr, SymConstAttr,
};
use firm_types::Mode;

/// A dense, per-graph node index, usable as an array subscript (§3:
/// "dense index (unique within its graph, usable as an array
/// subscript)").
///
/// Grounded on the small index-newtype idiom used for handles in
/// `other_examples`' miden-ir (`Inst(u32)`), adapted without pulling in
/// `cranelift_entity`: the workspace doesn't otherwise depend on it and
/// the handle surface needed here is small.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// This id's value as a plain array index.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A node's pinned-state (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PinState {
    /// The node's block is fixed. The default pin state for newly
    /// constructed nodes.
    #[default]
    Pinned,
    /// The node may be scheduled into any block dominated by all its
    /// inputs' blocks.
    Floats,
    /// Pinned because it may raise an exception.
    ExcPinned,
    /// Pinned because it participates in memory ordering.
    MemPinned,
}

/// Per-opcode attribute payload (§3: "per-opcode attributes").
#[derive(Debug, Clone, PartialEq)]
pub enum Attr {
    /// No extra attributes.
    None,
    Const(ConstAttr),
    SymConst(SymConstAttr),
    Proj(ProjAttr),
    Cmp(CmpAttr),
    Confirm(ConfirmAttr),
    Switch(SwitchAttr),
    Call(CallAttr),
    Builtin(BuiltinAttr),
}

/// Optional debug-info attached to a node (§3).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DebugInfo {
    /// Source file, if known.
    pub file: Option<String>,
    /// Source line, if known.
    pub line: Option<u32>,
}

/// An IR node (§3).
///
/// The block a node belongs to is input position `-1`; block nodes
/// themselves (`Op::Block`, `Op::Start`'s block, `Op::Anchor`) have no
/// block input and store `block = None`. Data inputs occupy positions
/// `0..arity`.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) op: Op,
    pub(crate) mode: Mode,
    pub(crate) block: Option<NodeId>,
    pub(crate) inputs: Vec<NodeId>,
    pub(crate) attr: Attr,
    pub(crate) visited: u32,
    pub(crate) pin_state: PinState,
    pub(crate) debug: Option<DebugInfo>,
}

impl Node {
    /// This node's opcode.
    pub fn op(&self) -> Op {
        self.op
    }

    /// This node's mode.
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Number of data inputs, excluding the block input (§4.1).
    pub fn arity(&self) -> usize {
        self.inputs.len()
    }

    /// This node's block, if it has one (Block/Anchor/Start's own block
    /// input is `None`).
    pub fn block(&self) -> Option<NodeId> {
        self.block
    }

    /// Data input at position `i`.
    pub fn input(&self, i: usize) -> Option<NodeId> {
        self.inputs.get(i).copied()
    }

    /// All data inputs, in order.
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// This node's per-opcode attribute payload.
    pub fn attr(&self) -> &Attr {
        &self.attr
    }

    /// Mutable access to this node's attribute payload.
    pub fn attr_mut(&mut self) -> &mut Attr {
        &mut self.attr
    }

    /// This node's pinned-state.
    pub fn pin_state(&self) -> PinState {
        self.pin_state
    }

    /// Sets this node's pinned-state.
    pub fn set_pin_state(&mut self, state: PinState) {
        self.pin_state = state;
    }

    /// Debug info, if attached.
    pub fn debug_info(&self) -> Option<&DebugInfo> {
        self.debug.as_ref()
    }

    /// Attaches debug info.
    pub fn set_debug_info(&mut self, info: DebugInfo) {
        self.debug = Some(info);
    }

    pub(crate) fn visited_stamp(&self) -> u32 {
        self.visited
    }
}
