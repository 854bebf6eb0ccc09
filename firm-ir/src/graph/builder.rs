//! A minimal imperative graph-construction API (§4.1's node kernel
//! contract implies *some* way to build graphs; front-ends are out of
//! scope, but the core's own test suite needs one).
//!
//! Mirrors `fuel_vm`'s `test-helpers`-gated interpreter-construction
//! helpers: this is not a front-end, just the thinnest possible
//! surface over [`Graph::add_node`] that test code and the seed
//! scenarios in this crate's `tests/` build graphs with.

use firm_asm::{
    BuiltinAttr, CallAttr, CmpAttr, ConfirmAttr, ConstAttr, EntityRef, Op, ProjAttr, SwitchAttr,
    SymConstAttr,
};
use firm_types::{Mode, Relation, Tarval};

use super::graph::Graph;
use super::node::{Attr, NodeId};

/// A thin builder over a [`Graph`], tracking no state of its own
/// beyond the graph it borrows — every method takes the block to
/// build into explicitly, since the core supports floating
/// (block-less at construction time, pinned at scheduling time) nodes
/// too.
pub struct Builder<'g> {
    graph: &'g mut Graph,
}

impl<'g> Builder<'g> {
    /// Wraps `graph` for construction.
    pub fn new(graph: &'g mut Graph) -> Self {
        Self { graph }
    }

    /// Unwraps back to the underlying graph.
    pub fn into_inner(self) -> &'g mut Graph {
        self.graph
    }

    /// Creates a new `Block` whose control-flow predecessors are
    /// `preds` (each itself a control-flow-producing node: a `Jmp`, a
    /// `Proj` of `Cond`/`Switch`, or `Start`).
    pub fn new_block(&mut self, preds: &[NodeId]) -> NodeId {
        self.graph
            .add_node(Op::Block, Mode::control(), None, preds.to_vec(), Attr::None)
    }

    /// Appends a predecessor to an existing block (used while building
    /// up a loop header incrementally).
    pub fn add_block_pred(&mut self, block: NodeId, pred: NodeId) {
        let arity = self.graph.arity(block);
        // There is no in-place "append input" primitive in the node
        // kernel (§4.1 only names atomic `set_input` on an existing
        // position), so rebuild via exchange onto a freshly sized
        // block and rewire its users.
        let mut inputs: Vec<NodeId> = (0..arity)
            .map(|i| self.graph.input(block, i as i32).unwrap())
            .collect();
        inputs.push(pred);
        let replacement = self
            .graph
            .add_node(Op::Block, Mode::control(), None, inputs, Attr::None);
        self.graph.exchange(block, replacement);
    }

    /// Unconditional jump out of `block`.
    pub fn new_jmp(&mut self, block: NodeId) -> NodeId {
        self.graph
            .add_node(Op::Jmp, Mode::control(), Some(block), Vec::new(), Attr::None)
    }

    /// A two-way conditional branch over boolean `selector`; the
    /// result is mode `T`, to be split with `new_proj`.
    pub fn new_cond(&mut self, block: NodeId, selector: NodeId) -> NodeId {
        self.graph.add_node(
            Op::Cond,
            Mode::tuple(),
            Some(block),
            vec![selector],
            Attr::None,
        )
    }

    /// A multi-way branch over integer `selector`.
    pub fn new_switch(&mut self, block: NodeId, selector: NodeId, table: SwitchAttr) -> NodeId {
        self.graph.add_node(
            Op::Switch,
            Mode::tuple(),
            Some(block),
            vec![selector],
            Attr::Switch(table),
        )
    }

    /// Extracts projection `num` of `pred` with result mode `mode`.
    pub fn new_proj(&mut self, pred: NodeId, num: u32, mode: Mode) -> NodeId {
        let block = self.graph.node(pred).block();
        self.graph
            .add_node(Op::Proj, mode, block, vec![pred], Attr::Proj(ProjAttr { num }))
    }

    /// A mode-tagged constant.
    pub fn new_const(&mut self, block: NodeId, value: Tarval) -> NodeId {
        let mode = value.mode().expect("constant tarval must carry a mode");
        self.graph.add_node(
            Op::Const,
            mode,
            Some(block),
            Vec::new(),
            Attr::Const(ConstAttr { value }),
        )
    }

    /// The address of an entity.
    pub fn new_symconst(&mut self, block: NodeId, mode: Mode, entity: EntityRef) -> NodeId {
        self.graph.add_node(
            Op::SymConst,
            mode,
            Some(block),
            Vec::new(),
            Attr::SymConst(SymConstAttr { entity }),
        )
    }

    /// A control-flow merge over a loop/branch join; `preds` must be
    /// index-aligned with `block`'s control-flow predecessors.
    pub fn new_phi(&mut self, block: NodeId, preds: &[NodeId], mode: Mode) -> NodeId {
        self.graph
            .add_node(Op::Phi, mode, Some(block), preds.to_vec(), Attr::None)
    }

    fn binop(&mut self, op: Op, block: NodeId, left: NodeId, right: NodeId, mode: Mode) -> NodeId {
        self.graph
            .add_node(op, mode, Some(block), vec![left, right], Attr::None)
    }

    /// `left + right`.
    pub fn new_add(&mut self, block: NodeId, left: NodeId, right: NodeId, mode: Mode) -> NodeId {
        self.binop(Op::Add, block, left, right, mode)
    }
    /// `left - right`.
    pub fn new_sub(&mut self, block: NodeId, left: NodeId, right: NodeId, mode: Mode) -> NodeId {
        self.binop(Op::Sub, block, left, right, mode)
    }
    /// `left * right`.
    pub fn new_mul(&mut self, block: NodeId, left: NodeId, right: NodeId, mode: Mode) -> NodeId {
        self.binop(Op::Mul, block, left, right, mode)
    }
    /// `left & right`.
    pub fn new_and(&mut self, block: NodeId, left: NodeId, right: NodeId, mode: Mode) -> NodeId {
        self.binop(Op::And, block, left, right, mode)
    }
    /// `left | right`.
    pub fn new_or(&mut self, block: NodeId, left: NodeId, right: NodeId, mode: Mode) -> NodeId {
        self.binop(Op::Or, block, left, right, mode)
    }
    /// `left ^ right`.
    pub fn new_eor(&mut self, block: NodeId, left: NodeId, right: NodeId, mode: Mode) -> NodeId {
        self.binop(Op::Eor, block, left, right, mode)
    }
    /// Logical left shift.
    pub fn new_shl(&mut self, block: NodeId, left: NodeId, right: NodeId, mode: Mode) -> NodeId {
        self.binop(Op::Shl, block, left, right, mode)
    }
    /// Logical right shift.
    pub fn new_shr(&mut self, block: NodeId, left: NodeId, right: NodeId, mode: Mode) -> NodeId {
        self.binop(Op::Shr, block, left, right, mode)
    }
    /// Arithmetic (sign-extending) right shift.
    pub fn new_shrs(&mut self, block: NodeId, left: NodeId, right: NodeId, mode: Mode) -> NodeId {
        self.binop(Op::Shrs, block, left, right, mode)
    }
    /// Bitwise rotate-left.
    pub fn new_rotl(&mut self, block: NodeId, left: NodeId, right: NodeId, mode: Mode) -> NodeId {
        self.binop(Op::Rotl, block, left, right, mode)
    }

    /// Integer division of `left` by `right`, chained after `mem`
    /// since division may trap; result is mode `T` (memory, quotient).
    pub fn new_div(&mut self, block: NodeId, mem: NodeId, left: NodeId, right: NodeId) -> NodeId {
        self.graph.add_node(
            Op::Div,
            Mode::tuple(),
            Some(block),
            vec![mem, left, right],
            Attr::None,
        )
    }
    /// Integer remainder of `left` by `right`, chained after `mem`;
    /// result is mode `T` (memory, remainder).
    pub fn new_mod(&mut self, block: NodeId, mem: NodeId, left: NodeId, right: NodeId) -> NodeId {
        self.graph.add_node(
            Op::Mod,
            Mode::tuple(),
            Some(block),
            vec![mem, left, right],
            Attr::None,
        )
    }

    /// Bitwise complement.
    pub fn new_not(&mut self, block: NodeId, value: NodeId, mode: Mode) -> NodeId {
        self.graph
            .add_node(Op::Not, mode, Some(block), vec![value], Attr::None)
    }
    /// Arithmetic negation.
    pub fn new_neg(&mut self, block: NodeId, value: NodeId, mode: Mode) -> NodeId {
        self.graph
            .add_node(Op::Neg, mode, Some(block), vec![value], Attr::None)
    }
    /// Mode conversion.
    pub fn new_conv(&mut self, block: NodeId, value: NodeId, mode: Mode) -> NodeId {
        self.graph
            .add_node(Op::Conv, mode, Some(block), vec![value], Attr::None)
    }

    /// Comparison producing a boolean tagged with `relation`.
    pub fn new_cmp(
        &mut self,
        block: NodeId,
        left: NodeId,
        right: NodeId,
        relation: Relation,
    ) -> NodeId {
        self.graph.add_node(
            Op::Cmp,
            Mode::boolean(),
            Some(block),
            vec![left, right],
            Attr::Cmp(CmpAttr { relation }),
        )
    }

    /// `cond ? t : f`.
    pub fn new_mux(
        &mut self,
        block: NodeId,
        cond: NodeId,
        t: NodeId,
        f: NodeId,
        mode: Mode,
    ) -> NodeId {
        self.graph
            .add_node(Op::Mux, mode, Some(block), vec![cond, t, f], Attr::None)
    }

    /// A dominance-derived refinement of `value` against `bound`
    /// (§4.8).
    pub fn new_confirm(
        &mut self,
        block: NodeId,
        value: NodeId,
        bound: NodeId,
        relation: Relation,
    ) -> NodeId {
        let mode = self.graph.node(value).mode().clone();
        self.graph.add_node(
            Op::Confirm,
            mode,
            Some(block),
            vec![value, bound],
            Attr::Confirm(ConfirmAttr { relation }),
        )
    }

    /// A memory load of `p`, chained after `mem`; result is mode `T`
    /// (memory, value).
    pub fn new_load(&mut self, block: NodeId, mem: NodeId, p: NodeId) -> NodeId {
        self.graph
            .add_node(Op::Load, Mode::tuple(), Some(block), vec![mem, p], Attr::None)
    }

    /// A memory store of `value` to `p`, chained after `mem`; result
    /// is mode `M`.
    pub fn new_store(&mut self, block: NodeId, mem: NodeId, p: NodeId, value: NodeId) -> NodeId {
        self.graph.add_node(
            Op::Store,
            Mode::memory(),
            Some(block),
            vec![mem, p, value],
            Attr::None,
        )
    }

    /// A call to `callee` with `mem` and `args`; result is mode `T`.
    pub fn new_call(
        &mut self,
        block: NodeId,
        mem: NodeId,
        callee: NodeId,
        args: &[NodeId],
        method_type: EntityRef,
    ) -> NodeId {
        let mut inputs = vec![mem, callee];
        inputs.extend_from_slice(args);
        self.graph.add_node(
            Op::Call,
            Mode::tuple(),
            Some(block),
            inputs,
            Attr::Call(CallAttr { method_type }),
        )
    }

    /// A builtin operation.
    pub fn new_builtin(
        &mut self,
        block: NodeId,
        args: &[NodeId],
        kind: firm_asm::Builtin,
        mode: Mode,
    ) -> NodeId {
        self.graph.add_node(
            Op::Builtin,
            mode,
            Some(block),
            args.to_vec(),
            Attr::Builtin(BuiltinAttr { kind }),
        )
    }

    /// A function return.
    pub fn new_return(&mut self, block: NodeId, mem: NodeId, results: &[NodeId]) -> NodeId {
        let mut inputs = vec![mem];
        inputs.extend_from_slice(results);
        self.graph
            .add_node(Op::Return, Mode::control(), Some(block), inputs, Attr::None)
    }
}
