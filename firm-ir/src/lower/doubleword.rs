//! Double-word lowering (§4.10): eliminates the doubleword integer
//! modes (signed and unsigned modes twice the target word width),
//! producing a graph that only uses word-width integer modes. Runs
//! after optimization, ahead of target-specific instruction selection.

use std::collections::HashMap;

use firm_asm::{Builtin, ConstAttr, Op, ProjAttr};
use firm_types::{Mode, Relation, Signedness, Tarval};
use tracing::trace;

use crate::error::{Error, Result};
use crate::graph::{Attr, Builder, Graph, NodeId};
use crate::properties::Properties;
use crate::ty::{Entity, EntityId, EntityKind, Type, TypeTable};

/// Parameters controlling double-word lowering (§6).
pub struct DoublewordLoweringParams<'a> {
    /// Width, in bits, of the doubleword modes being eliminated. Must
    /// be even; the word width is half this.
    pub doubleword_size: u32,
    /// Target endianness, governing low/high pair ordering.
    pub little_endian: bool,
    /// Supplies (or creates) the emulation intrinsic entity for an
    /// `(op, input_mode, output_mode)` key; called at most once per
    /// distinct key (§6).
    pub intrinsic_factory: &'a mut dyn FnMut(Op, &Mode, &Mode) -> EntityId,
}

fn is_doubleword(mode: &Mode, params: &DoublewordLoweringParams) -> bool {
    mode.is_int() && mode.bits() == params.doubleword_size
}

/// Splits a doubleword mode into its low (always unsigned) and high
/// (original signedness) word-width halves (§3, §4.10).
fn split_modes(dw: &Mode) -> Result<(Mode, Mode)> {
    let high = dw.halved(format!("{dw}_hi"))?;
    let low = Mode::new_int(
        format!("{dw}_lo"),
        high.bits(),
        Signedness::Unsigned,
        high.modulo_shift(),
    )?;
    Ok((low, high))
}

/// Rewrites a method type's doubleword parameters/results into ordered
/// word-width pairs (§4.10, "Method-type rewriting"). The caller
/// records the resulting [`crate::ty::TypeId`] as the entity's
/// `lowered_type`.
pub fn rewrite_method_type(
    types: &mut TypeTable,
    params: &DoublewordLoweringParams,
    method_ty: crate::ty::TypeId,
) -> Result<crate::ty::TypeId> {
    let Type::Method(method) = types.ty(method_ty).clone() else {
        return Err(Error::UnsupportedConstruct {
            reason: "rewrite_method_type called on a non-method type".into(),
        });
    };
    let mut halves = HashMap::new();
    for &t in method.params.iter().chain(method.results.iter()) {
        if let Type::Primitive(m) = types.ty(t).clone() {
            if is_doubleword(&m, params) {
                let (lm, hm) = split_modes(&m)?;
                let low = types.add_type(Type::Primitive(lm));
                let high = types.add_type(Type::Primitive(hm));
                let pair = if params.little_endian { (low, high) } else { (high, low) };
                halves.insert(t, pair);
            }
        }
    }
    let lowered = method.rewrite_doubleword(|t| halves.contains_key(&t), |t| halves[&t]);
    Ok(types.add_type(Type::Method(lowered)))
}

struct Lowering<'g, 'p, 'pp> {
    graph: &'g mut Graph,
    params: &'p mut DoublewordLoweringParams<'pp>,
    types: &'g mut TypeTable,
    rewrites: HashMap<NodeId, (NodeId, NodeId)>,
    phi_fixups: Vec<(NodeId, NodeId, NodeId)>,
    intrinsics: HashMap<(Op, String, String), EntityId>,
    cf_changed: bool,
}

impl<'g, 'p, 'pp> Lowering<'g, 'p, 'pp> {
    fn halves(&self, n: NodeId) -> Option<(NodeId, NodeId)> {
        self.rewrites.get(&n).copied()
    }

    fn intrinsic(&mut self, op: Op, imode: &Mode, omode: &Mode) -> EntityId {
        let key = (op, imode.name().to_string(), omode.name().to_string());
        if let Some(&id) = self.intrinsics.get(&key) {
            return id;
        }
        let id = (self.params.intrinsic_factory)(op, imode, omode);
        self.intrinsics.insert(key, id);
        id
    }

    fn intrinsic_callee(&mut self, entity: EntityId, block: NodeId) -> NodeId {
        let mut b = Builder::new(self.graph);
        b.new_symconst(block, Mode::new_reference("P", 64), entity.as_ref())
    }

    /// Redirects any existing `Proj(producer, 0)` (the memory result of
    /// a tuple-producing node) to `new_mem`, used once `producer`'s
    /// replacement threads memory through differently.
    fn splice_mem_result(&mut self, producer: NodeId, new_mem: NodeId) {
        let Some(edges) = self.graph.out_edges() else {
            return;
        };
        let mem_users: Vec<NodeId> = edges
            .uses(producer)
            .iter()
            .copied()
            .filter(|&(user, _)| matches!(self.graph.node(user).attr(), Attr::Proj(p) if p.num == 0))
            .map(|(user, _)| user)
            .collect();
        for mem_proj in mem_users {
            self.graph.exchange(mem_proj, new_mem);
        }
    }

    fn lower_const(&mut self, n: NodeId, dw: &Mode) -> Result<()> {
        let (low_mode, high_mode) = split_modes(dw)?;
        let Attr::Const(c) = self.graph.node(n).attr().clone() else {
            return Ok(());
        };
        let word_bits = low_mode.bits();
        let raw = c.value.raw_bits().ok_or_else(|| Error::UnsupportedConstruct {
            reason: "doubleword Const without an integer payload".into(),
        })?;
        let low_val = Tarval::from_raw(&low_mode, raw)?;
        let high_val = Tarval::from_raw(&high_mode, raw >> word_bits)?;
        let block = self.graph.node(n).block();
        let low = self.graph.add_node(Op::Const, low_mode, block, Vec::new(), Attr::Const(ConstAttr { value: low_val }));
        let high = self.graph.add_node(Op::Const, high_mode, block, Vec::new(), Attr::Const(ConstAttr { value: high_val }));
        self.rewrites.insert(n, (low, high));
        Ok(())
    }

    fn operand_halves(&mut self, operand: NodeId, dw: &Mode) -> Result<(NodeId, NodeId)> {
        if let Some(pair) = self.halves(operand) {
            return Ok(pair);
        }
        // A doubleword-moded operand not yet visited — most commonly a
        // back-edge into a loop header's Phi. Lower it on demand.
        self.lower_node(operand, Some(dw.clone()))?;
        self.halves(operand).ok_or_else(|| Error::UnsupportedConstruct {
            reason: format!("could not lower doubleword operand {operand}"),
        })
    }

    fn lower_bitwise(&mut self, n: NodeId, op: Op, dw: &Mode) -> Result<()> {
        let left = self.graph.node(n).input(0).expect("binary op has 2 inputs");
        let right = self.graph.node(n).input(1).expect("binary op has 2 inputs");
        let (ll, lh) = self.operand_halves(left, dw)?;
        let (rl, rh) = self.operand_halves(right, dw)?;
        let block = self.graph.node(n).block().expect("pinned node has a block");
        let low_mode = self.graph.node(ll).mode().clone();
        let high_mode = self.graph.node(lh).mode().clone();
        let mut b = Builder::new(self.graph);
        let (low, high) = match op {
            Op::And => (b.new_and(block, ll, rl, low_mode), b.new_and(block, lh, rh, high_mode)),
            Op::Or => (b.new_or(block, ll, rl, low_mode), b.new_or(block, lh, rh, high_mode)),
            Op::Eor => (b.new_eor(block, ll, rl, low_mode), b.new_eor(block, lh, rh, high_mode)),
            _ => unreachable!("lower_bitwise only called for And/Or/Eor"),
        };
        self.rewrites.insert(n, (low, high));
        Ok(())
    }

    fn lower_not(&mut self, n: NodeId, dw: &Mode) -> Result<()> {
        let value = self.graph.node(n).input(0).expect("Not has one input");
        let (vl, vh) = self.operand_halves(value, dw)?;
        let block = self.graph.node(n).block().expect("pinned node has a block");
        let low_mode = self.graph.node(vl).mode().clone();
        let high_mode = self.graph.node(vh).mode().clone();
        let mut b = Builder::new(self.graph);
        let low = b.new_not(block, vl, low_mode);
        let high = b.new_not(block, vh, high_mode);
        self.rewrites.insert(n, (low, high));
        Ok(())
    }

    /// Add/Sub/Mul/Neg: emulated via a call to an intrinsic returning
    /// `(low, high)` as a tuple (§4.10 table). The call's incoming
    /// memory is the graph's initial memory value: these operations
    /// carry no memory edge of their own, and the emulation intrinsics
    /// are assumed pure, so ordering between independently-lowered
    /// arithmetic calls is not otherwise constrained.
    fn lower_arithmetic(&mut self, n: NodeId, op: Op, dw: &Mode) -> Result<()> {
        let operands: Vec<NodeId> = self.graph.node(n).inputs().to_vec();
        let mut expanded = Vec::new();
        for &a in &operands {
            let (lo, hi) = self.operand_halves(a, dw)?;
            expanded.push(lo);
            expanded.push(hi);
        }
        let block = self.graph.node(n).block().expect("pinned node has a block");
        let (low_mode, high_mode) = split_modes(dw)?;
        let entity = self.intrinsic(op, dw, dw);
        let callee = self.intrinsic_callee(entity, block);
        let mem = self.graph.anchors().initial_mem;
        let call = {
            let mut b = Builder::new(self.graph);
            b.new_call(block, mem, callee, &expanded, entity.as_ref())
        };
        let (low, high) = {
            let mut b = Builder::new(self.graph);
            (b.new_proj(call, 1, low_mode), b.new_proj(call, 2, high_mode))
        };
        self.rewrites.insert(n, (low, high));
        Ok(())
    }

    /// `Div`/`Mod` produce mode `T` (memory, value) rather than the
    /// value directly, so they are dispatched from their value `Proj`
    /// like `Load` (§4.10).
    fn lower_div_mod(&mut self, proj: NodeId, producer: NodeId, op: Op, dw: &Mode) -> Result<()> {
        let mem = self.graph.node(producer).input(0).expect("Div/Mod has a memory input");
        let left = self.graph.node(producer).input(1).expect("Div/Mod has a left operand");
        let right = self.graph.node(producer).input(2).expect("Div/Mod has a right operand");
        let (ll, lh) = self.operand_halves(left, dw)?;
        let (rl, rh) = self.operand_halves(right, dw)?;
        let block = self.graph.node(producer).block().expect("pinned node has a block");
        let (low_mode, high_mode) = split_modes(dw)?;
        let entity = self.intrinsic(op, dw, dw);
        let callee = self.intrinsic_callee(entity, block);
        let call = {
            let mut b = Builder::new(self.graph);
            b.new_call(block, mem, callee, &[ll, lh, rl, rh], entity.as_ref())
        };
        let (call_mem, low, high) = {
            let mut b = Builder::new(self.graph);
            (
                b.new_proj(call, 0, Mode::memory()),
                b.new_proj(call, 1, low_mode),
                b.new_proj(call, 2, high_mode),
            )
        };
        self.splice_mem_result(producer, call_mem);
        self.rewrites.insert(proj, (low, high));
        Ok(())
    }

    /// Mux(c, t, f) -> Mux(c, t.low, f.low), Mux(c, t.high, f.high).
    fn lower_mux(&mut self, n: NodeId, dw: &Mode) -> Result<()> {
        let cond = self.graph.node(n).input(0).expect("Mux has a condition");
        let t = self.graph.node(n).input(1).expect("Mux has a true value");
        let f = self.graph.node(n).input(2).expect("Mux has a false value");
        let (tl, th) = self.operand_halves(t, dw)?;
        let (fl, fh) = self.operand_halves(f, dw)?;
        let block = self.graph.node(n).block().expect("pinned node has a block");
        let low_mode = self.graph.node(tl).mode().clone();
        let high_mode = self.graph.node(th).mode().clone();
        let mut b = Builder::new(self.graph);
        let low = b.new_mux(block, cond, tl, fl, low_mode);
        let high = b.new_mux(block, cond, th, fh, high_mode);
        self.rewrites.insert(n, (low, high));
        Ok(())
    }

    /// `Rotl` is rewritten, ahead of lowering, into `Or(Shl(x, a), Shr(x,
    /// size - a))` (§4.10 table), and the resulting pieces are lowered
    /// directly rather than waiting for the main walk to reach them.
    fn lower_rotl(&mut self, n: NodeId, dw: &Mode) -> Result<()> {
        let value = self.graph.node(n).input(0).expect("Rotl has a value operand");
        let amount = self.graph.node(n).input(1).expect("Rotl has a rotate amount");
        let block = self.graph.node(n).block().expect("pinned node has a block");
        let amt_mode = self.graph.node(amount).mode().clone();
        let (shl, shr) = {
            let mut b = Builder::new(self.graph);
            let size = b.new_const(block, Tarval::from_i128(&amt_mode, i128::from(dw.bits()))?);
            let inv_amount = b.new_sub(block, size, amount, amt_mode);
            (
                b.new_shl(block, value, amount, dw.clone()),
                b.new_shr(block, value, inv_amount, dw.clone()),
            )
        };
        self.lower_shift(shl, Op::Shl, dw)?;
        self.lower_shift(shr, Op::Shr, dw)?;
        let or = {
            let mut b = Builder::new(self.graph);
            b.new_or(block, shl, shr, dw.clone())
        };
        self.lower_bitwise(or, Op::Or, dw)?;
        let pair = self.halves(or).expect("lower_bitwise always registers a rewrite");
        self.rewrites.insert(n, pair);
        Ok(())
    }

    /// `Conv` to/from a doubleword mode.
    fn lower_conv(&mut self, n: NodeId) -> Result<()> {
        let source = self.graph.node(n).input(0).expect("Conv has one input");
        let target_mode = self.graph.node(n).mode().clone();
        let source_mode = self.graph.node(source).mode().clone();
        let target_is_dw = is_doubleword(&target_mode, self.params);
        let source_is_dw = is_doubleword(&source_mode, self.params);
        let block = self.graph.node(n).block().expect("pinned node has a block");

        if source_is_dw && !target_is_dw {
            let (low, _high) = self.operand_halves(source, &source_mode)?;
            let low_mode = self.graph.node(low).mode().clone();
            let replacement = if low_mode == target_mode {
                low
            } else {
                let mut b = Builder::new(self.graph);
                b.new_conv(block, low, target_mode)
            };
            self.graph.exchange(n, replacement);
            return Ok(());
        }

        if target_is_dw && !source_is_dw {
            let (low_mode, high_mode) = split_modes(&target_mode)?;
            let mut b = Builder::new(self.graph);
            let low = b.new_conv(block, source, low_mode);
            let high = if source_mode.signedness() == Some(Signedness::Signed) {
                let widened = b.new_conv(block, source, high_mode.clone());
                let shift_amt = b.new_const(block, Tarval::from_i128(&high_mode, i128::from(high_mode.bits() - 1))?);
                b.new_shrs(block, widened, shift_amt, high_mode)
            } else {
                b.new_const(block, Tarval::zero(&high_mode)?)
            };
            self.rewrites.insert(n, (low, high));
            return Ok(());
        }

        Ok(())
    }

    /// `Cmp` against doubleword operands (§4.10 table): equality tests
    /// reduce to an XOR-and-zero-check; ordering relations combine a
    /// high-word comparison with a low-word comparison guarded by
    /// high-word equality.
    fn lower_cmp(&mut self, n: NodeId, dw: &Mode) -> Result<()> {
        let Attr::Cmp(attr) = self.graph.node(n).attr().clone() else {
            return Ok(());
        };
        let left = self.graph.node(n).input(0).expect("Cmp has a left operand");
        let right = self.graph.node(n).input(1).expect("Cmp has a right operand");
        let (ll, lh) = self.operand_halves(left, dw)?;
        let (rl, rh) = self.operand_halves(right, dw)?;
        let block = self.graph.node(n).block().expect("pinned node has a block");
        let low_mode = self.graph.node(ll).mode().clone();
        let high_mode = self.graph.node(lh).mode().clone();

        let replacement = if attr.relation.is_equality() || attr.relation == Relation::LESS_GREATER {
            let mut b = Builder::new(self.graph);
            let xor_lo = b.new_eor(block, ll, rl, low_mode.clone());
            let xor_hi = b.new_eor(block, lh, rh, high_mode.clone());
            let zero_lo = b.new_const(block, Tarval::zero(&low_mode)?);
            let zero_hi = b.new_const(block, Tarval::zero(&high_mode)?);
            let eq_lo = b.new_cmp(block, xor_lo, zero_lo, Relation::EQUAL);
            let eq_hi = b.new_cmp(block, xor_hi, zero_hi, Relation::EQUAL);
            let both_zero = b.new_and(block, eq_lo, eq_hi, Mode::boolean());
            if attr.relation.is_equality() {
                both_zero
            } else {
                b.new_not(block, both_zero, Mode::boolean())
            }
        } else {
            let mut b = Builder::new(self.graph);
            let hi_rel = b.new_cmp(block, lh, rh, attr.relation);
            let hi_eq = b.new_cmp(block, lh, rh, Relation::EQUAL);
            let lo_rel = b.new_cmp(block, ll, rl, attr.relation - Relation::EQUAL);
            let lo_guarded = b.new_and(block, hi_eq, lo_rel, Mode::boolean());
            b.new_or(block, hi_rel, lo_guarded, Mode::boolean())
        };
        self.graph.exchange(n, replacement);
        Ok(())
    }

    /// Reduction builtins decompose into the word-size builtin applied
    /// to both halves, combined per §4.10's table; non-reducible
    /// builtins pass through untouched.
    fn lower_builtin(&mut self, n: NodeId, dw: &Mode) -> Result<()> {
        let Attr::Builtin(attr) = self.graph.node(n).attr().clone() else {
            return Ok(());
        };
        if !attr.kind.is_doubleword_reducible() {
            return Ok(());
        }
        let arg = self.graph.node(n).input(0).expect("reducible builtins take one operand");
        let (lo, hi) = self.operand_halves(arg, dw)?;
        let block = self.graph.node(n).block().expect("pinned node has a block");
        let result_mode = self.graph.node(n).mode().clone();
        let lo_mode = self.graph.node(lo).mode().clone();
        let hi_mode = self.graph.node(hi).mode().clone();
        let word_bits = lo_mode.bits();
        let mut b = Builder::new(self.graph);

        if attr.kind == Builtin::Bswap {
            let swapped_lo = b.new_builtin(block, &[hi], Builtin::Bswap, result_mode.clone());
            let swapped_hi = b.new_builtin(block, &[lo], Builtin::Bswap, result_mode);
            self.rewrites.insert(n, (swapped_lo, swapped_hi));
            return Ok(());
        }

        let replacement = match attr.kind {
            Builtin::Parity => {
                let p_lo = b.new_builtin(block, &[lo], Builtin::Parity, result_mode.clone());
                let p_hi = b.new_builtin(block, &[hi], Builtin::Parity, result_mode.clone());
                b.new_eor(block, p_lo, p_hi, result_mode)
            }
            Builtin::Popcount => {
                let c_lo = b.new_builtin(block, &[lo], Builtin::Popcount, result_mode.clone());
                let c_hi = b.new_builtin(block, &[hi], Builtin::Popcount, result_mode.clone());
                b.new_add(block, c_lo, c_hi, result_mode)
            }
            Builtin::Ffs | Builtin::Ctz => {
                let lo_zero = b.new_const(block, Tarval::zero(&lo_mode)?);
                let low_is_zero = b.new_cmp(block, lo, lo_zero, Relation::EQUAL);
                let word_bits_c = b.new_const(block, Tarval::from_i128(&result_mode, i128::from(word_bits))?);
                let hi_res = b.new_builtin(block, &[hi], attr.kind, result_mode.clone());
                let hi_shifted = b.new_add(block, hi_res, word_bits_c, result_mode.clone());
                let lo_res = b.new_builtin(block, &[lo], attr.kind, result_mode.clone());
                b.new_mux(block, low_is_zero, hi_shifted, lo_res, result_mode)
            }
            Builtin::Clz => {
                let hi_zero = b.new_const(block, Tarval::zero(&hi_mode)?);
                let high_is_zero = b.new_cmp(block, hi, hi_zero, Relation::EQUAL);
                let word_bits_c = b.new_const(block, Tarval::from_i128(&result_mode, i128::from(word_bits))?);
                let lo_res = b.new_builtin(block, &[lo], Builtin::Clz, result_mode.clone());
                let lo_shifted = b.new_add(block, lo_res, word_bits_c, result_mode.clone());
                let hi_res = b.new_builtin(block, &[hi], Builtin::Clz, result_mode.clone());
                b.new_mux(block, high_is_zero, lo_shifted, hi_res, result_mode)
            }
            _ => return Ok(()),
        };
        self.graph.exchange(n, replacement);
        Ok(())
    }

    /// Shift lowering (§4.10): splits the current block into a
    /// two-way diamond over whether the shift amount is smaller than
    /// the word width, since a full-width shift by a doubleword amount
    /// has to move bits across the low/high boundary differently in
    /// each case.
    fn lower_shift(&mut self, n: NodeId, op: Op, dw: &Mode) -> Result<()> {
        if dw.modulo_shift() != dw.bits() {
            return Err(Error::UnsupportedConstruct {
                reason: "shift lowering requires a masked (modulo-shift == width) doubleword mode".into(),
            });
        }
        let left = self.graph.node(n).input(0).expect("shift has a left operand");
        let shamt = self.graph.node(n).input(1).expect("shift has a shift amount");
        let (ll, lh) = self.operand_halves(left, dw)?;
        let pred_block = self.graph.node(n).block().expect("pinned node has a block");
        let (low_mode, high_mode) = split_modes(dw)?;
        let word_bits = low_mode.bits();
        let shamt_mode = self.graph.node(shamt).mode().clone();

        let (cond, half_mask) = {
            let mut b = Builder::new(self.graph);
            let half_mask = b.new_const(pred_block, Tarval::from_i128(&shamt_mode, i128::from(word_bits - 1))?);
            let word_bits_c = b.new_const(pred_block, Tarval::from_i128(&shamt_mode, i128::from(word_bits))?);
            let small_test = b.new_cmp(pred_block, shamt, word_bits_c, Relation::LESS);
            (b.new_cond(pred_block, small_test), half_mask)
        };
        let (small_block, large_block) = {
            let mut b = Builder::new(self.graph);
            let small_proj = b.new_proj(cond, ProjAttr::COND_TRUE, Mode::control());
            let large_proj = b.new_proj(cond, ProjAttr::COND_FALSE, Mode::control());
            (b.new_block(&[small_proj]), b.new_block(&[large_proj]))
        };
        let shamt_small = {
            let mut b = Builder::new(self.graph);
            b.new_and(small_block, shamt, half_mask, shamt_mode.clone())
        };

        let (small_low, small_high, large_low, large_high) = {
            let mut b = Builder::new(self.graph);
            // The carry term in each arm below moves bits between halves
            // using a two-step shift-by-1-then-by-`!shamt_small` (or the
            // reverse order; right-shift composition is associative)
            // instead of a single shift by `word_bits - shamt_small`,
            // since `shamt_small` may be 0 and a single shift by
            // `word_bits` would be masked down to a no-op by the target's
            // shift instruction. Left shift carries low's vacated top
            // bits up into high; right shift (logical or arithmetic)
            // carries high's low bits down into low.
            match op {
                Op::Shl => {
                    let one = b.new_const(small_block, Tarval::one(&shamt_mode)?);
                    let inv_shamt = b.new_not(small_block, shamt_small, shamt_mode.clone());
                    let s_low = b.new_shl(small_block, ll, shamt_small, low_mode.clone());
                    let low_shr1 = b.new_shr(small_block, ll, one, low_mode.clone());
                    let carry = b.new_shr(small_block, low_shr1, inv_shamt, high_mode.clone());
                    let s_high_plain = b.new_shl(small_block, lh, shamt_small, high_mode.clone());
                    let s_high_carried = b.new_or(small_block, s_high_plain, carry, high_mode.clone());
                    let zero_low = b.new_const(large_block, Tarval::zero(&low_mode)?);
                    let l_high = b.new_shl(large_block, ll, shamt_small, high_mode.clone());
                    (s_low, s_high_carried, zero_low, l_high)
                }
                Op::Shr => {
                    let one = b.new_const(small_block, Tarval::one(&shamt_mode)?);
                    let inv_shamt = b.new_not(small_block, shamt_small, shamt_mode.clone());
                    let s_high = b.new_shr(small_block, lh, shamt_small, high_mode.clone());
                    let high_shl1 = b.new_shl(small_block, lh, one, low_mode.clone());
                    let carry = b.new_shl(small_block, high_shl1, inv_shamt, low_mode.clone());
                    let s_low_plain = b.new_shr(small_block, ll, shamt_small, low_mode.clone());
                    let s_low_carried = b.new_or(small_block, s_low_plain, carry, low_mode.clone());
                    let zero_high = b.new_const(large_block, Tarval::zero(&high_mode)?);
                    let l_low = b.new_shr(large_block, lh, shamt_small, low_mode.clone());
                    (s_low_carried, s_high, l_low, zero_high)
                }
                Op::Shrs => {
                    let one = b.new_const(small_block, Tarval::one(&shamt_mode)?);
                    let inv_shamt = b.new_not(small_block, shamt_small, shamt_mode.clone());
                    let s_high = b.new_shrs(small_block, lh, shamt_small, high_mode.clone());
                    let high_shl1 = b.new_shl(small_block, lh, one, low_mode.clone());
                    let carry = b.new_shl(small_block, high_shl1, inv_shamt, low_mode.clone());
                    let s_low_plain = b.new_shr(small_block, ll, shamt_small, low_mode.clone());
                    let s_low_carried = b.new_or(small_block, s_low_plain, carry, low_mode.clone());
                    let sign_fill_amount = b.new_const(large_block, Tarval::from_i128(&shamt_mode, i128::from(word_bits - 1))?);
                    let sign_bits = b.new_shrs(large_block, lh, sign_fill_amount, high_mode.clone());
                    let l_low = b.new_shrs(large_block, lh, shamt_small, low_mode.clone());
                    (s_low_carried, s_high, l_low, sign_bits)
                }
                _ => unreachable!("lower_shift only called for Shl/Shr/Shrs"),
            }
        };

        let merge_block = {
            let mut b = Builder::new(self.graph);
            let small_jmp = b.new_jmp(small_block);
            let large_jmp = b.new_jmp(large_block);
            b.new_block(&[small_jmp, large_jmp])
        };
        let (low_phi, high_phi) = {
            let mut b = Builder::new(self.graph);
            (
                b.new_phi(merge_block, &[small_low, large_low], low_mode),
                b.new_phi(merge_block, &[small_high, large_high], high_mode),
            )
        };

        self.rewrites.insert(n, (low_phi, high_phi));
        self.cf_changed = true;
        Ok(())
    }

    fn lower_phi(&mut self, n: NodeId, dw: &Mode) -> Result<()> {
        let (low_mode, high_mode) = split_modes(dw)?;
        let block = self.graph.node(n).block().expect("Phi has a block");
        let arity = self.graph.arity(n);
        let bad = self.graph.anchors().bad;
        let low = self.graph.add_node(Op::Phi, low_mode.clone(), Some(block), vec![bad; arity], Attr::None);
        let high = self.graph.add_node(Op::Phi, high_mode.clone(), Some(block), vec![bad; arity], Attr::None);
        for i in 0..arity {
            let dummy_lo = self.graph.add_node(Op::Dummy, low_mode.clone(), None, Vec::new(), Attr::None);
            let dummy_hi = self.graph.add_node(Op::Dummy, high_mode.clone(), None, Vec::new(), Attr::None);
            self.graph.set_input(low, i as i32, dummy_lo)?;
            self.graph.set_input(high, i as i32, dummy_hi)?;
        }
        self.rewrites.insert(n, (low, high));
        self.phi_fixups.push((n, low, high));
        Ok(())
    }

    fn resolve_phi_fixups(&mut self) -> Result<()> {
        let fixups = std::mem::take(&mut self.phi_fixups);
        for (old_phi, low_phi, high_phi) in fixups {
            let arity = self.graph.arity(old_phi);
            let dw_mode = self.graph.node(old_phi).mode().clone();
            for i in 0..arity {
                let old_input = self.graph.input(old_phi, i as i32)?;
                let (lo, hi) = self.operand_halves(old_input, &dw_mode)?;
                self.graph.set_input(low_phi, i as i32, lo)?;
                self.graph.set_input(high_phi, i as i32, hi)?;
            }
        }
        Ok(())
    }

    /// `Load p`: a low load at `p` chained after the incoming memory,
    /// then a high load at `p`'s neighboring word chained after the
    /// low load's memory result (§4.10 table).
    fn lower_load(&mut self, proj: NodeId, load: NodeId, dw: &Mode) -> Result<()> {
        let mem = self.graph.node(load).input(0).expect("Load has a memory input");
        let ptr = self.graph.node(load).input(1).expect("Load has a pointer input");
        let block = self.graph.node(load).block().expect("pinned node has a block");
        let (low_mode, high_mode) = split_modes(dw)?;
        let ptr_mode = self.graph.node(ptr).mode().clone();
        let word_bytes = Tarval::from_i128(&ptr_mode, i128::from(low_mode.bits() / 8))?;

        let mut b = Builder::new(self.graph);
        let offset = b.new_const(block, word_bytes);
        let (low_ptr, high_ptr) = if self.params.little_endian {
            (ptr, b.new_add(block, ptr, offset, ptr_mode))
        } else {
            (b.new_add(block, ptr, offset, ptr_mode), ptr)
        };

        let low_load = b.new_load(block, mem, low_ptr);
        let low_mem = b.new_proj(low_load, 0, Mode::memory());
        let low_val = b.new_proj(low_load, 1, low_mode);
        let high_load = b.new_load(block, low_mem, high_ptr);
        let high_mem = b.new_proj(high_load, 0, Mode::memory());
        let high_val = b.new_proj(high_load, 1, high_mode);

        self.splice_mem_result(load, high_mem);
        self.rewrites.insert(proj, (low_val, high_val));
        Ok(())
    }

    fn lower_store(&mut self, n: NodeId, dw: &Mode) -> Result<()> {
        let mem = self.graph.node(n).input(0).expect("Store has a memory input");
        let ptr = self.graph.node(n).input(1).expect("Store has a pointer input");
        let value = self.graph.node(n).input(2).expect("Store has a value input");
        let block = self.graph.node(n).block().expect("pinned node has a block");
        let (low_val, high_val) = self.operand_halves(value, dw)?;
        let (low_mode, _high_mode) = split_modes(dw)?;
        let ptr_mode = self.graph.node(ptr).mode().clone();
        let word_bytes = Tarval::from_i128(&ptr_mode, i128::from(low_mode.bits() / 8))?;

        let mut b = Builder::new(self.graph);
        let offset = b.new_const(block, word_bytes);
        let (low_ptr, high_ptr) = if self.params.little_endian {
            (ptr, b.new_add(block, ptr, offset, ptr_mode))
        } else {
            (b.new_add(block, ptr, offset, ptr_mode), ptr)
        };
        let store_low = b.new_store(block, mem, low_ptr, low_val);
        let store_high = b.new_store(block, store_low, high_ptr, high_val);
        self.graph.exchange(n, store_high);
        Ok(())
    }

    /// Expands the argument positions of a `Call` whose callee's
    /// method type has doubleword parameters. Doubleword *results* are
    /// not renumbered here (see the module-level doc); only the
    /// graph's own `Return` path is expanded by [`lower_doubleword`].
    fn lower_call(&mut self, n: NodeId) -> Result<()> {
        let Attr::Call(attr) = self.graph.node(n).attr().clone() else {
            return Ok(());
        };
        let entity_id = EntityId::from_ref(attr.method_type);
        let ty_id = self.types.entity(entity_id).ty;
        let Type::Method(method) = self.types.ty(ty_id).clone() else {
            return Ok(());
        };
        let has_dw_param = method
            .params
            .iter()
            .any(|&t| matches!(self.types.ty(t), Type::Primitive(m) if is_doubleword(m, self.params)));
        if !has_dw_param {
            return Ok(());
        }

        let mem = self.graph.node(n).input(0).expect("Call has a memory input");
        let callee = self.graph.node(n).input(1).expect("Call has a callee input");
        let args: Vec<NodeId> = self.graph.node(n).inputs()[2..].to_vec();
        let mut expanded = Vec::new();
        for (&arg, &param_ty) in args.iter().zip(method.params.iter()) {
            if let Type::Primitive(m) = self.types.ty(param_ty).clone() {
                if is_doubleword(&m, self.params) {
                    let (lo, hi) = self.operand_halves(arg, &m)?;
                    expanded.push(lo);
                    expanded.push(hi);
                    continue;
                }
            }
            expanded.push(arg);
        }

        let block = self.graph.node(n).block().expect("Call is pinned");
        let lowered_ty = rewrite_method_type(self.types, self.params, ty_id)?;
        let source_entity = self.types.entity(entity_id).clone();
        let lowered_entity = self.types.add_entity(Entity {
            name: format!("{}$lowered", source_entity.name),
            ty: lowered_ty,
            kind: source_entity.kind,
        });
        let replacement = {
            let mut b = Builder::new(self.graph);
            b.new_call(block, mem, callee, &expanded, lowered_entity.as_ref())
        };
        self.graph.exchange(n, replacement);
        Ok(())
    }

    fn lower_node(&mut self, n: NodeId, known_mode: Option<Mode>) -> Result<()> {
        if self.rewrites.contains_key(&n) {
            return Ok(());
        }
        let op = self.graph.node(n).op();
        match op {
            Op::Const => {
                let mode = known_mode.unwrap_or_else(|| self.graph.node(n).mode().clone());
                if is_doubleword(&mode, self.params) {
                    self.lower_const(n, &mode)?;
                }
            }
            Op::And | Op::Or | Op::Eor => self.maybe_lower(n, |s, n, m| s.lower_bitwise(n, op, m))?,
            Op::Not => self.maybe_lower(n, Self::lower_not)?,
            Op::Add | Op::Sub | Op::Mul | Op::Neg => self.maybe_lower(n, |s, n, m| s.lower_arithmetic(n, op, m))?,
            Op::Mux => self.maybe_lower(n, Self::lower_mux)?,
            Op::Rotl => self.maybe_lower(n, Self::lower_rotl)?,
            Op::Conv => self.lower_conv(n)?,
            Op::Cmp => {
                let left = self.graph.node(n).input(0).expect("Cmp has a left operand");
                let left_mode = self.graph.node(left).mode().clone();
                if is_doubleword(&left_mode, self.params) {
                    self.lower_cmp(n, &left_mode)?;
                }
            }
            Op::Builtin => {
                let mode = self.graph.node(n).mode().clone();
                if is_doubleword(&mode, self.params) {
                    self.lower_builtin(n, &mode)?;
                }
            }
            Op::Shl | Op::Shr | Op::Shrs => self.maybe_lower(n, |s, n, m| s.lower_shift(n, op, m))?,
            Op::Phi => self.maybe_lower(n, Self::lower_phi)?,
            Op::Store => {
                let value = self.graph.node(n).input(2).expect("Store has a value input");
                let value_mode = self.graph.node(value).mode().clone();
                if is_doubleword(&value_mode, self.params) {
                    self.lower_store(n, &value_mode)?;
                }
            }
            Op::Call => self.lower_call(n)?,
            Op::Proj => {
                if let Attr::Proj(p) = self.graph.node(n).attr().clone() {
                    if p.num == 1 {
                        if let Some(pred) = self.graph.node(n).input(0) {
                            let pred_op = self.graph.node(pred).op();
                            if pred_op == Op::Load {
                                let mode = self.graph.node(n).mode().clone();
                                if is_doubleword(&mode, self.params) {
                                    self.lower_load(n, pred, &mode)?;
                                }
                            } else if pred_op == Op::Div || pred_op == Op::Mod {
                                let mode = self.graph.node(n).mode().clone();
                                if is_doubleword(&mode, self.params) {
                                    self.lower_div_mod(n, pred, pred_op, &mode)?;
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn maybe_lower(&mut self, n: NodeId, f: impl FnOnce(&mut Self, NodeId, &Mode) -> Result<()>) -> Result<()> {
        let mode = self.graph.node(n).mode().clone();
        if is_doubleword(&mode, self.params) {
            f(self, n, &mode)?;
        }
        Ok(())
    }
}

/// Lowers every doubleword-moded operation in `graph` into pairs of
/// word-width operations (§4.10).
///
/// `types` is consulted for call lowering and updated with `graph`'s
/// own lowered method type, if it has doubleword parameters/results.
pub fn lower_doubleword(graph: &mut Graph, types: &mut TypeTable, params: &mut DoublewordLoweringParams) -> Result<()> {
    let order: Vec<NodeId> = graph.node_ids().collect();
    let mut pass = Lowering {
        graph,
        params,
        types,
        rewrites: HashMap::new(),
        phi_fixups: Vec::new(),
        intrinsics: HashMap::new(),
        cf_changed: false,
    };

    for n in order {
        pass.lower_node(n, None)?;
    }
    pass.resolve_phi_fixups()?;

    // `Return` results that were doubleword are expanded into
    // `(low, high)` pairs, symmetric with method-type rewriting.
    let returns: Vec<NodeId> = pass
        .graph
        .reachable_from_end_and_anchors()
        .into_iter()
        .filter(|&n| pass.graph.node(n).op() == Op::Return)
        .collect();
    for ret in returns {
        let results: Vec<NodeId> = pass.graph.node(ret).inputs()[1..].to_vec();
        let mem = pass.graph.node(ret).input(0).expect("Return has a memory input");
        let mut expanded = vec![mem];
        for r in results {
            if let Some((lo, hi)) = pass.halves(r) {
                expanded.push(lo);
                expanded.push(hi);
            } else {
                expanded.push(r);
            }
        }
        let block = pass.graph.node(ret).block().expect("Return is pinned");
        let new_ret = pass.graph.add_node(Op::Return, Mode::control(), Some(block), expanded, Attr::None);
        pass.graph.exchange(ret, new_ret);
    }

    let entity = pass.graph.entity();
    if matches!(pass.types.entity(entity).kind, EntityKind::Method { .. }) {
        let ty_id = pass.types.entity(entity).ty;
        if matches!(pass.types.ty(ty_id), Type::Method(_)) {
            let lowered = rewrite_method_type(pass.types, pass.params, ty_id)?;
            pass.types.entity_mut(entity).kind = EntityKind::Method { lowered_type: Some(lowered) };
        }
    }

    pass.graph.properties_mut().remove(
        Properties::CONSISTENT_OUT_EDGES
            | Properties::CONSISTENT_DOMINANCE
            | Properties::CONSISTENT_POST_DOMINANCE
            | Properties::CONSISTENT_LOOP_INFO,
    );
    trace!(cf_changed = pass.cf_changed, "double-word lowering complete");
    Ok(())
}
