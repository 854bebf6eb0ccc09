//! The verifier (§4.7): structural and mode checks, plus the SSA
//! dominance check when dominance is consistent and the graph is
//! pinned.

use firm_asm::Op;
use firm_types::{Mode, ModeSort};

use crate::error::{Error, Result, VerifyFailure};
use crate::graph::{Attr, Graph, NodeId, PinState};
use crate::properties::Properties;
use crate::ty::{Type, TypeTable};

/// How the verifier should behave once it finds a failure.
///
/// Mirrors `fuel_vm::verification`'s sealed `Verifier` strategy: a
/// private `Sealed` supertrait keeps `VerifyStrategy` closed to the two
/// impls this crate defines, the same shape as that module's
/// `Normal`/`AttemptContinue` pair.
mod sealed {
    pub trait Sealed {}
}

/// A verification continuation policy.
pub trait VerifyStrategy: sealed::Sealed {
    /// `true` if verification should stop at the first failure.
    fn abort_on_first(&self) -> bool;
}

/// Abort at the first structural or mode failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normal;
impl sealed::Sealed for Normal {}
impl VerifyStrategy for Normal {
    fn abort_on_first(&self) -> bool {
        true
    }
}

/// Collect every failure before reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct Collect;
impl sealed::Sealed for Collect {}
impl VerifyStrategy for Collect {
    fn abort_on_first(&self) -> bool {
        false
    }
}

fn fail(failures: &mut Vec<VerifyFailure>, node: NodeId, predecessor: Option<NodeId>, cause: impl Into<String>) {
    failures.push(VerifyFailure {
        node,
        predecessor,
        cause: cause.into(),
    });
}

/// Runs the verifier over `graph` with the given continuation
/// strategy, returning `Ok(())` if no failure was found or
/// `Err(Error::VerifyFailed)` otherwise.
///
/// Equivalent to [`verify_with_types`] with no type table, so `Return`
/// results are checked for an internally consistent memory/value shape
/// but not against the function's declared result types.
pub fn verify<S: VerifyStrategy>(graph: &Graph, strategy: S) -> Result<()> {
    verify_with_types(graph, None, strategy)
}

/// Runs the verifier over `graph`, additionally checking that each
/// `Return`'s results match `graph`'s own entity's function type when
/// `types` is given (§4.7: "Return results match the function type's
/// results").
pub fn verify_with_types<S: VerifyStrategy>(graph: &Graph, types: Option<&TypeTable>, strategy: S) -> Result<()> {
    let mut failures = Vec::new();
    let reachable = graph.reachable_from_end_and_anchors();

    for &n in &reachable {
        check_structural(graph, n, &mut failures);
        check_modes(graph, n, &mut failures);
        if let Some(types) = types {
            check_return_type(graph, types, n, &mut failures);
        }
        if strategy.abort_on_first() && !failures.is_empty() {
            return Err(Error::VerifyFailed { failures });
        }
    }

    if graph.properties().contains(Properties::CONSISTENT_DOMINANCE)
        && graph.pinned_default() == PinState::Pinned
    {
        check_ssa_dominance(graph, &reachable, &mut failures);
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::VerifyFailed { failures })
    }
}

/// `true` for the bookkeeping ops exempt from mode-consistency checks
/// (the same set [`check_ssa_dominance`] already treats as "not a real
/// def" for dominance purposes).
fn is_mode_exempt(op: Op) -> bool {
    matches!(op, Op::Bad | Op::NoMem | Op::Unknown)
}

fn check_same_mode(graph: &Graph, n: NodeId, input: NodeId, expected: &Mode, failures: &mut Vec<VerifyFailure>) {
    if is_mode_exempt(graph.node(input).op()) {
        return;
    }
    let actual = graph.node(input).mode();
    if actual != expected {
        fail(
            failures,
            n,
            Some(input),
            format!("input {input} has mode {actual}, expected {expected}"),
        );
    }
}

/// Per-opcode mode-correctness table (§4.7): operand/result mode
/// agreement that isn't already implied by [`check_structural`]'s
/// tuple/control-flow shape checks.
fn check_modes(graph: &Graph, n: NodeId, failures: &mut Vec<VerifyFailure>) {
    let node = graph.node(n);
    let result_mode = node.mode().clone();
    match node.op() {
        Op::Add | Op::Sub | Op::Mul | Op::And | Op::Or | Op::Eor | Op::Rotl => {
            if let (Some(l), Some(r)) = (node.input(0), node.input(1)) {
                check_same_mode(graph, n, l, &result_mode, failures);
                check_same_mode(graph, n, r, &result_mode, failures);
            }
        }
        Op::Shl | Op::Shr | Op::Shrs => {
            // The shift amount is deliberately not checked against the
            // result mode -- it is routinely a different (often
            // narrower) integer mode than the value being shifted.
            if let Some(l) = node.input(0) {
                check_same_mode(graph, n, l, &result_mode, failures);
            }
        }
        Op::Not | Op::Neg => {
            if let Some(v) = node.input(0) {
                check_same_mode(graph, n, v, &result_mode, failures);
            }
        }
        Op::Cmp => {
            if let (Some(l), Some(r)) = (node.input(0), node.input(1)) {
                if !is_mode_exempt(graph.node(l).op())
                    && !is_mode_exempt(graph.node(r).op())
                    && graph.node(l).mode() != graph.node(r).mode()
                {
                    fail(
                        failures,
                        n,
                        Some(r),
                        format!(
                            "Cmp operands have different modes: {} vs {}",
                            graph.node(l).mode(),
                            graph.node(r).mode()
                        ),
                    );
                }
            }
            if result_mode.sort() != ModeSort::Boolean {
                fail(failures, n, None, format!("Cmp result mode {result_mode} is not boolean"));
            }
        }
        Op::Mux => {
            if let Some(c) = node.input(0) {
                if !is_mode_exempt(graph.node(c).op()) && graph.node(c).mode().sort() != ModeSort::Boolean {
                    fail(failures, n, Some(c), "Mux selector is not boolean-moded".to_string());
                }
            }
            if let (Some(t), Some(f)) = (node.input(1), node.input(2)) {
                check_same_mode(graph, n, t, &result_mode, failures);
                check_same_mode(graph, n, f, &result_mode, failures);
            }
        }
        Op::Confirm => {
            if let (Some(v), Some(bound)) = (node.input(0), node.input(1)) {
                check_same_mode(graph, n, v, &result_mode, failures);
                check_same_mode(graph, n, bound, &result_mode, failures);
            }
        }
        Op::Phi => {
            for &input in node.inputs() {
                check_same_mode(graph, n, input, &result_mode, failures);
            }
        }
        Op::Load => {
            if let Some(p) = node.input(1) {
                if !is_mode_exempt(graph.node(p).op()) && graph.node(p).mode().sort() != ModeSort::Reference {
                    fail(failures, n, Some(p), "Load address is not reference-moded".to_string());
                }
            }
        }
        Op::Store => {
            if let Some(p) = node.input(1) {
                if !is_mode_exempt(graph.node(p).op()) && graph.node(p).mode().sort() != ModeSort::Reference {
                    fail(failures, n, Some(p), "Store address is not reference-moded".to_string());
                }
            }
        }
        Op::Return => {
            if let Some(mem) = node.input(0) {
                if !is_mode_exempt(graph.node(mem).op()) && graph.node(mem).mode().sort() != ModeSort::Memory {
                    fail(failures, n, Some(mem), "Return's first input is not memory-moded".to_string());
                }
            }
        }
        _ => {}
    }
}

/// Checks a `Return` node's results against `graph`'s own entity's
/// method type, when that entity resolves to one in `types` (§4.7).
fn check_return_type(graph: &Graph, types: &TypeTable, n: NodeId, failures: &mut Vec<VerifyFailure>) {
    if graph.node(n).op() != Op::Return {
        return;
    }
    let entity = types.entity(graph.entity());
    let Type::Method(method) = types.ty(entity.ty) else {
        return;
    };
    let results = &graph.node(n).inputs()[1..];
    if results.len() != method.results.len() {
        fail(
            failures,
            n,
            None,
            format!(
                "Return has {} result(s), function type declares {}",
                results.len(),
                method.results.len()
            ),
        );
        return;
    }
    for (i, (&r, &ty)) in results.iter().zip(method.results.iter()).enumerate() {
        if is_mode_exempt(graph.node(r).op()) {
            continue;
        }
        let Type::Primitive(expected_mode) = types.ty(ty) else {
            continue;
        };
        let actual_mode = graph.node(r).mode();
        if actual_mode != expected_mode {
            fail(
                failures,
                n,
                Some(r),
                format!("Return result {i} has mode {actual_mode}, function type expects {expected_mode}"),
            );
        }
    }
}

fn check_structural(graph: &Graph, n: NodeId, failures: &mut Vec<VerifyFailure>) {
    let node = graph.node(n);
    match node.op() {
        Op::Block => {
            for &pred in node.inputs() {
                let pred_node = graph.node(pred);
                // A `Cond`/`Switch` branch is itself mode `T`; its
                // control-flow results are the `Proj`s out of it, so a
                // `Proj` predecessor is control-flow iff *its*
                // predecessor is (`is_cfg`'s doc comment: "have a Proj
                // of mode X among their results, or are themselves
                // mode X").
                let producer_op = if pred_node.op() == Op::Proj {
                    pred_node.input(0).map(|p| graph.node(p).op())
                } else {
                    Some(pred_node.op())
                };
                let ok = pred_node.op() == Op::Bad
                    || (pred_node.mode().sort() == ModeSort::Control
                        && producer_op.map(|op| op.is_cfg()).unwrap_or(false));
                if !ok {
                    fail(
                        failures,
                        n,
                        Some(pred),
                        format!("Block predecessor {pred} is not a control-flow op or Bad"),
                    );
                }
            }
        }
        Op::Phi => {
            if let Some(block) = node.block() {
                let block_arity = graph.arity(block);
                if node.arity() != block_arity {
                    fail(
                        failures,
                        n,
                        Some(block),
                        format!(
                            "Phi arity {} does not match block arity {block_arity}",
                            node.arity()
                        ),
                    );
                }
            }
        }
        Op::Proj => {
            if let Some(pred) = node.input(0) {
                let pred_mode_sort = graph.node(pred).mode().sort();
                if pred_mode_sort != ModeSort::Tuple {
                    fail(
                        failures,
                        n,
                        Some(pred),
                        "Proj's predecessor does not have mode T",
                    );
                }
            }
        }
        Op::Switch => {
            if let Attr::Switch(table) = node.attr() {
                for entry in &table.table {
                    if entry.min > entry.max {
                        fail(failures, n, None, format!("switch entry has min > max: {entry:?}"));
                    }
                    if entry.pn >= table.n_outs {
                        fail(
                            failures,
                            n,
                            None,
                            format!("switch entry pn {} >= n_outs {}", entry.pn, table.n_outs),
                        );
                    }
                }
            }
        }
        Op::Cond => {
            if let Some(edges) = graph.out_edges() {
                let mut true_count = 0;
                let mut false_count = 0;
                for &(user, pos) in edges.uses(n) {
                    // Looking for `Proj`s whose sole (position-0) input
                    // is this `Cond`, not nodes pinned to it as a block
                    // (`Cond` is mode `T`, never a `Block`).
                    if pos != 0 {
                        continue;
                    }
                    if let Attr::Proj(p) = graph.node(user).attr() {
                        if p.num == firm_asm::ProjAttr::COND_TRUE {
                            true_count += 1;
                        } else if p.num == firm_asm::ProjAttr::COND_FALSE {
                            false_count += 1;
                        }
                    }
                }
                if true_count != 1 || false_count != 1 {
                    fail(
                        failures,
                        n,
                        None,
                        format!(
                            "Cond must have exactly one true-proj and one false-proj, found {true_count} true, {false_count} false"
                        ),
                    );
                }
            }
        }
        _ => {}
    }
}

/// For every use of a value `v` by a user `u` at input `i`, checks that
/// `def-block(v)` dominates the appropriate use block: for `Phi`, the
/// `i`-th predecessor block; otherwise `u`'s own block.
fn check_ssa_dominance(graph: &Graph, reachable: &[NodeId], failures: &mut Vec<VerifyFailure>) {
    let Some(dom) = graph.dominance() else {
        return;
    };
    for &u in reachable {
        let node = graph.node(u);
        if node.op() == Op::Bad || node.op() == Op::NoMem || node.op() == Op::Unknown {
            continue;
        }
        for (i, &v) in node.inputs().iter().enumerate() {
            let v_node = graph.node(v);
            if matches!(v_node.op(), Op::Bad | Op::NoMem | Op::Unknown) {
                continue;
            }
            let Some(def_block) = v_node.block() else {
                continue;
            };
            let use_block = if node.op() == Op::Phi {
                let Some(block) = node.block() else { continue };
                graph.cfg_preds(block).get(i).copied()
            } else {
                node.block()
            };
            let Some(use_block) = use_block else {
                continue;
            };
            if !dom.dominates(def_block, use_block) {
                fail(
                    failures,
                    u,
                    Some(v),
                    format!("def-block of {v} does not dominate use block of {u} at input {i}"),
                );
            }
        }
    }
}
