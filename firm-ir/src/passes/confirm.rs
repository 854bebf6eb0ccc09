//! Confirm insertion (§4.8): rewrites uses of a branch's tested value,
//! within the region dominated by the branch's taken edge, to values
//! that encode the refinement the branch proved.

use firm_asm::{Op, ProjAttr};
use firm_types::{Relation, Tarval};
use tracing::trace;

use crate::error::{Error, Result};
use crate::graph::{Attr, Graph, NodeId, PinState};
use crate::pass::Pass;
use crate::properties::Properties;

/// Options controlling Confirm insertion (§6: `opt_global_null_ptr_elimination`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmOptions {
    /// Enables the null-dereference refinement rule (§4.8, final bullet).
    pub null_ptr_elimination: bool,
}

/// The Confirm insertion pass.
pub struct InsertConfirms {
    options: ConfirmOptions,
}

impl InsertConfirms {
    /// Creates the pass with the given options.
    pub fn new(options: ConfirmOptions) -> Self {
        Self { options }
    }
}

impl Pass for InsertConfirms {
    fn name(&self) -> &'static str {
        "insert_confirms"
    }

    fn required(&self) -> Properties {
        Properties::CONSISTENT_OUT_EDGES
            | Properties::CONSISTENT_DOMINANCE
            | Properties::NO_CRITICAL_EDGES
    }

    fn run(&mut self, graph: &mut Graph) -> Result<()> {
        if graph.pinned_default() != crate::graph::PinState::Pinned {
            return Err(Error::PreconditionViolation {
                pass: self.name(),
                missing: "graph must be pinned on entry".into(),
            });
        }
        insert_confirms(graph, self.options)
    }
}

/// Runs Confirm insertion directly, without going through the pass
/// manager (useful for tests that want precise control over when
/// prerequisite analyses are (re)computed).
pub fn insert_confirms(graph: &mut Graph, options: ConfirmOptions) -> Result<()> {
    let blocks = graph.all_blocks();
    for block in blocks {
        let preds = graph.cfg_preds(block);
        if preds.len() != 1 {
            continue;
        }
        let control = single_control_pred(graph, block);
        let Some(control) = control else { continue };
        if graph.node(control).op() != Op::Proj {
            continue;
        }
        let Some(source) = graph.node(control).input(0) else {
            continue;
        };
        let Attr::Proj(proj) = graph.node(control).attr().clone() else {
            continue;
        };

        match graph.node(source).op() {
            Op::Switch => handle_switch(graph, block, source, proj.num)?,
            Op::Cond => handle_cond(graph, block, source, proj.num)?,
            _ => {}
        }
    }

    if options.null_ptr_elimination {
        handle_null_deref(graph)?;
    }

    Ok(())
}

fn single_control_pred(graph: &Graph, block: NodeId) -> Option<NodeId> {
    graph.node(block).inputs().first().copied()
}

/// Every `(user, pos)` that reads `def` whose use-block is dominated by
/// `region`, excluding cases inside `def`'s own defining block ancestry
/// issues (the dominance check below is sufficient).
fn users_dominated_by(graph: &Graph, def: NodeId, region: NodeId) -> Vec<(NodeId, i32)> {
    let Some(edges) = graph.out_edges() else {
        return Vec::new();
    };
    let Some(dom) = graph.dominance() else {
        return Vec::new();
    };
    edges
        .uses(def)
        .iter()
        .copied()
        .filter(|&(user, pos)| {
            if pos == -1 {
                return false;
            }
            let use_block = if graph.node(user).op() == Op::Phi {
                graph
                    .node(user)
                    .block()
                    .and_then(|b| graph.cfg_preds(b).get(pos as usize).copied())
            } else {
                graph.node(user).block()
            };
            use_block.is_some_and(|b| dom.dominates(region, b))
        })
        .collect()
}

fn handle_switch(graph: &mut Graph, block: NodeId, switch: NodeId, pn: u32) -> Result<()> {
    let Some(table) = graph.switch_table(switch).cloned() else {
        return Ok(());
    };
    let Some(value) = table.singleton_case(pn) else {
        return Ok(());
    };
    let selector = graph.node(switch).input(0).expect("switch always has a selector");
    let mode = graph.node(selector).mode().clone();
    let tv = Tarval::from_i128(&mode, value)?;
    let constant = graph.add_node(
        Op::Const,
        mode,
        Some(block),
        Vec::new(),
        Attr::Const(firm_asm::ConstAttr { value: tv }),
    );
    for (user, pos) in users_dominated_by(graph, selector, block) {
        trace!(?user, pos, "confirm: switch singleton rewrite");
        graph.set_input(user, pos, constant)?;
    }
    Ok(())
}

fn handle_cond(graph: &mut Graph, block: NodeId, cond: NodeId, pn: u32) -> Result<()> {
    let selector = graph
        .node(cond)
        .input(0)
        .expect("Cond always has a boolean selector");
    if graph.node(selector).op() == Op::Cmp {
        handle_cond_comparison(graph, block, cond, selector, pn)
    } else {
        handle_cond_boolean(graph, block, cond, selector, pn)
    }
}

/// The Proj/block pair for `cond`'s other arm (the projection number
/// opposite `pn`, and the block whose sole control predecessor is that
/// projection).
fn sibling_branch_block(graph: &Graph, cond: NodeId, pn: u32) -> Option<NodeId> {
    let other_pn = if pn == ProjAttr::COND_TRUE {
        ProjAttr::COND_FALSE
    } else {
        ProjAttr::COND_TRUE
    };
    let edges = graph.out_edges()?;
    let sibling_proj = edges.uses(cond).iter().copied().find_map(|(user, pos)| {
        if pos != 0 || graph.node(user).op() != Op::Proj {
            return None;
        }
        match graph.node(user).attr() {
            Attr::Proj(p) if p.num == other_pn => Some(user),
            _ => None,
        }
    })?;
    edges.uses(sibling_proj).iter().copied().find_map(|(user, pos)| {
        if pos == -1 && graph.node(user).op() == Op::Block {
            Some(user)
        } else {
            None
        }
    })
}

/// The block a `(user, pos)` use of `value` effectively lives in: the
/// user's own block, except for a `Phi` use, which is attributed to the
/// predecessor block that feeds that operand position.
fn use_block(graph: &Graph, user: NodeId, pos: i32) -> Option<NodeId> {
    if graph.node(user).op() == Op::Phi {
        graph
            .node(user)
            .block()
            .and_then(|b| graph.cfg_preds(b).get(pos as usize).copied())
    } else {
        graph.node(user).block()
    }
}

fn handle_cond_boolean(graph: &mut Graph, block: NodeId, cond: NodeId, selector: NodeId, pn: u32) -> Result<()> {
    let mode = graph.node(selector).mode().clone();
    let value = if pn == ProjAttr::COND_TRUE {
        Tarval::b_true()
    } else {
        Tarval::b_false()
    };
    let constant = graph.add_node(
        Op::Const,
        mode.clone(),
        Some(block),
        Vec::new(),
        Attr::Const(firm_asm::ConstAttr { value }),
    );
    for (user, pos) in users_dominated_by(graph, selector, block) {
        graph.set_input(user, pos, constant)?;
    }

    let Some(sibling_block) = sibling_branch_block(graph, cond, pn) else {
        return Ok(());
    };

    // Merge-point Phi case: a use of `selector` whose own block isn't
    // dominated by `block` (so wasn't rewritten above) may still be
    // reached only through `block` and `sibling_block` -- every
    // predecessor of its block is dominated by one or the other. Such a
    // block gets a Phi selecting the per-predecessor constant.
    let merges: Vec<(NodeId, Vec<NodeId>)> = {
        let Some(edges) = graph.out_edges() else {
            return Ok(());
        };
        let Some(dom) = graph.dominance() else {
            return Ok(());
        };
        let mut use_blocks: Vec<NodeId> = edges
            .uses(selector)
            .iter()
            .copied()
            .filter_map(|(user, pos)| {
                if pos == -1 {
                    return None;
                }
                use_block(graph, user, pos).filter(|&b| b != block && !dom.dominates(block, b))
            })
            .collect();
        use_blocks.sort_unstable();
        use_blocks.dedup();

        use_blocks
            .into_iter()
            .filter_map(|m| {
                let preds = graph.cfg_preds(m);
                let eligible = !preds.is_empty()
                    && preds
                        .iter()
                        .all(|&p| dom.dominates(block, p) || dom.dominates(sibling_block, p));
                eligible.then_some((m, preds))
            })
            .collect()
    };
    if merges.is_empty() {
        return Ok(());
    }

    let sibling_value = if pn == ProjAttr::COND_TRUE {
        Tarval::b_false()
    } else {
        Tarval::b_true()
    };
    let sibling_constant = graph.add_node(
        Op::Const,
        mode.clone(),
        Some(sibling_block),
        Vec::new(),
        Attr::Const(firm_asm::ConstAttr { value: sibling_value }),
    );

    for (merge_block, preds) in merges {
        let inputs: Vec<NodeId> = {
            let dom = graph.dominance().expect("CONSISTENT_DOMINANCE required by this pass");
            preds
                .iter()
                .map(|&p| if dom.dominates(block, p) { constant } else { sibling_constant })
                .collect()
        };
        let phi = graph.add_node(Op::Phi, mode.clone(), Some(merge_block), inputs, Attr::None);

        let rewires: Vec<(NodeId, i32)> = {
            let Some(edges) = graph.out_edges() else {
                continue;
            };
            edges
                .uses(selector)
                .iter()
                .copied()
                .filter(|&(user, pos)| pos != -1 && use_block(graph, user, pos) == Some(merge_block))
                .collect()
        };
        for (user, pos) in rewires {
            graph.set_input(user, pos, phi)?;
        }
    }
    Ok(())
}

fn handle_cond_comparison(graph: &mut Graph, block: NodeId, cond: NodeId, cmp: NodeId, pn: u32) -> Result<()> {
    let Attr::Cmp(cmp_attr) = graph.node(cmp).attr().clone() else {
        return Ok(());
    };
    let mut rel = cmp_attr.relation;
    if pn == ProjAttr::COND_FALSE {
        rel = rel.inverse();
    }

    let mut left = graph.node(cmp).input(0).expect("Cmp has a left operand");
    let mut right = graph.node(cmp).input(1).expect("Cmp has a right operand");

    if graph.node(left).op() == Op::Bad || graph.node(right).op() == Op::Bad {
        return Ok(());
    }
    let left_const = is_const_like(graph, left);
    let right_const = is_const_like(graph, right);
    if left_const && right_const {
        return Ok(());
    }
    if left_const && !right_const {
        std::mem::swap(&mut left, &mut right);
        rel = rel.inverse();
    }

    if rel.is_equality() {
        for (user, pos) in users_dominated_by(graph, left, block) {
            trace!(?user, pos, "confirm: equality rewrite");
            graph.set_input(user, pos, right)?;
        }
        if is_const_like(graph, right) {
            clone_floats_users_into_branch(graph, left, right, cond, block)?;
        }
    } else {
        let confirm_left = graph.add_node(
            Op::Confirm,
            graph.node(left).mode().clone(),
            Some(block),
            vec![left, right],
            Attr::Confirm(firm_asm::ConfirmAttr { relation: rel }),
        );
        for (user, pos) in users_dominated_by(graph, left, block) {
            graph.set_input(user, pos, confirm_left)?;
        }
        if !is_const_like(graph, right) {
            let confirm_right = graph.add_node(
                Op::Confirm,
                graph.node(right).mode().clone(),
                Some(block),
                vec![right, left],
                Attr::Confirm(firm_asm::ConfirmAttr {
                    relation: rel.inverse(),
                }),
            );
            for (user, pos) in users_dominated_by(graph, right, block) {
                graph.set_input(user, pos, confirm_right)?;
            }
        }
    }
    Ok(())
}

fn is_const_like(graph: &Graph, n: NodeId) -> bool {
    matches!(graph.node(n).op(), Op::Const | Op::SymConst)
}

/// §4.8's equality "floats-clone" rule: `right` is a constant, so a user
/// `u` of `left` that floats (its block may move under scheduling) and
/// that currently lives in a block dominating the Cond's own block would,
/// if left where it is, compute the same value both on and off the
/// equality path. Cloning `u` with `right` substituted for `left` into
/// `block` (the equality arm's target) gives later passes a
/// branch-local, already-constant-folded copy, and downstream uses of
/// `u` inside `block`'s dominance region are rewired to that clone.
fn clone_floats_users_into_branch(graph: &mut Graph, left: NodeId, right: NodeId, cond: NodeId, block: NodeId) -> Result<()> {
    let Some(cond_block) = graph.node(cond).block() else {
        return Ok(());
    };

    let candidates: Vec<NodeId> = {
        let Some(edges) = graph.out_edges() else {
            return Ok(());
        };
        let Some(dom) = graph.dominance() else {
            return Ok(());
        };
        edges
            .uses(left)
            .iter()
            .copied()
            .filter_map(|(user, pos)| {
                if pos == -1 || graph.node(user).pin_state() != PinState::Floats {
                    return None;
                }
                let user_block = graph.node(user).block()?;
                dom.dominates(user_block, cond_block).then_some(user)
            })
            .collect()
    };

    for u in candidates {
        let inputs: Vec<NodeId> = graph
            .node(u)
            .inputs()
            .iter()
            .map(|&input| if input == left { right } else { input })
            .collect();
        let clone = graph.add_node(
            graph.node(u).op(),
            graph.node(u).mode().clone(),
            Some(block),
            inputs,
            graph.node(u).attr().clone(),
        );
        graph.node_mut(clone).set_pin_state(PinState::Floats);
        trace!(?u, ?clone, "confirm: floats-clone into equality branch");

        let downstream: Vec<(NodeId, i32)> = {
            let Some(edges) = graph.out_edges() else {
                continue;
            };
            let Some(dom) = graph.dominance() else {
                continue;
            };
            edges
                .uses(u)
                .iter()
                .copied()
                .filter(|&(du, pos)| {
                    pos != -1 && use_block(graph, du, pos).is_some_and(|b| dom.dominates(block, b))
                })
                .collect()
        };
        for (du, pos) in downstream {
            graph.set_input(du, pos, clone)?;
        }
    }
    Ok(())
}

fn handle_null_deref(graph: &mut Graph) -> Result<()> {
    let reachable = graph.reachable_from_end_and_anchors();
    for n in reachable {
        let op = graph.node(n).op();
        if op != Op::Load && op != Op::Store {
            continue;
        }
        // Both `Load` and `Store` carry their pointer as input 1 (input
        // 0 is the incoming memory value).
        let Some(p) = graph.node(n).input(1) else {
            continue;
        };
        if graph.node(p).op() == Op::SymConst {
            continue;
        }
        if let Attr::Confirm(c) = graph.node(p).attr() {
            if c.relation == Relation::LESS_GREATER {
                continue;
            }
        }
        let Some(block) = graph.node(n).block() else {
            continue;
        };
        let mode = graph.node(p).mode().clone();
        let zero = Tarval::zero(&mode)?;
        let null_const = graph.add_node(
            Op::Const,
            mode.clone(),
            Some(block),
            Vec::new(),
            Attr::Const(firm_asm::ConstAttr { value: zero }),
        );
        let Some(edges) = graph.out_edges() else {
            continue;
        };
        let cmp_users: Vec<(NodeId, i32)> = edges
            .uses(p)
            .iter()
            .copied()
            .filter(|&(user, _)| graph.node(user).op() == Op::Cmp)
            .collect();
        let Some(dom) = graph.dominance() else {
            continue;
        };
        let dominated: Vec<(NodeId, i32)> = cmp_users
            .into_iter()
            .filter(|&(user, _)| {
                graph
                    .node(user)
                    .block()
                    .is_some_and(|b| dom.dominates(block, b))
            })
            .collect();
        if dominated.is_empty() {
            continue;
        }
        let confirm = graph.add_node(
            Op::Confirm,
            mode,
            Some(block),
            vec![p, null_const],
            Attr::Confirm(firm_asm::ConfirmAttr {
                relation: Relation::LESS_GREATER,
            }),
        );
        for (user, pos) in dominated {
            graph.set_input(user, pos, confirm)?;
        }
    }
    Ok(())
}

/// Inverse of [`insert_confirms`]: exchanges every `Confirm(v, _, _)`
/// with `v` (§4.8).
pub fn remove_confirms(graph: &mut Graph) {
    let confirms: Vec<NodeId> = graph
        .reachable_from_end_and_anchors()
        .into_iter()
        .filter(|&n| graph.node(n).op() == Op::Confirm)
        .collect();
    for confirm in confirms {
        let value = graph
            .node(confirm)
            .input(0)
            .expect("Confirm always carries the confirmed value as input 0");
        graph.exchange(confirm, value);
    }
}
