//! Seed scenarios S1-S3 (spec §8): Confirm insertion.

use firm_asm::{EntityRef, ProjAttr};
use firm_types::{Mode, Relation, Signedness, Tarval};
use firm_ir::dominance::compute_dominance;
use firm_ir::graph::{Attr, Builder, Graph, NodeId};
use firm_ir::passes::confirm::{insert_confirms, ConfirmOptions};
use firm_ir::ty::EntityId;

fn word_mode() -> Mode {
    Mode::new_int("Iu32", 32, Signedness::Unsigned, 32).expect("valid int mode")
}

fn new_graph() -> Graph {
    let entity = EntityId::from_ref(EntityRef(0));
    let frame = EntityId::from_ref(EntityRef(1));
    Graph::new(entity, frame)
}

/// Builds `block B` with a sole predecessor the `true`-projection of
/// `Cond(Cmp(x, bound, relation))`, two users of `x` within `B`, and
/// wires `B`'s return into `end_block` so the whole thing is reachable.
/// Returns `(x, cmp, user1, user2)`.
fn build_branch_with_cmp(
    graph: &mut Graph,
    mode: &Mode,
    bound: NodeId,
    relation: Relation,
) -> (NodeId, NodeId, NodeId, NodeId) {
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    let mut b = Builder::new(graph);
    let lhs = b.new_const(start_block, Tarval::from_i128(mode, 7).unwrap());
    let rhs = b.new_const(start_block, Tarval::from_i128(mode, 9).unwrap());
    let x = b.new_add(start_block, lhs, rhs, mode.clone());

    let cmp = b.new_cmp(start_block, x, bound, relation);
    let cond = b.new_cond(start_block, cmp);
    let t_proj = b.new_proj(cond, ProjAttr::COND_TRUE, Mode::control());

    let block_b = b.new_block(&[t_proj]);
    let other = b.new_const(block_b, Tarval::from_i128(mode, 1).unwrap());
    let user1 = b.new_add(block_b, x, other, mode.clone());
    let user2 = b.new_sub(block_b, x, other, mode.clone());
    let ret = b.new_return(block_b, mem0, &[user1, user2]);
    b.add_block_pred(end_block, ret);

    (x, cmp, user1, user2)
}

#[test]
fn s1_const_folding_via_confirm_equality() {
    let mut graph = new_graph();
    let mode = word_mode();
    let start_block = graph.anchors().start_block;
    let five = Builder::new(&mut graph).new_const(start_block, Tarval::from_i128(&mode, 5).unwrap());

    let (x, cmp, user1, user2) = build_branch_with_cmp(&mut graph, &mode, five, Relation::EQUAL);

    compute_dominance(&mut graph).expect("dominance computed");
    insert_confirms(&mut graph, ConfirmOptions::default()).expect("confirm insertion succeeds");

    assert_eq!(graph.input(user1, 0).unwrap(), five, "user1's operand becomes the const 5");
    assert_eq!(graph.input(user2, 0).unwrap(), five, "user2's operand becomes the const 5");
    assert_eq!(graph.node(five).mode(), &mode);

    // `x` itself, and the `Cmp` that produced the refinement, are
    // untouched by the rewrite.
    assert_eq!(graph.input(cmp, 0).unwrap(), x);
    assert_eq!(graph.input(cmp, 1).unwrap(), five);
}

#[test]
fn s2_confirm_from_inequality() {
    let mut graph = new_graph();
    let mode = word_mode();
    let start_block = graph.anchors().start_block;
    let zero = Builder::new(&mut graph).new_const(start_block, Tarval::from_i128(&mode, 0).unwrap());

    let (x, _cmp, user1, user2) = build_branch_with_cmp(&mut graph, &mode, zero, Relation::LESS);

    compute_dominance(&mut graph).expect("dominance computed");
    insert_confirms(&mut graph, ConfirmOptions::default()).expect("confirm insertion succeeds");

    let confirmed = graph.input(user1, 0).unwrap();
    assert_eq!(graph.node(confirmed).op(), firm_asm::Op::Confirm);
    assert_eq!(
        graph.input(user2, 0).unwrap(),
        confirmed,
        "both users share a single Confirm node"
    );

    match graph.node(confirmed).attr() {
        Attr::Confirm(attr) => assert_eq!(attr.relation, Relation::LESS),
        other => panic!("expected a Confirm attribute, got {other:?}"),
    }
    assert_eq!(graph.input(confirmed, 0).unwrap(), x);
    assert_eq!(graph.input(confirmed, 1).unwrap(), zero);
}

#[test]
fn s3_non_null_confirm() {
    let mut graph = new_graph();
    let ref_mode = Mode::new_reference("P", 64);
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;
    let args = graph.anchors().args;

    let mut b = Builder::new(&mut graph);
    let p = b.new_proj(args, 0, ref_mode.clone());
    let load = b.new_load(start_block, mem0, p);
    let load_mem = b.new_proj(load, 0, Mode::memory());
    let q = b.new_const(start_block, Tarval::zero(&ref_mode).unwrap());
    let cmp = b.new_cmp(start_block, p, q, Relation::EQUAL);
    let ret = b.new_return(start_block, load_mem, &[cmp]);
    b.add_block_pred(end_block, ret);

    compute_dominance(&mut graph).expect("dominance computed");
    insert_confirms(
        &mut graph,
        ConfirmOptions {
            null_ptr_elimination: true,
        },
    )
    .expect("confirm insertion succeeds");

    let confirmed = graph.input(cmp, 0).unwrap();
    assert_ne!(confirmed, p, "the Cmp's pointer input was replaced");
    assert_eq!(graph.node(confirmed).op(), firm_asm::Op::Confirm);
    assert_eq!(graph.input(confirmed, 0).unwrap(), p);

    match graph.node(confirmed).attr() {
        Attr::Confirm(attr) => assert_eq!(attr.relation, Relation::LESS_GREATER),
        other => panic!("expected a Confirm attribute, got {other:?}"),
    }
}
