//! The verifier (spec §4.7, §8 universal invariants): structural checks
//! and the `Normal`/`Collect` continuation strategies.

use firm_asm::{EntityRef, Op, ProjAttr};
use firm_types::{Mode, Relation, Signedness, Tarval};
use firm_ir::error::Error;
use firm_ir::graph::{Attr, Builder, Graph};
use firm_ir::ty::{CallingConvention, Entity, EntityId, EntityKind, MethodType, Type, TypeTable};
use firm_ir::verify::{verify, verify_with_types, Collect, Normal};

fn word_mode() -> Mode {
    Mode::new_int("Iu32", 32, Signedness::Unsigned, 32).expect("valid int mode")
}

fn byte_mode() -> Mode {
    Mode::new_int("Iu8", 8, Signedness::Unsigned, 8).expect("valid int mode")
}

fn new_graph() -> Graph {
    let entity = EntityId::from_ref(EntityRef(0));
    let frame = EntityId::from_ref(EntityRef(1));
    Graph::new(entity, frame)
}

fn failures_of(result: Result<(), Error>) -> Vec<firm_ir::VerifyFailure> {
    match result {
        Ok(()) => Vec::new(),
        Err(Error::VerifyFailed { failures }) => failures,
        Err(other) => panic!("expected VerifyFailed, got {other:?}"),
    }
}

#[test]
fn a_minimal_graph_passes_both_strategies() {
    let mut graph = new_graph();
    let mode = word_mode();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    let ret = {
        let mut b = Builder::new(&mut graph);
        let c = b.new_const(start_block, Tarval::from_i128(&mode, 1).unwrap());
        b.new_return(start_block, mem0, &[c])
    };
    Builder::new(&mut graph).add_block_pred(end_block, ret);

    assert!(verify(&graph, Normal).is_ok());
    assert!(verify(&graph, Collect).is_ok());
}

#[test]
fn cond_fed_block_is_a_valid_block_predecessor() {
    // A block whose sole predecessor is the true-projection of a Cond
    // must verify cleanly -- this is exactly §8 S1's shape.
    let mut graph = new_graph();
    let mode = word_mode();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    let ret = {
        let mut b = Builder::new(&mut graph);
        let x = b.new_const(start_block, Tarval::from_i128(&mode, 1).unwrap());
        let five = b.new_const(start_block, Tarval::from_i128(&mode, 5).unwrap());
        let cmp = b.new_cmp(start_block, x, five, Relation::EQUAL);
        let cond = b.new_cond(start_block, cmp);
        let t_proj = b.new_proj(cond, ProjAttr::COND_TRUE, Mode::control());
        let f_proj = b.new_proj(cond, ProjAttr::COND_FALSE, Mode::control());
        let block_b = b.new_block(&[t_proj]);
        let dead_block = b.new_block(&[f_proj]);
        let ret_b = b.new_return(block_b, mem0, &[x]);
        let _ = b.new_return(dead_block, mem0, &[x]);
        ret_b
    };
    Builder::new(&mut graph).add_block_pred(end_block, ret);

    assert!(verify(&graph, Collect).is_ok());
}

#[test]
fn phi_arity_mismatch_is_reported() {
    let mut graph = new_graph();
    let mode = word_mode();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    let (block_b, one) = {
        let mut b = Builder::new(&mut graph);
        let jmp1 = b.new_jmp(start_block);
        let jmp2 = b.new_jmp(start_block);
        let block_b = b.new_block(&[jmp1, jmp2]);
        let one = b.new_const(block_b, Tarval::from_i128(&mode, 1).unwrap());
        (block_b, one)
    };
    // Phi pinned to a 2-pred block but given only one input: an arity
    // mismatch.
    let phi = graph.add_node(Op::Phi, mode.clone(), Some(block_b), vec![one], Attr::None);
    let ret = Builder::new(&mut graph).new_return(block_b, mem0, &[phi]);
    Builder::new(&mut graph).add_block_pred(end_block, ret);

    let failures = failures_of(verify(&graph, Collect));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].node, phi);
    assert!(failures[0].cause.contains("arity"));
}

#[test]
fn proj_of_non_tuple_predecessor_is_reported() {
    let mut graph = new_graph();
    let mode = word_mode();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    let (ret, bad_proj) = {
        let mut b = Builder::new(&mut graph);
        let one = b.new_const(start_block, Tarval::from_i128(&mode, 1).unwrap());
        let two = b.new_const(start_block, Tarval::from_i128(&mode, 2).unwrap());
        let add = b.new_add(start_block, one, two, mode.clone());
        // `add` is mode Iu32, not T -- projecting out of it is invalid.
        let bad_proj = b.new_proj(add, 0, mode.clone());
        let ret = b.new_return(start_block, mem0, &[bad_proj]);
        (ret, bad_proj)
    };
    Builder::new(&mut graph).add_block_pred(end_block, ret);

    let failures = failures_of(verify(&graph, Collect));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].node, bad_proj);
    assert!(failures[0].cause.contains("mode T"));
}

#[test]
fn cond_missing_a_projection_is_reported() {
    let mut graph = new_graph();
    let mode = word_mode();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    let (ret, cond) = {
        let mut b = Builder::new(&mut graph);
        let x = b.new_const(start_block, Tarval::from_i128(&mode, 1).unwrap());
        let five = b.new_const(start_block, Tarval::from_i128(&mode, 5).unwrap());
        let cmp = b.new_cmp(start_block, x, five, Relation::EQUAL);
        let cond = b.new_cond(start_block, cmp);
        // Only a true-proj: the false side is never taken.
        let t_proj = b.new_proj(cond, ProjAttr::COND_TRUE, Mode::control());
        let block_b = b.new_block(&[t_proj]);
        let ret = b.new_return(block_b, mem0, &[x]);
        (ret, cond)
    };
    Builder::new(&mut graph).add_block_pred(end_block, ret);
    graph.assure_out_edges();

    let failures = failures_of(verify(&graph, Collect));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].node, cond);
    assert!(failures[0].cause.contains("true-proj"));
}

#[test]
fn normal_strategy_aborts_after_first_failure_collect_gathers_all() {
    let mut graph = new_graph();
    let mode = word_mode();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    // Two independent Phi-arity mismatches, both reachable.
    let (block_a, block_b, one, two) = {
        let mut b = Builder::new(&mut graph);
        let jmp1 = b.new_jmp(start_block);
        let jmp2 = b.new_jmp(start_block);
        let block_a = b.new_block(&[jmp1, jmp2]);
        let jmp3 = b.new_jmp(start_block);
        let jmp4 = b.new_jmp(start_block);
        let block_b = b.new_block(&[jmp3, jmp4]);
        let one = b.new_const(block_a, Tarval::from_i128(&mode, 1).unwrap());
        let two = b.new_const(block_b, Tarval::from_i128(&mode, 1).unwrap());
        (block_a, block_b, one, two)
    };
    let phi_a = graph.add_node(Op::Phi, mode.clone(), Some(block_a), vec![one], Attr::None);
    let phi_b = graph.add_node(Op::Phi, mode.clone(), Some(block_b), vec![two], Attr::None);
    let ret = {
        let mut b = Builder::new(&mut graph);
        let jmp_a = b.new_jmp(block_a);
        let jmp_b = b.new_jmp(block_b);
        let merge = b.new_block(&[jmp_a, jmp_b]);
        let merged = b.new_phi(merge, &[phi_a, phi_b], mode.clone());
        b.new_return(merge, mem0, &[merged])
    };
    Builder::new(&mut graph).add_block_pred(end_block, ret);

    let normal_failures = failures_of(verify(&graph, Normal));
    assert_eq!(normal_failures.len(), 1, "Normal stops at the first failure");

    let collect_failures = failures_of(verify(&graph, Collect));
    assert_eq!(collect_failures.len(), 2, "Collect gathers every failure");
}

#[test]
fn add_with_a_mismatched_operand_mode_is_reported() {
    let mut graph = new_graph();
    let mode = word_mode();
    let narrow = byte_mode();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    let (ret, add) = {
        let mut b = Builder::new(&mut graph);
        let one = b.new_const(start_block, Tarval::from_i128(&mode, 1).unwrap());
        // `two` is mode Iu8, but the Add node below is built as mode Iu32.
        let two = b.new_const(start_block, Tarval::from_i128(&narrow, 2).unwrap());
        let add = b.new_add(start_block, one, two, mode.clone());
        let ret = b.new_return(start_block, mem0, &[add]);
        (ret, add)
    };
    Builder::new(&mut graph).add_block_pred(end_block, ret);

    let failures = failures_of(verify(&graph, Collect));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].node, add);
    assert!(failures[0].cause.contains("mode"));
}

#[test]
fn cmp_with_differently_moded_operands_is_reported() {
    let mut graph = new_graph();
    let mode = word_mode();
    let narrow = byte_mode();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    let (ret, cmp) = {
        let mut b = Builder::new(&mut graph);
        let x = b.new_const(start_block, Tarval::from_i128(&mode, 1).unwrap());
        let y = b.new_const(start_block, Tarval::from_i128(&narrow, 1).unwrap());
        let cmp = b.new_cmp(start_block, x, y, Relation::EQUAL);
        let cond = b.new_cond(start_block, cmp);
        let t_proj = b.new_proj(cond, ProjAttr::COND_TRUE, Mode::control());
        let f_proj = b.new_proj(cond, ProjAttr::COND_FALSE, Mode::control());
        let block_b = b.new_block(&[t_proj]);
        let dead_block = b.new_block(&[f_proj]);
        let ret_b = b.new_return(block_b, mem0, &[x]);
        let _ = b.new_return(dead_block, mem0, &[x]);
        (ret_b, cmp)
    };
    Builder::new(&mut graph).add_block_pred(end_block, ret);

    let failures = failures_of(verify(&graph, Collect));
    assert_eq!(failures.iter().filter(|f| f.node == cmp).count(), 1);
    assert!(failures.iter().any(|f| f.cause.contains("different modes")));
}

#[test]
fn return_result_mode_mismatched_against_the_function_type_is_reported() {
    let mut types = TypeTable::new();
    let word_ty = types.add_type(Type::Primitive(word_mode()));
    let fn_ty = types.add_type(Type::Method(MethodType {
        params: Vec::new(),
        results: vec![word_ty],
        calling_convention: CallingConvention::C,
        variadic: false,
    }));
    let fn_entity = types.add_entity(Entity {
        name: "mismatched_return".into(),
        ty: fn_ty,
        kind: EntityKind::Method { lowered_type: None },
    });
    let frame = EntityId::from_ref(EntityRef(999));
    let mut graph = Graph::new(fn_entity, frame);

    let narrow = byte_mode();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    // The function type declares one Iu32 result, but this Return
    // produces an Iu8 value.
    let ret = {
        let mut b = Builder::new(&mut graph);
        let value = b.new_const(start_block, Tarval::from_i128(&narrow, 1).unwrap());
        b.new_return(start_block, mem0, &[value])
    };
    Builder::new(&mut graph).add_block_pred(end_block, ret);

    assert!(verify(&graph, Collect).is_ok(), "verify() without a type table can't see the mismatch");

    let failures = failures_of(verify_with_types(&graph, Some(&types), Collect));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].node, ret);
    assert!(failures[0].cause.contains("function type expects"));
}

#[test]
fn return_result_arity_mismatched_against_the_function_type_is_reported() {
    let mut types = TypeTable::new();
    let word_ty = types.add_type(Type::Primitive(word_mode()));
    let fn_ty = types.add_type(Type::Method(MethodType {
        params: Vec::new(),
        results: vec![word_ty, word_ty],
        calling_convention: CallingConvention::C,
        variadic: false,
    }));
    let fn_entity = types.add_entity(Entity {
        name: "arity_mismatch".into(),
        ty: fn_ty,
        kind: EntityKind::Method { lowered_type: None },
    });
    let frame = EntityId::from_ref(EntityRef(999));
    let mut graph = Graph::new(fn_entity, frame);

    let mode = word_mode();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    let ret = {
        let mut b = Builder::new(&mut graph);
        let value = b.new_const(start_block, Tarval::from_i128(&mode, 1).unwrap());
        b.new_return(start_block, mem0, &[value])
    };
    Builder::new(&mut graph).add_block_pred(end_block, ret);

    let failures = failures_of(verify_with_types(&graph, Some(&types), Collect));
    assert_eq!(failures.len(), 1);
    assert!(failures[0].cause.contains("result(s)"));
}
