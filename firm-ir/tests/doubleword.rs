//! Seed scenarios S4-S6 (spec §8): double-word lowering.

use firm_asm::{EntityRef, Op};
use firm_types::{Mode, Signedness, Tarval};
use firm_ir::dominance::compute_dominance;
use firm_ir::graph::{Attr, Builder, Graph, NodeId};
use firm_ir::lower::doubleword::{lower_doubleword, DoublewordLoweringParams};
use firm_ir::ty::{CallingConvention, Entity, EntityId, EntityKind, MethodType, Type, TypeTable};

fn word_mode() -> Mode {
    Mode::new_int("Iu32", 32, Signedness::Unsigned, 32).expect("valid int mode")
}

fn dw_mode() -> Mode {
    Mode::new_int("Iu64", 64, Signedness::Unsigned, 64).expect("valid int mode")
}

/// A graph whose own entity is registered as a zero-arg `Method` in
/// `types`, satisfying `lower_doubleword`'s final method-type rewrite
/// step (it unconditionally looks the entity up).
fn new_graph_with_types() -> (TypeTable, Graph) {
    let mut types = TypeTable::new();
    let fn_ty = types.add_type(Type::Method(MethodType {
        params: Vec::new(),
        results: Vec::new(),
        calling_convention: CallingConvention::C,
        variadic: false,
    }));
    let fn_entity = types.add_entity(Entity {
        name: "test_fn".into(),
        ty: fn_ty,
        kind: EntityKind::Method { lowered_type: None },
    });
    let frame = EntityId::from_ref(EntityRef(999));
    let graph = Graph::new(fn_entity, frame);
    (types, graph)
}

/// A fresh intrinsic-emulation registry, separate from the graph's own
/// `TypeTable` (the two are conceptually distinct tables, and the
/// factory closure cannot alias the `types` argument `lower_doubleword`
/// itself borrows mutably).
fn new_intrinsic_factory() -> (TypeTable, impl FnMut(Op, &Mode, &Mode) -> EntityId) {
    let mut rt_types = TypeTable::new();
    let factory = move |op: Op, imode: &Mode, omode: &Mode| -> EntityId {
        let ty = rt_types.add_type(Type::Method(MethodType {
            params: Vec::new(),
            results: Vec::new(),
            calling_convention: CallingConvention::C,
            variadic: false,
        }));
        rt_types.add_entity(Entity {
            name: format!("rt_{op}_{imode}_{omode}"),
            ty,
            kind: EntityKind::Method { lowered_type: None },
        })
    };
    (TypeTable::new(), factory)
}

fn first_return(graph: &Graph) -> NodeId {
    graph
        .reachable_from_end_and_anchors()
        .into_iter()
        .find(|&n| graph.node(n).op() == Op::Return)
        .expect("lowering leaves exactly one reachable Return")
}

fn const_value(graph: &Graph, n: NodeId) -> i128 {
    match graph.node(n).attr() {
        Attr::Const(c) => c.value.to_i128().expect("fits i128"),
        other => panic!("expected a Const, got {other:?}"),
    }
}

#[test]
fn s4_doubleword_add_little_endian() {
    let (mut types, mut graph) = new_graph_with_types();
    let dw = dw_mode();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    // a = 0x0000_0001_0000_0002 (high=1, low=2)
    // b = 0x0000_0002_0000_0003 (high=2, low=3)
    let a_val: i128 = (1i128 << 32) | 2;
    let b_val: i128 = (2i128 << 32) | 3;

    let (ret, add) = {
        let mut b = Builder::new(&mut graph);
        let a = b.new_const(start_block, Tarval::from_i128(&dw, a_val).unwrap());
        let bb = b.new_const(start_block, Tarval::from_i128(&dw, b_val).unwrap());
        let add = b.new_add(start_block, a, bb, dw.clone());
        let ret = b.new_return(start_block, mem0, &[add]);
        (ret, add)
    };
    Builder::new(&mut graph).add_block_pred(end_block, ret);

    let (_rt_types, mut factory) = new_intrinsic_factory();
    let mut params = DoublewordLoweringParams {
        doubleword_size: 64,
        little_endian: true,
        intrinsic_factory: &mut factory,
    };
    lower_doubleword(&mut graph, &mut types, &mut params).expect("lowering succeeds");

    let new_ret = first_return(&graph);
    let low = graph.input(new_ret, 1).unwrap();
    let high = graph.input(new_ret, 2).unwrap();
    assert_ne!(low, add);

    // Both halves are projections of the same emulation Call. Position
    // 0 is reserved for the call's memory result (the same convention
    // `lower_div_mod`/`lower_load` use), so the value results sit at 1
    // and 2, not 0 and 1.
    assert_eq!(graph.node(low).op(), Op::Proj);
    assert_eq!(graph.node(high).op(), Op::Proj);
    let call = graph.input(low, 0).unwrap();
    assert_eq!(graph.input(high, 0).unwrap(), call);
    assert_eq!(graph.node(call).op(), Op::Call);
    match graph.node(low).attr() {
        Attr::Proj(p) => assert_eq!(p.num, 1),
        other => panic!("expected a Proj attribute, got {other:?}"),
    }
    match graph.node(high).attr() {
        Attr::Proj(p) => assert_eq!(p.num, 2),
        other => panic!("expected a Proj attribute, got {other:?}"),
    }

    // Call inputs are [mem, callee, a.low, a.high, b.low, b.high].
    assert_eq!(graph.arity(call), 6);
    let arg_values: Vec<i128> = (2..6).map(|i| const_value(&graph, graph.input(call, i).unwrap())).collect();
    assert_eq!(arg_values, vec![2, 1, 3, 2], "arguments are [a.low, a.high, b.low, b.high]");
}

#[test]
fn s5_doubleword_shift_left_small_amount() {
    let (mut types, mut graph) = new_graph_with_types();
    let dw = dw_mode();
    let shamt_mode = word_mode();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    // x = 0x0000_0001_0000_0002 (high=1, low=2), shifted left by 5.
    let x_val: i128 = (1i128 << 32) | 2;

    let (ret, shl) = {
        let mut b = Builder::new(&mut graph);
        let x = b.new_const(start_block, Tarval::from_i128(&dw, x_val).unwrap());
        let shamt = b.new_const(start_block, Tarval::from_i128(&shamt_mode, 5).unwrap());
        let shl = b.new_shl(start_block, x, shamt, dw.clone());
        let ret = b.new_return(start_block, mem0, &[shl]);
        (ret, shl)
    };
    Builder::new(&mut graph).add_block_pred(end_block, ret);

    let (_rt_types, mut factory) = new_intrinsic_factory();
    let mut params = DoublewordLoweringParams {
        doubleword_size: 64,
        little_endian: true,
        intrinsic_factory: &mut factory,
    };
    lower_doubleword(&mut graph, &mut types, &mut params).expect("lowering succeeds");

    let new_ret = first_return(&graph);
    let low_phi = graph.input(new_ret, 1).unwrap();
    let high_phi = graph.input(new_ret, 2).unwrap();
    assert_ne!(low_phi, shl);
    assert_eq!(graph.node(low_phi).op(), Op::Phi);
    assert_eq!(graph.node(high_phi).op(), Op::Phi);

    // Both Phis merge a two-way diamond: a "small-shift" predecessor
    // and a "large-shift" predecessor, in that order (the diamond is
    // built small-block-first).
    assert_eq!(graph.arity(low_phi), 2);
    assert_eq!(graph.arity(high_phi), 2);
    let merge_block = graph.node(low_phi).block().unwrap();
    assert_eq!(graph.node(high_phi).block().unwrap(), merge_block);
    assert_eq!(graph.node(merge_block).op(), Op::Block);
    assert_eq!(graph.arity(merge_block), 2);

    let small_low = graph.input(low_phi, 0).unwrap();
    let large_low = graph.input(low_phi, 1).unwrap();
    let small_high = graph.input(high_phi, 0).unwrap();
    let large_high = graph.input(high_phi, 1).unwrap();

    // Large-shift side: low is the constant zero, high is
    // `Shl(x.low, shamt & (word_bits - 1))`.
    assert_eq!(graph.node(large_low).op(), Op::Const);
    assert_eq!(const_value(&graph, large_low), 0);
    assert_eq!(graph.node(large_high).op(), Op::Shl);
    let l_high_lhs = graph.input(large_high, 0).unwrap();
    assert_eq!(graph.node(l_high_lhs).op(), Op::Const);
    assert_eq!(const_value(&graph, l_high_lhs), 2, "low half of x (carried into the large-shift high result)");

    // Small-shift side: low is the plain `Shl(x.low, shamt_small)`; high
    // is `Shl(x.high, shamt_small) | Shr(Shr(x.low, 1), !shamt_small)` --
    // the carry term is the bits `x.low` shifts out its top end, carried
    // up into `x.high`, not the other way around.
    assert_eq!(graph.node(small_low).op(), Op::Shl);
    let s_low_lhs = graph.input(small_low, 0).unwrap();
    assert_eq!(graph.node(s_low_lhs).op(), Op::Const);
    assert_eq!(const_value(&graph, s_low_lhs), 2, "low half of x");

    assert_eq!(graph.node(small_high).op(), Op::Or);
    let plain_shift = graph.input(small_high, 0).unwrap();
    let carry = graph.input(small_high, 1).unwrap();
    assert_eq!(graph.node(plain_shift).op(), Op::Shl);
    assert_eq!(const_value(&graph, graph.input(plain_shift, 0).unwrap()), 1, "high half of x");
    assert_eq!(graph.node(carry).op(), Op::Shr);
    let low_shr1 = graph.input(carry, 0).unwrap();
    assert_eq!(graph.node(low_shr1).op(), Op::Shr);
    assert_eq!(const_value(&graph, graph.input(low_shr1, 0).unwrap()), 2, "carry is shifted out of x.low, not x.high");
    assert_eq!(graph.node(graph.input(carry, 1).unwrap()).op(), Op::Not);
}

#[test]
fn s6_doubleword_load_big_endian() {
    let (mut types, mut graph) = new_graph_with_types();
    let dw = dw_mode();
    let ptr_mode = Mode::new_reference("P", 64);
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;
    let args = graph.anchors().args;

    let (ret, load) = {
        let mut b = Builder::new(&mut graph);
        let p = b.new_proj(args, 0, ptr_mode.clone());
        let load = b.new_load(start_block, mem0, p);
        let value = b.new_proj(load, 1, dw.clone());
        let load_mem = b.new_proj(load, 0, Mode::memory());
        let ret = b.new_return(start_block, load_mem, &[value]);
        (ret, load)
    };
    Builder::new(&mut graph).add_block_pred(end_block, ret);
    let ptr = graph.input(load, 1).unwrap();

    let (_rt_types, mut factory) = new_intrinsic_factory();
    let mut params = DoublewordLoweringParams {
        doubleword_size: 64,
        little_endian: false,
        intrinsic_factory: &mut factory,
    };
    lower_doubleword(&mut graph, &mut types, &mut params).expect("lowering succeeds");

    let new_ret = first_return(&graph);
    let low_val = graph.input(new_ret, 1).unwrap();
    let high_val = graph.input(new_ret, 2).unwrap();

    assert_eq!(graph.node(low_val).op(), Op::Proj);
    assert_eq!(graph.node(high_val).op(), Op::Proj);
    let low_load = graph.input(low_val, 0).unwrap();
    let high_load = graph.input(high_val, 0).unwrap();
    assert_eq!(graph.node(low_load).op(), Op::Load);
    assert_eq!(graph.node(high_load).op(), Op::Load);
    assert_ne!(low_load, high_load);

    // Big-endian: the high word lives at the original address, the low
    // word at address + word_bytes. The loads are chained low, then
    // high, via memory.
    assert_eq!(graph.input(high_load, 1).unwrap(), ptr, "high word at the original address");
    let low_ptr = graph.input(low_load, 1).unwrap();
    assert_eq!(graph.node(low_ptr).op(), Op::Add);
    assert_eq!(graph.input(low_ptr, 0).unwrap(), ptr);
    assert_eq!(const_value(&graph, graph.input(low_ptr, 1).unwrap()), 4, "word size in bytes");

    let low_mem = graph.input(high_load, 0).unwrap();
    assert_eq!(graph.node(low_mem).op(), Op::Proj);
    assert_eq!(graph.input(low_mem, 0).unwrap(), low_load, "high load is chained after the low load's memory result");

    compute_dominance(&mut graph).expect("the lowered graph's control flow is still well-formed");
}
