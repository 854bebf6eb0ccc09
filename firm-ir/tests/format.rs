//! The textual IR format (spec §6, §8 round-trip property): writing and
//! reading back a graph yields the same nodes, attributes, and
//! predecessor relation.

use firm_asm::{EntityRef, Op, ProjAttr};
use firm_types::{Mode, Relation, Signedness, Tarval};
use firm_ir::format::{read_graph, write_graph};
use firm_ir::graph::{Attr, Builder, Graph, NodeId};
use firm_ir::ty::{CallingConvention, Entity, EntityId, EntityKind, MethodType, Type, TypeTable};

fn word_mode() -> Mode {
    Mode::new_int("Iu32", 32, Signedness::Unsigned, 32).expect("valid int mode")
}

/// A graph plus a `TypeTable` that registers its own entity and frame
/// type as a zero-arg `Method`, matching the shape `write_graph`'s
/// `typegraph` section is meant to describe.
fn new_graph_with_types() -> (TypeTable, Graph) {
    let mut types = TypeTable::new();
    let fn_ty = types.add_type(Type::Method(MethodType {
        params: Vec::new(),
        results: Vec::new(),
        calling_convention: CallingConvention::C,
        variadic: false,
    }));
    let fn_entity = types.add_entity(Entity {
        name: "roundtrip_fn".into(),
        ty: fn_ty,
        kind: EntityKind::Method { lowered_type: None },
    });
    let frame = EntityId::from_ref(EntityRef(999));
    let graph = Graph::new(fn_entity, frame);
    (types, graph)
}

/// Asserts that every node reachable in `before` has a counterpart in
/// `after` at the *same* `NodeId` (node numbering is stable across a
/// round-trip, per `format/text.rs`'s module doc) with the same op,
/// mode name, block, attribute, and predecessor list.
fn assert_isomorphic(before: &Graph, after: &Graph) {
    let before_ids = before.node_ids().collect::<Vec<_>>();
    let after_ids = after.node_ids().collect::<Vec<_>>();
    assert_eq!(before_ids.len(), after_ids.len(), "same node count");

    for id in before_ids {
        let b = before.node(id);
        let a = after.node(id);
        assert_eq!(a.op(), b.op(), "node {id} op");
        assert_eq!(a.mode().name(), b.mode().name(), "node {id} mode");
        assert_eq!(a.block(), b.block(), "node {id} block");
        assert_eq!(a.inputs(), b.inputs(), "node {id} predecessors");
        assert_attr_eq(id, a.attr(), b.attr());
    }
}

fn assert_attr_eq(id: NodeId, a: &Attr, b: &Attr) {
    match (a, b) {
        (Attr::None, Attr::None) => {}
        (Attr::Const(x), Attr::Const(y)) => assert_eq!(x.value, y.value, "node {id} const value"),
        (Attr::SymConst(x), Attr::SymConst(y)) => assert_eq!(x.entity, y.entity, "node {id} symconst entity"),
        (Attr::Proj(x), Attr::Proj(y)) => assert_eq!(x.num, y.num, "node {id} proj num"),
        (Attr::Cmp(x), Attr::Cmp(y)) => assert_eq!(x.relation, y.relation, "node {id} cmp relation"),
        (Attr::Confirm(x), Attr::Confirm(y)) => assert_eq!(x.relation, y.relation, "node {id} confirm relation"),
        (Attr::Switch(x), Attr::Switch(y)) => {
            assert_eq!(x.n_outs, y.n_outs, "node {id} switch n_outs");
            assert_eq!(x.table, y.table, "node {id} switch table");
        }
        (Attr::Call(x), Attr::Call(y)) => assert_eq!(x.method_type, y.method_type, "node {id} call method_type"),
        (Attr::Builtin(x), Attr::Builtin(y)) => assert_eq!(x.kind, y.kind, "node {id} builtin kind"),
        (x, y) => panic!("node {id} attribute kind mismatch: {x:?} vs {y:?}"),
    }
}

#[test]
fn round_trip_straight_line_arithmetic() {
    let (types, mut graph) = new_graph_with_types();
    let mode = word_mode();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    let ret = {
        let mut b = Builder::new(&mut graph);
        let one = b.new_const(start_block, Tarval::from_i128(&mode, 1).unwrap());
        let two = b.new_const(start_block, Tarval::from_i128(&mode, 2).unwrap());
        let sum = b.new_add(start_block, one, two, mode.clone());
        let three = b.new_const(start_block, Tarval::from_i128(&mode, 3).unwrap());
        let product = b.new_mul(start_block, sum, three, mode.clone());
        b.new_return(start_block, mem0, &[product])
    };
    Builder::new(&mut graph).add_block_pred(end_block, ret);

    let text = write_graph(&graph, &types);

    let mut read_types = TypeTable::new();
    let outcome = read_graph(&text, &mut read_types).expect("parses cleanly");
    assert!(outcome.errors.is_empty(), "no recoverable parse errors: {:?}", outcome.errors);

    assert_isomorphic(&graph, &outcome.graph);
    assert_eq!(outcome.graph.entity(), graph.entity());
    assert_eq!(outcome.graph.frame_type(), graph.frame_type());
}

#[test]
fn round_trip_branch_with_confirm_and_phi() {
    let (types, mut graph) = new_graph_with_types();
    let mode = word_mode();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    let ret = {
        let mut b = Builder::new(&mut graph);
        let x = b.new_const(start_block, Tarval::from_i128(&mode, 7).unwrap());
        let five = b.new_const(start_block, Tarval::from_i128(&mode, 5).unwrap());
        let cmp = b.new_cmp(start_block, x, five, Relation::LESS);
        let cond = b.new_cond(start_block, cmp);
        let t_proj = b.new_proj(cond, ProjAttr::COND_TRUE, Mode::control());
        let f_proj = b.new_proj(cond, ProjAttr::COND_FALSE, Mode::control());

        let then_block = b.new_block(&[t_proj]);
        let then_val = b.new_const(then_block, Tarval::from_i128(&mode, 10).unwrap());
        let then_jmp = b.new_jmp(then_block);

        let else_block = b.new_block(&[f_proj]);
        let else_val = b.new_const(else_block, Tarval::from_i128(&mode, 20).unwrap());
        let else_jmp = b.new_jmp(else_block);

        let merge_block = b.new_block(&[then_jmp, else_jmp]);
        let phi = b.new_phi(merge_block, &[then_val, else_val], mode.clone());
        b.new_return(merge_block, mem0, &[phi])
    };
    Builder::new(&mut graph).add_block_pred(end_block, ret);

    let text = write_graph(&graph, &types);

    let mut read_types = TypeTable::new();
    let outcome = read_graph(&text, &mut read_types).expect("parses cleanly");
    assert!(outcome.errors.is_empty(), "no recoverable parse errors: {:?}", outcome.errors);

    assert_isomorphic(&graph, &outcome.graph);
}

#[test]
fn round_trip_preserves_typegraph_entries() {
    let mut types = TypeTable::new();
    let field_ty = types.add_type(Type::Primitive(word_mode()));
    let struct_ty = types.add_type(Type::Struct {
        name: "Point".into(),
        fields: vec![
            firm_ir::ty::Field { name: "x".into(), ty: field_ty, offset: 0 },
            firm_ir::ty::Field { name: "y".into(), ty: field_ty, offset: 4 },
        ],
    });
    let fn_ty = types.add_type(Type::Method(MethodType {
        params: vec![struct_ty],
        results: vec![field_ty],
        calling_convention: CallingConvention::Fast,
        variadic: false,
    }));
    let fn_entity = types.add_entity(Entity {
        name: "area".into(),
        ty: fn_ty,
        kind: EntityKind::Method { lowered_type: None },
    });
    let frame = EntityId::from_ref(EntityRef(999));
    let graph = Graph::new(fn_entity, frame);

    let text = write_graph(&graph, &types);

    let mut read_types = TypeTable::new();
    let outcome = read_graph(&text, &mut read_types).expect("parses cleanly");
    assert!(outcome.errors.is_empty(), "no recoverable parse errors: {:?}", outcome.errors);

    // The reader re-registers types/entities in append order, so indices
    // line up directly with the original table.
    assert_eq!(read_types.types_iter().count(), types.types_iter().count());
    assert_eq!(read_types.entities_iter().count(), types.entities_iter().count());

    match (read_types.ty(struct_ty), types.ty(struct_ty)) {
        (Type::Struct { name: a, fields: af }, Type::Struct { name: b, fields: bf }) => {
            assert_eq!(a, b);
            assert_eq!(af, bf);
        }
        other => panic!("expected matching Struct types, got {other:?}"),
    }
    match (read_types.ty(fn_ty), types.ty(fn_ty)) {
        (Type::Method(a), Type::Method(b)) => {
            assert_eq!(a.params, b.params);
            assert_eq!(a.results, b.results);
            assert_eq!(a.calling_convention, b.calling_convention);
            assert_eq!(a.variadic, b.variadic);
        }
        other => panic!("expected matching Method types, got {other:?}"),
    }
    assert_eq!(read_types.entity(fn_entity).name, types.entity(fn_entity).name);
}

#[test]
fn reader_recovers_from_an_undefined_predecessor_reference() {
    let (types, mut graph) = new_graph_with_types();
    let mode = word_mode();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    let ret = {
        let mut b = Builder::new(&mut graph);
        let one = b.new_const(start_block, Tarval::from_i128(&mode, 1).unwrap());
        b.new_return(start_block, mem0, &[one])
    };
    Builder::new(&mut graph).add_block_pred(end_block, ret);
    let node_count = graph.node_count() as u32;

    let text = write_graph(&graph, &types);
    // The Return node's predecessor list is `[ mem value ]`; replace the
    // second (value) reference with a node number that never appears
    // anywhere else in the file.
    let corrupted_line = text
        .lines()
        .find(|l| l.trim_start().starts_with("Return"))
        .expect("a Return line exists")
        .to_string();
    let open = corrupted_line.find('[').unwrap();
    let close = corrupted_line.rfind(']').unwrap();
    let preds: Vec<&str> = corrupted_line[open + 1..close].split_whitespace().collect();
    assert_eq!(preds.len(), 2, "Return's preds are [mem, value]");
    let bogus_value = node_count + 1000;
    let fixed_line = format!("{}[ {} {} ]", &corrupted_line[..open], preds[0], bogus_value);
    let text = text.replacen(&corrupted_line, &fixed_line, 1);

    let mut read_types = TypeTable::new();
    let outcome = read_graph(&text, &mut read_types).expect("still reconstructs a graph");
    assert!(!outcome.errors.is_empty(), "the dangling reference is reported");

    let new_ret = outcome
        .graph
        .reachable_from_end_and_anchors()
        .into_iter()
        .find(|&n| outcome.graph.node(n).op() == Op::Return)
        .expect("a Return node still exists");
    // §7 recovery: the unresolved predecessor is materialized as Bad.
    let mem_input = outcome.graph.input(new_ret, 0).unwrap();
    let value_input = outcome.graph.input(new_ret, 1).unwrap();
    assert_eq!(mem_input, outcome.graph.anchors().initial_mem);
    assert_eq!(value_input, outcome.graph.anchors().bad);
}
