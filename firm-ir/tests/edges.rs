//! Out-edge index round-trip property (§4.3): every input of every
//! reachable node shows up as a use of its definition, and every
//! recorded use points back at the input that produced it.

use firm_asm::EntityRef;
use firm_types::{Mode, Signedness, Tarval};
use firm_ir::graph::{Builder, Graph};
use firm_ir::ty::EntityId;
use quickcheck_macros::quickcheck;

fn word_mode() -> Mode {
    Mode::new_int("Iu32", 32, Signedness::Unsigned, 32).expect("valid int mode")
}

fn new_graph() -> Graph {
    let entity = EntityId::from_ref(EntityRef(0));
    let frame = EntityId::from_ref(EntityRef(1));
    Graph::new(entity, frame)
}

/// Builds a chain of `n` Add nodes (each adding the previous result to a
/// fresh constant) in the start block, closed off with a Return, and
/// returns the graph.
fn chain_graph(values: &[u8]) -> Graph {
    let mut graph = new_graph();
    let mode = word_mode();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;
    let mem0 = graph.anchors().initial_mem;

    let ret = {
        let mut b = Builder::new(&mut graph);
        let mut acc = b.new_const(start_block, Tarval::from_i128(&mode, 0).unwrap());
        for &v in values {
            let k = b.new_const(start_block, Tarval::from_i128(&mode, v as i128).unwrap());
            acc = b.new_add(start_block, acc, k, mode.clone());
        }
        b.new_return(start_block, mem0, &[acc])
    };
    Builder::new(&mut graph).add_block_pred(end_block, ret);
    graph
}

/// Every `(user, pos)` the index records for a definition really has
/// that definition as `user`'s input at `pos` (or block, for `pos ==
/// -1`), and conversely every reachable node's inputs (and block) show
/// up among their definition's recorded uses.
#[quickcheck]
fn out_edge_index_round_trips_with_node_inputs(values: Vec<u8>) -> bool {
    let values: Vec<u8> = values.into_iter().take(12).collect();
    let mut graph = chain_graph(&values);
    let edges = graph.assure_out_edges().clone();

    let reachable = graph.reachable_from_end_and_anchors();
    for &user in &reachable {
        let node = graph.node(user);
        if let Some(block) = node.block() {
            if !edges.uses(block).contains(&(user, -1)) {
                return false;
            }
        }
        for (pos, &input) in node.inputs().iter().enumerate() {
            if !edges.uses(input).contains(&(user, pos as i32)) {
                return false;
            }
        }
    }

    for &def in &reachable {
        for &(user, pos) in edges.uses(def) {
            if pos == -1 {
                if graph.node(user).block() != Some(def) {
                    return false;
                }
            } else if graph.node(user).inputs().get(pos as usize) != Some(&def) {
                return false;
            }
        }
    }

    true
}
