//! Dominance reflexivity property (§4.4): every block reachable from
//! the start dominates itself, and an unreachable block dominates
//! nothing, not even itself.

use firm_asm::EntityRef;
use firm_ir::dominance::compute_dominance;
use firm_ir::graph::{Builder, Graph};
use firm_ir::ty::EntityId;
use quickcheck_macros::quickcheck;

fn new_graph() -> Graph {
    let entity = EntityId::from_ref(EntityRef(0));
    let frame = EntityId::from_ref(EntityRef(1));
    Graph::new(entity, frame)
}

/// Builds a straight-line chain of `n` extra blocks after the start
/// block, each jumping to the next, and wires the last into `End`.
fn chain_of_blocks(n: u8) -> (Graph, Vec<firm_ir::graph::NodeId>) {
    let mut graph = new_graph();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;

    let mut blocks = vec![start_block];
    let mut b = Builder::new(&mut graph);
    let mut prev = start_block;
    for _ in 0..n {
        let jmp = b.new_jmp(prev);
        let block = b.new_block(&[jmp]);
        blocks.push(block);
        prev = block;
    }
    let final_jmp = b.new_jmp(prev);
    b.add_block_pred(end_block, final_jmp);
    (graph, blocks)
}

#[quickcheck]
fn every_reachable_block_dominates_itself(chain_len: u8) -> bool {
    let chain_len = chain_len % 16;
    let (mut graph, blocks) = chain_of_blocks(chain_len);
    compute_dominance(&mut graph).expect("start block is always reachable");
    let dom = graph.dominance().expect("just computed").clone();

    blocks.iter().all(|&b| dom.dominates(b, b))
}

#[quickcheck]
fn dominance_is_a_total_order_along_a_straight_line_chain(chain_len: u8) -> bool {
    let chain_len = chain_len % 16;
    let (mut graph, blocks) = chain_of_blocks(chain_len);
    compute_dominance(&mut graph).expect("start block is always reachable");
    let dom = graph.dominance().expect("just computed").clone();

    for i in 0..blocks.len() {
        for j in i..blocks.len() {
            if !dom.dominates(blocks[i], blocks[j]) {
                return false;
            }
            if i != j && dom.dominates(blocks[j], blocks[i]) {
                return false;
            }
        }
    }
    true
}

#[test]
fn an_unreachable_block_does_not_dominate_even_itself() {
    let mut graph = new_graph();
    let start_block = graph.anchors().start_block;
    let end_block = graph.anchors().end_block;

    let stray = {
        let mut b = Builder::new(&mut graph);
        b.new_block(&[])
    };
    let jmp = Builder::new(&mut graph).new_jmp(start_block);
    Builder::new(&mut graph).add_block_pred(end_block, jmp);

    compute_dominance(&mut graph).expect("start block is reachable");
    let dom = graph.dominance().expect("just computed");

    assert!(!dom.dominates(stray, stray));
    assert_eq!(dom.depth(stray), -1);
}
