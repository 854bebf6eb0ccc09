//! Graph walkers and visit epochs (§4.5).
//!
//! Each walk bumps the relevant epoch once up front, then stamps every
//! node it visits; `Graph::is_visited` compares a node's stamp against
//! the current epoch rather than clearing a per-node flag, so a walk
//! never needs to un-stamp the previous walk's nodes. A node created
//! mid-walk is stamped with the epoch at creation time (see
//! `Graph::add_node`), so it reads as already-visited unless a
//! callback explicitly re-enqueues it — this is what lets a pass add
//! nodes while walking without the walker looping back over its own
//! output.

use firm_asm::Op;

use crate::graph::{Graph, NodeId};

/// Visits every anchor (§3's distinguished graph-global roots), in the
/// fixed order [`crate::graph::Anchors::all`] returns them.
pub fn walk_anchors(graph: &mut Graph, mut visit: impl FnMut(&mut Graph, NodeId)) {
    graph.bump_node_visited();
    for anchor in graph.anchors().all() {
        if !graph.is_visited(anchor) {
            graph.mark_visited(anchor);
            visit(graph, anchor);
        }
    }
}

/// A depth-first walk over every node reachable from `End` and the
/// anchors, pre-order (a node is stamped and visited before its
/// inputs are pushed).
pub fn walk_nodes(graph: &mut Graph, mut visit: impl FnMut(&mut Graph, NodeId)) {
    graph.bump_node_visited();
    let mut stack = vec![graph.anchors().end];
    stack.extend(graph.anchors().all());
    while let Some(n) = stack.pop() {
        if graph.is_visited(n) {
            continue;
        }
        graph.mark_visited(n);
        visit(graph, n);
        let node = graph.node(n);
        if let Some(block) = node.block() {
            stack.push(block);
        }
        stack.extend(node.inputs().iter().copied());
    }
}

/// As [`walk_nodes`], but restricted to `Block` nodes (and `Start`'s
/// and `End`'s own blocks).
pub fn walk_blocks(graph: &mut Graph, mut visit: impl FnMut(&mut Graph, NodeId)) {
    walk_nodes(graph, |g, n| {
        if g.node(n).op() == Op::Block {
            visit(g, n);
        }
    });
}

/// Walks every node reachable from `root` alone (not the whole graph),
/// following data and block inputs.
pub fn walk_from(graph: &mut Graph, root: NodeId, mut visit: impl FnMut(&mut Graph, NodeId)) {
    graph.bump_node_visited();
    let mut stack = vec![root];
    while let Some(n) = stack.pop() {
        if graph.is_visited(n) {
            continue;
        }
        graph.mark_visited(n);
        visit(graph, n);
        let node = graph.node(n);
        if let Some(block) = node.block() {
            stack.push(block);
        }
        stack.extend(node.inputs().iter().copied());
    }
}

/// A reverse ("outs") walk: starting from `root`, follows out-edges
/// (users) rather than inputs. Requires a consistent out-edge index;
/// the caller is responsible for calling `Graph::assure_out_edges`
/// first (walkers don't implicitly run passes).
pub fn walk_outs(graph: &mut Graph, root: NodeId, mut visit: impl FnMut(&mut Graph, NodeId)) {
    graph.bump_node_visited();
    let mut stack = vec![root];
    while let Some(n) = stack.pop() {
        if graph.is_visited(n) {
            continue;
        }
        graph.mark_visited(n);
        visit(graph, n);
        if let Some(edges) = graph.out_edges() {
            let users: Vec<NodeId> = edges.uses(n).iter().map(|&(u, _)| u).collect();
            stack.extend(users);
        }
    }
}

/// Visits every block reachable from `Start`, in arbitrary order.
///
/// Uses its own local visited set rather than `Graph`'s node-visited
/// epoch — the block-visited counter (`Graph::bump_block_visited`) is
/// reserved for callers that need a *stamp on the node itself*
/// (visible to other code after this walk returns); this walk's own
/// bookkeeping is gone once it returns, so a block walk can run
/// nested inside a node walk without disturbing it.
pub fn walk_blocks_epoch(graph: &mut Graph, mut visit: impl FnMut(&mut Graph, NodeId)) {
    graph.bump_block_visited();
    let mut stack = vec![graph.anchors().start_block];
    let mut seen = std::collections::HashSet::new();
    while let Some(b) = stack.pop() {
        if !seen.insert(b) {
            continue;
        }
        visit(graph, b);
        if let Some(edges) = graph.out_edges() {
            for &(user, pos) in edges.uses(b) {
                if pos == -1 && graph.node(user).op() == Op::Block {
                    stack.push(user);
                }
            }
        }
    }
}
