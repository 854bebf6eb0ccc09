//! Dominance, post-dominance and natural-loop analysis (§4.4).

use std::collections::{HashMap, HashSet, VecDeque};

use firm_asm::Op;

use crate::error::Result;
use crate::graph::{Graph, NodeId};

/// A dominator (or post-dominator) tree over a graph's blocks.
///
/// Built with the classic iterative Cooper/Harvey/Kennedy algorithm,
/// grounded on the same "compute a predecessor-indexed fixpoint over an
/// RPO numbering" shape `fuel_vm::interpreter::internal`'s iterative
/// workers use for other fixpoint computations in the teacher crate.
#[derive(Debug, Clone, Default)]
pub struct DominanceInfo {
    idom: HashMap<NodeId, NodeId>,
    rpo: Vec<NodeId>,
    rpo_index: HashMap<NodeId, usize>,
    depth: HashMap<NodeId, i32>,
}

impl DominanceInfo {
    /// The immediate dominator of `block`, or `None` for the root.
    pub fn immediate_dominator(&self, block: NodeId) -> Option<NodeId> {
        self.idom.get(&block).copied()
    }

    /// `true` iff `a` dominates `b` (reflexively: a block dominates
    /// itself). Returns `false` if either `a` or `b` is unreachable from
    /// the tree's root, even when `a == b` (§4.4: dominance is only
    /// defined over the reachable subgraph).
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        if !self.idom.contains_key(&a) || !self.idom.contains_key(&b) {
            return false;
        }
        if a == b {
            return true;
        }
        let mut cur = b;
        while let Some(&idom) = self.idom.get(&cur) {
            if idom == cur {
                break;
            }
            if idom == a {
                return true;
            }
            cur = idom;
        }
        false
    }

    /// Reverse postorder position of `block`, used to order dominance
    /// frontier / loop-header discovery work.
    pub fn rpo_position(&self, block: NodeId) -> Option<usize> {
        self.rpo_index.get(&block).copied()
    }

    /// Blocks in reverse postorder.
    pub fn rpo(&self) -> &[NodeId] {
        &self.rpo
    }

    /// The dom-tree depth of `block`: 0 for the root, one more than its
    /// immediate dominator's depth otherwise. Unreachable blocks get
    /// depth `-1` (§4.4).
    pub fn depth(&self, block: NodeId) -> i32 {
        self.depth.get(&block).copied().unwrap_or(-1)
    }
}

/// Derives dom-tree depth from a finished `idom` map: the root (the only
/// node that is its own immediate dominator) has depth 0, and every other
/// entry's depth is one more than its immediate dominator's. `idom` is
/// acyclic away from the root, so repeated passes over the nodes still
/// missing a depth converge in at most `idom.len()` iterations.
fn compute_depths(idom: &HashMap<NodeId, NodeId>, root: NodeId) -> HashMap<NodeId, i32> {
    let mut depth = HashMap::new();
    depth.insert(root, 0);
    let mut remaining: Vec<NodeId> = idom.keys().copied().filter(|&n| n != root).collect();
    let mut progress = true;
    while progress && !remaining.is_empty() {
        progress = false;
        remaining.retain(|&n| match depth.get(&idom[&n]) {
            Some(&d) => {
                depth.insert(n, d + 1);
                progress = true;
                false
            }
            None => true,
        });
    }
    depth
}

fn successors(graph: &Graph, block: NodeId) -> Vec<NodeId> {
    let edges = graph.out_edges();
    let mut out = Vec::new();
    if let Some(edges) = edges {
        for &(user, pos) in edges.uses(block) {
            if pos == -1 {
                out.push(user);
            }
        }
    }
    out.into_iter()
        .filter(|&n| graph.node(n).op() == Op::Block)
        .collect()
}

fn reverse_postorder(graph: &Graph, root: NodeId, forward: bool) -> Vec<NodeId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut stack = vec![(root, false)];
    while let Some((n, processed)) = stack.pop() {
        if processed {
            order.push(n);
            continue;
        }
        if !visited.insert(n) {
            continue;
        }
        stack.push((n, true));
        let next = if forward {
            successors(graph, n)
        } else {
            graph.cfg_preds(n)
        };
        for succ in next {
            if !visited.contains(&succ) {
                stack.push((succ, false));
            }
        }
    }
    order.reverse();
    order
}

fn build(graph: &Graph, root: NodeId, forward: bool) -> DominanceInfo {
    let rpo = reverse_postorder(graph, root, forward);
    let rpo_index: HashMap<NodeId, usize> = rpo.iter().enumerate().map(|(i, &n)| (n, i)).collect();
    let mut idom: HashMap<NodeId, NodeId> = HashMap::new();
    idom.insert(root, root);

    let preds_of = |n: NodeId| -> Vec<NodeId> {
        if forward {
            graph.cfg_preds(n)
        } else {
            successors(graph, n)
        }
    };

    let intersect = |idom: &HashMap<NodeId, usize>, mut a: usize, mut b: usize| -> usize {
        while a != b {
            while a > b {
                a = idom[&rpo[a]];
            }
            while b > a {
                b = idom[&rpo[b]];
            }
        }
        a
    };

    let mut idom_idx: HashMap<usize, usize> = HashMap::new();
    idom_idx.insert(0, 0);
    let mut changed = true;
    while changed {
        changed = false;
        for (i, &block) in rpo.iter().enumerate().skip(1) {
            let processed_preds: Vec<usize> = preds_of(block)
                .into_iter()
                .filter_map(|p| rpo_index.get(&p).copied())
                .filter(|&pi| idom_idx.contains_key(&pi))
                .collect();
            let Some(&first) = processed_preds.first() else {
                continue;
            };
            let mut new_idom = first;
            for &p in &processed_preds[1..] {
                new_idom = intersect(&idom_idx, new_idom, p);
            }
            if idom_idx.get(&i) != Some(&new_idom) {
                idom_idx.insert(i, new_idom);
                changed = true;
            }
        }
    }

    for (&i, &d) in &idom_idx {
        idom.insert(rpo[i], rpo[d]);
    }

    let depth = compute_depths(&idom, root);

    DominanceInfo {
        idom,
        rpo,
        rpo_index,
        depth,
    }
}

/// Computes the dominator tree rooted at `start_block` and stores it on
/// the graph (§4.4).
pub fn compute_dominance(graph: &mut Graph) -> Result<()> {
    crate::pass::ensure(graph, crate::properties::Properties::CONSISTENT_OUT_EDGES)?;
    let root = graph.anchors().start_block;
    let info = build(graph, root, true);
    graph.set_dominance(info);
    Ok(())
}

/// Computes the post-dominator tree rooted at `end_block`.
pub fn compute_post_dominance(graph: &mut Graph) -> Result<()> {
    crate::pass::ensure(graph, crate::properties::Properties::CONSISTENT_OUT_EDGES)?;
    let root = graph.anchors().end_block;
    let info = build(graph, root, false);
    graph.set_post_dominance(info);
    Ok(())
}

/// A single natural loop: its header and the set of blocks in its body.
#[derive(Debug, Clone)]
pub struct Loop {
    /// The loop header (the sole dominator of every back-edge source).
    pub header: NodeId,
    /// Every block in the loop body, including the header.
    pub body: HashSet<NodeId>,
}

/// Natural-loop information for a graph (§4.6's `CONSISTENT_LOOP_INFO`).
#[derive(Debug, Clone, Default)]
pub struct LoopInfo {
    loops: Vec<Loop>,
}

impl LoopInfo {
    /// Every natural loop found, headers in no particular order.
    pub fn loops(&self) -> &[Loop] {
        &self.loops
    }

    /// The innermost loop containing `block`, if any.
    pub fn containing_loop(&self, block: NodeId) -> Option<&Loop> {
        self.loops
            .iter()
            .filter(|l| l.body.contains(&block))
            .min_by_key(|l| l.body.len())
    }
}

/// Computes natural-loop information from the dominator tree: a
/// back-edge `b -> h` exists whenever `h` dominates `b`; the loop body
/// is every block that can reach `b` without going through `h`.
pub fn compute_loop_info(graph: &mut Graph) -> Result<()> {
    compute_dominance(graph)?;
    let dom = graph.dominance().expect("just computed").clone();

    let mut loops: HashMap<NodeId, HashSet<NodeId>> = HashMap::new();
    for &block in dom.rpo() {
        for succ in successors(graph, block) {
            if dom.dominates(succ, block) {
                let body = loops.entry(succ).or_default();
                body.insert(succ);
                body.insert(block);
                let mut worklist = VecDeque::new();
                worklist.push_back(block);
                while let Some(n) = worklist.pop_front() {
                    if n == succ {
                        continue;
                    }
                    for pred in graph.cfg_preds(n) {
                        if body.insert(pred) {
                            worklist.push_back(pred);
                        }
                    }
                }
            }
        }
    }

    let info = LoopInfo {
        loops: loops
            .into_iter()
            .map(|(header, body)| Loop { header, body })
            .collect(),
    };
    graph.set_loop_info(info);
    Ok(())
}
