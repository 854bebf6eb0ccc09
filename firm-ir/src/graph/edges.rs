//! The def→use ("out") edge index (§4.3).
//!
//! Built in two passes — count, then fill — per §4.3. The count pass
//! sizes each definition's use-list with the exact capacity it will
//! need so the fill pass never reallocates; unlike a literal single flat
//! allocation carved into immutable per-definition slices, this keeps
//! each definition's use-list independently growable afterwards, which
//! `Graph::set_input`/`exchange` rely on to keep the index incrementally
//! in sync (§4.3: "Kept in sync by the node-rewiring primitives when the
//! edge index is marked consistent").

use super::graph::Graph;
use super::node::NodeId;
use firm_asm::Op;

/// A single recorded def→use edge: `user`'s input at `position` refers
/// to the definition this edge is filed under. `position == -1` means
/// the block input.
pub type Edge = (NodeId, i32);

/// The out-edge index for one graph.
#[derive(Debug, Clone, Default)]
pub struct OutEdges {
    uses: Vec<Vec<Edge>>,
}

impl OutEdges {
    /// Creates an empty index sized for `n_nodes` definitions.
    pub(crate) fn with_capacity(n_nodes: usize) -> Self {
        Self {
            uses: vec![Vec::new(); n_nodes],
        }
    }

    /// All `(user, position)` pairs that reference `def`.
    pub fn uses(&self, def: NodeId) -> &[Edge] {
        self.uses
            .get(def.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of uses of `def`.
    pub fn use_count(&self, def: NodeId) -> usize {
        self.uses(def).len()
    }

    pub(crate) fn grow_to(&mut self, n_nodes: usize) {
        if self.uses.len() < n_nodes {
            self.uses.resize(n_nodes, Vec::new());
        }
    }

    pub(crate) fn record(&mut self, def: NodeId, user: NodeId, position: i32) {
        self.grow_to(def.index() + 1);
        self.uses[def.index()].push((user, position));
    }

    pub(crate) fn remove(&mut self, def: NodeId, user: NodeId, position: i32) {
        if let Some(list) = self.uses.get_mut(def.index()) {
            if let Some(idx) = list.iter().position(|&e| e == (user, position)) {
                list.swap_remove(idx);
            }
        }
    }

    /// Resolves through identity/rewrite-placeholder chains (§4.1), the
    /// generalization of §4.3's "canonicalizes Tuple predecessors by
    /// skipping them": a direct input that is itself an `Id` node is
    /// recorded against the node `Id` ultimately refers to.
    fn canonical(graph: &Graph, mut def: NodeId) -> NodeId {
        let mut guard = 0usize;
        while graph.node(def).op() == Op::Id && guard < graph.node_count() {
            def = graph
                .node(def)
                .input(0)
                .expect("Id nodes always carry their replacement as input 0");
            guard += 1;
        }
        def
    }

    /// Rebuilds the out-edge index from scratch by walking every node
    /// reachable from `end` and the anchors, counting references to
    /// each definition, then filling the per-definition lists.
    pub fn rebuild(graph: &mut Graph) {
        let n = graph.node_count();
        let mut counts = vec![0u32; n];
        let reachable = graph.reachable_from_end_and_anchors();
        for &user in &reachable {
            let node = graph.node(user);
            if let Some(block) = node.block() {
                counts[Self::canonical(graph, block).index()] += 1;
            }
            for &input in node.inputs() {
                counts[Self::canonical(graph, input).index()] += 1;
            }
        }
        let mut edges = Self {
            uses: counts.iter().map(|&c| Vec::with_capacity(c as usize)).collect(),
        };
        for &user in &reachable {
            let node = graph.node(user);
            if let Some(block) = node.block() {
                let def = Self::canonical(graph, block);
                edges.record(def, user, -1);
            }
            for (pos, &input) in node.inputs().iter().enumerate() {
                let def = Self::canonical(graph, input);
                edges.record(def, user, pos as i32);
            }
        }
        graph.set_out_edges(edges);
    }
}
