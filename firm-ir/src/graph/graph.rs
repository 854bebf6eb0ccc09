//! The per-function IR graph (§3).

use std::collections::HashSet;

use firm_asm::{Op, SwitchAttr};
use firm_types::Mode;

use super::anchor::Anchors;
use super::edges::OutEdges;
use super::node::{Attr, DebugInfo, Node, NodeId, PinState};
use crate::dominance::{DominanceInfo, LoopInfo};
use crate::error::{Error, Result};
use crate::pass::ResourceKind;
use crate::properties::Properties;
use crate::ty::EntityId;

/// A function's SSA graph (§3).
///
/// Owns every node via a flat, append-only arena (`nodes`); a
/// [`NodeId`] is an index into it, grounded on `fuel_vm::Interpreter`'s
/// pattern of one big owning struct that every subsystem borrows from.
pub struct Graph {
    entity: EntityId,
    frame_type: EntityId,
    nodes: Vec<Node>,
    anchors: Anchors,
    visited_nodes: u32,
    visited_blocks: u32,
    pinned_default: PinState,
    properties: Properties,
    out_edges: Option<OutEdges>,
    dominance: Option<DominanceInfo>,
    post_dominance: Option<DominanceInfo>,
    loop_info: Option<LoopInfo>,
    reserved_resources: HashSet<ResourceKind>,
}

impl Graph {
    /// Creates a new, empty graph with just its anchors: `Start`,
    /// `End`, their blocks, `frame`, `args`, `initial_mem`, `no_mem`,
    /// `bad`, and `unknown`.
    pub fn new(entity: EntityId, frame_type: EntityId) -> Self {
        let mut nodes = Vec::new();
        let mut push = |op: Op, mode: Mode, block: Option<NodeId>, inputs: Vec<NodeId>, attr: Attr| {
            let id = NodeId::from_index(nodes.len());
            nodes.push(Node {
                op,
                mode,
                block,
                inputs,
                attr,
                visited: 0,
                pin_state: PinState::Pinned,
                debug: None,
            });
            id
        };

        let start_block = push(Op::Block, Mode::control(), None, Vec::new(), Attr::None);
        let end_block = push(Op::Block, Mode::control(), None, Vec::new(), Attr::None);
        let start = push(Op::Start, Mode::tuple(), Some(start_block), Vec::new(), Attr::None);
        let frame = push(
            Op::Proj,
            Mode::new_reference("P", 64),
            Some(start_block),
            vec![start],
            Attr::Proj(firm_asm::ProjAttr { num: 0 }),
        );
        let args = push(
            Op::Proj,
            Mode::tuple(),
            Some(start_block),
            vec![start],
            Attr::Proj(firm_asm::ProjAttr { num: 1 }),
        );
        let initial_mem = push(
            Op::Proj,
            Mode::memory(),
            Some(start_block),
            vec![start],
            Attr::Proj(firm_asm::ProjAttr { num: 2 }),
        );
        let no_mem = push(Op::NoMem, Mode::memory(), None, Vec::new(), Attr::None);
        let bad = push(Op::Bad, Mode::internal("BadMode"), None, Vec::new(), Attr::None);
        let unknown = push(
            Op::Unknown,
            Mode::internal("UnknownMode"),
            None,
            Vec::new(),
            Attr::None,
        );
        let end = push(Op::End, Mode::control(), Some(end_block), Vec::new(), Attr::None);

        let anchors = Anchors {
            start,
            start_block,
            end,
            end_block,
            frame,
            args,
            initial_mem,
            no_mem,
            bad,
            unknown,
        };

        Self {
            entity,
            frame_type,
            nodes,
            anchors,
            visited_nodes: 1,
            visited_blocks: 1,
            pinned_default: PinState::Pinned,
            properties: Properties::empty(),
            out_edges: None,
            dominance: None,
            post_dominance: None,
            loop_info: None,
            reserved_resources: HashSet::new(),
        }
    }

    /// The entity (function) this graph represents.
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// This graph's frame type.
    pub fn frame_type(&self) -> EntityId {
        self.frame_type
    }

    /// This graph's anchors.
    pub fn anchors(&self) -> &Anchors {
        &self.anchors
    }

    /// Number of nodes ever allocated in this graph (including any now
    /// unreachable after an `exchange`).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Borrows a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Mutably borrows a node. Prefer `set_input`/`exchange` for
    /// rewiring so the out-edge index stays in sync; use this for
    /// attribute-only edits.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Every node id currently allocated.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId::from_index)
    }

    /// The graph's current default pinned-state, consulted per node
    /// when the graph as a whole is in "floats" mode (§4.1).
    pub fn pinned_default(&self) -> PinState {
        self.pinned_default
    }

    /// Sets the graph's default pinned-state.
    pub fn set_pinned_default(&mut self, state: PinState) {
        self.pinned_default = state;
    }

    /// Appends a new node. Its visited stamp is set to the graph's
    /// current node-visited epoch, so it "inherits the current stamp to
    /// avoid revisit" during any walk in progress (§4.5), unless the
    /// pass explicitly re-enqueues it.
    pub fn add_node(
        &mut self,
        op: Op,
        mode: Mode,
        block: Option<NodeId>,
        inputs: Vec<NodeId>,
        attr: Attr,
    ) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node {
            op,
            mode,
            block,
            inputs,
            attr,
            visited: self.visited_nodes,
            pin_state: self.pinned_default,
            debug: None,
        });
        if let Some(edges) = &mut self.out_edges {
            edges.grow_to(self.nodes.len());
            let node = &self.nodes[id.index()];
            if let Some(b) = node.block {
                edges.record(b, id, -1);
            }
            for (pos, input) in node.inputs.clone().into_iter().enumerate() {
                edges.record(input, id, pos as i32);
            }
        }
        id
    }

    /// `get_input(n, i)` for `i ∈ [-1, arity)`; `i = -1` yields the
    /// block (§4.1).
    pub fn input(&self, n: NodeId, i: i32) -> Result<NodeId> {
        let node = self.node(n);
        if i == -1 {
            return node.block.ok_or(Error::BadInputIndex {
                node: n,
                index: i,
                arity: node.arity(),
            });
        }
        if i < -1 || i as usize >= node.arity() {
            return Err(Error::BadInputIndex {
                node: n,
                index: i,
                arity: node.arity(),
            });
        }
        Ok(node.inputs[i as usize])
    }

    /// Data input arity (excludes the block input), §4.1.
    pub fn arity(&self, n: NodeId) -> usize {
        self.node(n).arity()
    }

    /// Atomically updates input `i` of `n`, re-threading the affected
    /// out-edge if the index is currently marked consistent (§4.1).
    pub fn set_input(&mut self, n: NodeId, i: i32, v: NodeId) -> Result<()> {
        let old = self.input(n, i)?;
        if old == v {
            return Ok(());
        }
        if i == -1 {
            self.nodes[n.index()].block = Some(v);
        } else {
            self.nodes[n.index()].inputs[i as usize] = v;
        }
        if let Some(edges) = &mut self.out_edges {
            edges.remove(old, n, i);
            edges.record(v, n, i);
        }
        Ok(())
    }

    /// Sets `n`'s block directly, without requiring a previously
    /// assigned block the way [`Graph::set_input`]'s `i = -1` case
    /// does.
    ///
    /// Used only by the textual-format reader (§9) while wiring up
    /// nodes created with a placeholder `block: None` during its first
    /// pass; ordinary callers that already have a block to replace
    /// should go through `set_input(n, -1, v)` instead.
    pub(crate) fn set_block_unchecked(&mut self, n: NodeId, block: NodeId) {
        let old = self.nodes[n.index()].block;
        self.nodes[n.index()].block = Some(block);
        if let Some(edges) = &mut self.out_edges {
            if let Some(old) = old {
                edges.remove(old, n, -1);
            }
            edges.record(block, n, -1);
        }
    }

    /// For every `(u, p)` where `u`'s input `p` was `old`, replaces it
    /// with `new`; `old` is left floating (§4.1).
    ///
    /// Uses the out-edge index when consistent (O(uses)); otherwise
    /// falls back to an O(nodes) scan.
    pub fn exchange(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        if self.properties.contains(Properties::CONSISTENT_OUT_EDGES) {
            let users: Vec<_> = self
                .out_edges
                .as_ref()
                .unwrap()
                .uses(old)
                .to_vec();
            for (user, pos) in users {
                let _ = self.set_input(user, pos, new);
            }
        } else {
            for id in self.node_ids().collect::<Vec<_>>() {
                if self.nodes[id.index()].block == Some(old) {
                    let _ = self.set_input(id, -1, new);
                }
                let arity = self.nodes[id.index()].arity();
                for pos in 0..arity {
                    if self.nodes[id.index()].inputs[pos] == old {
                        let _ = self.set_input(id, pos as i32, new);
                    }
                }
            }
        }
    }

    /// Current graph properties.
    pub fn properties(&self) -> Properties {
        self.properties
    }

    /// Mutable access to the property bitset, used by the pass manager
    /// and by analyses that recompute a property directly.
    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    pub(crate) fn set_out_edges(&mut self, edges: OutEdges) {
        self.out_edges = Some(edges);
        self.properties.insert(Properties::CONSISTENT_OUT_EDGES);
    }

    /// The out-edge index, if currently consistent.
    pub fn out_edges(&self) -> Option<&OutEdges> {
        if self.properties.contains(Properties::CONSISTENT_OUT_EDGES) {
            self.out_edges.as_ref()
        } else {
            None
        }
    }

    /// Ensures the out-edge index is consistent, rebuilding it if
    /// necessary, and returns it.
    pub fn assure_out_edges(&mut self) -> &OutEdges {
        if !self.properties.contains(Properties::CONSISTENT_OUT_EDGES) {
            OutEdges::rebuild(self);
        }
        self.out_edges.as_ref().unwrap()
    }

    pub(crate) fn set_dominance(&mut self, info: DominanceInfo) {
        self.dominance = Some(info);
        self.properties.insert(Properties::CONSISTENT_DOMINANCE);
    }

    /// The dominator tree, if currently consistent.
    pub fn dominance(&self) -> Option<&DominanceInfo> {
        if self.properties.contains(Properties::CONSISTENT_DOMINANCE) {
            self.dominance.as_ref()
        } else {
            None
        }
    }

    pub(crate) fn set_post_dominance(&mut self, info: DominanceInfo) {
        self.post_dominance = Some(info);
        self.properties
            .insert(Properties::CONSISTENT_POST_DOMINANCE);
    }

    /// The post-dominator tree, if currently consistent.
    pub fn post_dominance(&self) -> Option<&DominanceInfo> {
        if self
            .properties
            .contains(Properties::CONSISTENT_POST_DOMINANCE)
        {
            self.post_dominance.as_ref()
        } else {
            None
        }
    }

    pub(crate) fn set_loop_info(&mut self, info: LoopInfo) {
        self.loop_info = Some(info);
        self.properties.insert(Properties::CONSISTENT_LOOP_INFO);
    }

    /// Natural-loop information, if currently consistent.
    pub fn loop_info(&self) -> Option<&LoopInfo> {
        if self.properties.contains(Properties::CONSISTENT_LOOP_INFO) {
            self.loop_info.as_ref()
        } else {
            None
        }
    }

    /// Bumps the node-visited epoch and returns the new value, for use
    /// by walkers (§4.5).
    pub fn bump_node_visited(&mut self) -> u32 {
        self.visited_nodes += 1;
        self.visited_nodes
    }

    /// The current node-visited epoch.
    pub fn node_visited_epoch(&self) -> u32 {
        self.visited_nodes
    }

    /// Bumps the block-visited epoch and returns the new value.
    pub fn bump_block_visited(&mut self) -> u32 {
        self.visited_blocks += 1;
        self.visited_blocks
    }

    /// The current block-visited epoch.
    pub fn block_visited_epoch(&self) -> u32 {
        self.visited_blocks
    }

    /// `true` iff `n` has been stamped at-or-after the current node
    /// epoch.
    pub fn is_visited(&self, n: NodeId) -> bool {
        self.node(n).visited_stamp() >= self.visited_nodes
    }

    /// Stamps `n` as visited at the current node epoch.
    pub fn mark_visited(&mut self, n: NodeId) {
        self.nodes[n.index()].visited = self.visited_nodes;
    }

    /// Reserves a scratch resource for exclusive use; returns
    /// [`Error::ResourceCollision`] if it is already held (§5).
    pub fn reserve_resource(&mut self, kind: ResourceKind) -> Result<()> {
        if !self.reserved_resources.insert(kind) {
            return Err(Error::ResourceCollision { slot: kind });
        }
        Ok(())
    }

    /// Releases a previously reserved scratch resource.
    pub fn free_resource(&mut self, kind: ResourceKind) {
        self.reserved_resources.remove(&kind);
    }

    /// All nodes reachable from `End` together with every anchor, the
    /// traversal roots used to build the out-edge index (§4.3) and by
    /// verification's reachability checks.
    pub fn reachable_from_end_and_anchors(&self) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeId> = self.anchors.all().to_vec();
        stack.push(self.anchors.end);
        let mut order = Vec::new();
        while let Some(n) = stack.pop() {
            if !seen.insert(n) {
                continue;
            }
            order.push(n);
            let node = self.node(n);
            if let Some(b) = node.block {
                stack.push(b);
            }
            for &input in node.inputs() {
                stack.push(input);
            }
        }
        order
    }

    /// Iterator over every `Block` node reachable from `End`/anchors.
    pub fn all_blocks(&self) -> Vec<NodeId> {
        self.reachable_from_end_and_anchors()
            .into_iter()
            .filter(|&n| self.node(n).op() == Op::Block)
            .collect()
    }

    /// Iterator over every `Const` node reachable from `End`/anchors.
    pub fn all_consts(&self) -> Vec<NodeId> {
        self.reachable_from_end_and_anchors()
            .into_iter()
            .filter(|&n| self.node(n).op() == Op::Const)
            .collect()
    }

    /// Predecessor blocks of `block` (its block-typed data inputs),
    /// i.e. the CFG predecessors.
    pub fn cfg_preds(&self, block: NodeId) -> Vec<NodeId> {
        self.node(block)
            .inputs()
            .iter()
            .map(|&pred| self.control_source_block(pred))
            .collect()
    }

    /// Given a control-flow value (a `Jmp`, `Proj` of `Cond`/`Switch`,
    /// etc.), returns the block it is pinned in — the block that
    /// becomes a CFG predecessor when this value feeds a `Block`'s
    /// input.
    pub fn control_source_block(&self, control: NodeId) -> NodeId {
        self.node(control)
            .block()
            .expect("control-flow producing nodes are always pinned to a block")
    }

    /// Switch table of `n`, if it is a `Switch` node.
    pub fn switch_table(&self, n: NodeId) -> Option<&SwitchAttr> {
        match self.node(n).attr() {
            Attr::Switch(table) => Some(table),
            _ => None,
        }
    }

    /// Removes all memoized analyses that are marked inconsistent,
    /// freeing memory without touching the bits themselves (useful
    /// after a pass that invalidated them so stale data isn't retained
    /// for no reason).
    pub fn drop_stale_analyses(&mut self) {
        if !self.properties.contains(Properties::CONSISTENT_OUT_EDGES) {
            self.out_edges = None;
        }
        if !self.properties.contains(Properties::CONSISTENT_DOMINANCE) {
            self.dominance = None;
        }
        if !self
            .properties
            .contains(Properties::CONSISTENT_POST_DOMINANCE)
        {
            self.post_dominance = None;
        }
        if !self.properties.contains(Properties::CONSISTENT_LOOP_INFO) {
            self.loop_info = None;
        }
    }
}
